//! Reference logon authenticator.
//!
//! Implements the broker's authenticator HTTP contract: one plain-text
//! POST per logon, answered with `auth: 0|1` and `atc: 0|1` lines. The
//! user table is a toml file reloaded per request, so edits take
//! effect immediately.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::post;
use axum::Router;
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};

use fanslink_models::wire::unescape_percent;

#[derive(Parser, Debug)]
#[command(name = "fanslink-auth", about = "Reference CPDLC logon authenticator")]
struct Cli {
    /// User table (toml).
    #[arg(short = 'u', long, value_name = "file")]
    users: PathBuf,

    /// Listen address.
    #[arg(short = 'l', long, default_value = "127.0.0.1:17624")]
    listen: SocketAddr,
}

/// One authorized participant.
#[derive(Debug, Clone, Deserialize)]
struct User {
    /// The secret carried as the LOGON blob.
    secret: String,
    /// Restrict this secret to one callsign; absent = any.
    from: Option<String>,
    #[serde(default)]
    atc: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct UserTable {
    #[serde(default)]
    user: Vec<User>,
}

#[derive(Clone)]
struct AppState {
    users_path: Arc<PathBuf>,
}

/// The parsed logon request fields.
#[derive(Debug, Default, PartialEq)]
struct LogonFields {
    logon_data: String,
    from: String,
    to: Option<String>,
}

fn parse_request(body: &str) -> LogonFields {
    let mut fields = LogonFields::default();
    for line in body.lines() {
        if let Some(value) = line.strip_prefix("LogonData: ") {
            fields.logon_data = unescape_percent(value).unwrap_or_default();
        } else if let Some(value) = line.strip_prefix("From: ") {
            fields.from = unescape_percent(value).unwrap_or_default();
        } else if let Some(value) = line.strip_prefix("To: ") {
            fields.to = unescape_percent(value).ok();
        }
    }
    fields
}

fn check(table: &UserTable, fields: &LogonFields) -> (bool, bool) {
    for user in &table.user {
        if user.secret != fields.logon_data {
            continue;
        }
        if let Some(from) = &user.from {
            if from != &fields.from {
                continue;
            }
        }
        return (true, user.atc);
    }
    (false, false)
}

async fn handle_logon(State(state): State<AppState>, body: String) -> String {
    let fields = parse_request(&body);
    let table = match std::fs::read_to_string(state.users_path.as_ref())
        .map_err(anyhow::Error::from)
        .and_then(|raw| toml::from_str::<UserTable>(&raw).map_err(Into::into))
    {
        Ok(table) => table,
        Err(e) => {
            warn!(error = %e, "user table unreadable; refusing logon");
            return "auth: 0\natc: 0\n".to_string();
        }
    };
    let (auth, atc) = check(&table, &fields);
    info!(from = %fields.from, auth, atc, "logon decision");
    format!("auth: {}\natc: {}\n", u8::from(auth), u8::from(atc))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let state = AppState {
        users_path: Arc::new(cli.users),
    };
    let app = Router::new().route("/", post(handle_logon)).with_state(state);

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    info!(listen = %cli.listen, "authenticator up");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> UserTable {
        toml::from_str(
            r#"
            [[user]]
            secret = "ACFTSECRET"
            from = "ACA123"

            [[user]]
            secret = "CTRSECRET"
            atc = true
            "#,
        )
        .unwrap()
    }

    #[test]
    fn request_parsing_unescapes() {
        let fields = parse_request(
            "LogonData: SECRET%20TOKEN\nFrom: ACA123\nTo: CTR01\nRemotePort: 4000\nRemoteAddr: 10.0.0.1",
        );
        assert_eq!(fields.logon_data, "SECRET TOKEN");
        assert_eq!(fields.from, "ACA123");
        assert_eq!(fields.to.as_deref(), Some("CTR01"));
    }

    #[test]
    fn decisions() {
        let t = table();
        let ok = LogonFields {
            logon_data: "ACFTSECRET".into(),
            from: "ACA123".into(),
            to: Some("CTR01".into()),
        };
        assert_eq!(check(&t, &ok), (true, false));

        // Callsign-bound secret refuses other callsigns.
        let wrong_from = LogonFields {
            logon_data: "ACFTSECRET".into(),
            from: "UAL99".into(),
            to: None,
        };
        assert_eq!(check(&t, &wrong_from), (false, false));

        let atc = LogonFields {
            logon_data: "CTRSECRET".into(),
            from: "CTR01".into(),
            to: None,
        };
        assert_eq!(check(&t, &atc), (true, true));

        let bad = LogonFields {
            logon_data: "NOPE".into(),
            from: "ACA123".into(),
            to: None,
        };
        assert_eq!(check(&t, &bad), (false, false));
    }
}
