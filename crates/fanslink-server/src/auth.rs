//! Asynchronous client for the external logon authenticator.
//!
//! One HTTP POST per logon, plain-text body, 30-second ceiling. The
//! broker loop never awaits these calls; they run in spawned tasks
//! that report back over the event channel.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, warn};

use fanslink_models::wire::escape_percent;

use crate::config::AuthConfig;

/// Hard ceiling on one authenticator round trip.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// The authenticator's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthVerdict {
    pub authorized: bool,
    pub is_atc: bool,
}

/// One logon to verify.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub logon_data: String,
    pub from: String,
    pub to: Option<String>,
    pub peer: SocketAddr,
}

/// Render the plain-text POST body.
fn request_body(req: &AuthRequest) -> String {
    let mut body = String::new();
    body.push_str(&format!("LogonData: {}\n", escape_percent(&req.logon_data)));
    body.push_str(&format!("From: {}\n", escape_percent(&req.from)));
    if let Some(to) = &req.to {
        body.push_str(&format!("To: {}\n", escape_percent(to)));
    }
    body.push_str(&format!("RemotePort: {}\n", req.peer.port()));
    body.push_str(&format!("RemoteAddr: {}", req.peer.ip()));
    body
}

/// Parse the two `auth:`/`atc:` response lines (any order).
fn parse_response(body: &str) -> AuthVerdict {
    let mut verdict = AuthVerdict {
        authorized: false,
        is_atc: false,
    };
    for line in body.lines() {
        if let Some(value) = line.strip_prefix("auth:") {
            verdict.authorized = value.trim() == "1";
        } else if let Some(value) = line.strip_prefix("atc:") {
            verdict.is_atc = value.trim() == "1";
        }
    }
    verdict
}

/// Ask the configured authenticator about a logon.
///
/// Without a configured URL the logon is auto-authorized; the peer is
/// treated as ATC when it supplied no logon target. Any transport or
/// HTTP failure reads as `auth: 0`.
pub async fn authenticate(config: &AuthConfig, req: AuthRequest) -> AuthVerdict {
    let Some(url) = &config.url else {
        return AuthVerdict {
            authorized: true,
            is_atc: req.to.is_none(),
        };
    };

    let mut builder = reqwest::Client::builder().timeout(AUTH_TIMEOUT);
    if let Some(cainfo) = &config.cainfo {
        match std::fs::read(cainfo) {
            Ok(pem) => match reqwest::Certificate::from_pem(&pem) {
                Ok(cert) => builder = builder.add_root_certificate(cert),
                Err(e) => warn!(error = %e, "bad auth CA certificate"),
            },
            Err(e) => warn!(error = %e, "cannot read auth CA file"),
        }
    }
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "auth client build failed");
            return AuthVerdict {
                authorized: false,
                is_atc: false,
            };
        }
    };

    let mut request = client
        .post(url)
        .header("Content-Type", "text/plain")
        .body(request_body(&req));
    if let Some(username) = &config.username {
        // Config credentials may be stored scrambled (`cpdlcd -e`).
        let username = crate::creds::unscramble(username).unwrap_or_else(|_| username.clone());
        let password = config
            .password
            .as_ref()
            .map(|p| crate::creds::unscramble(p).unwrap_or_else(|_| p.clone()));
        request = request.basic_auth(username, password);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => parse_response(&body),
            Err(e) => {
                warn!(error = %e, "auth response read failed");
                AuthVerdict {
                    authorized: false,
                    is_atc: false,
                }
            }
        },
        Ok(response) => {
            debug!(status = %response.status(), "auth refused");
            AuthVerdict {
                authorized: false,
                is_atc: false,
            }
        }
        Err(e) => {
            warn!(error = %e, "auth request failed");
            AuthVerdict {
                authorized: false,
                is_atc: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(to: Option<&str>) -> AuthRequest {
        AuthRequest {
            logon_data: "SECRET 123".to_string(),
            from: "ACA123".to_string(),
            to: to.map(str::to_string),
            peer: "10.1.2.3:41000".parse().unwrap(),
        }
    }

    #[test]
    fn body_format() {
        let body = request_body(&req(Some("CTR01")));
        assert_eq!(
            body,
            "LogonData: SECRET%20123\nFrom: ACA123\nTo: CTR01\nRemotePort: 41000\nRemoteAddr: 10.1.2.3"
        );
    }

    #[test]
    fn body_without_to() {
        let body = request_body(&req(None));
        assert!(!body.contains("To:"));
    }

    #[test]
    fn response_parsing() {
        let v = parse_response("auth: 1\natc: 0\n");
        assert!(v.authorized);
        assert!(!v.is_atc);

        // Order-insensitive, whitespace-tolerant.
        let v = parse_response("atc: 1\nauth: 1");
        assert!(v.authorized && v.is_atc);

        let v = parse_response("");
        assert!(!v.authorized);
    }

    #[tokio::test]
    async fn no_url_auto_authorizes() {
        let config = AuthConfig::default();
        let v = authenticate(&config, req(Some("CTR01"))).await;
        assert!(v.authorized);
        assert!(!v.is_atc);

        let v = authenticate(&config, req(None)).await;
        assert!(v.authorized);
        assert!(v.is_atc);
    }
}
