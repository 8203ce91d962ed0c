//! cpdlcd — the fanslink CPDLC broker daemon.

mod auth;
mod blocklist;
mod broker;
mod config;
mod conn;
mod creds;
mod listener;
mod queue;
mod registry;
mod router;

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::blocklist::Blocklist;
use crate::broker::{Broker, Event};
use crate::config::{Config, KeyEncType};

#[derive(Parser, Debug)]
#[command(name = "cpdlcd", about = "CPDLC message broker")]
struct Cli {
    /// Stay in the foreground (service-manager friendly). Without this
    /// flag the broker still runs attached; use a supervisor to
    /// background it.
    #[arg(short = 'd')]
    foreground: bool,

    /// Encrypt the configured auth username/password, print the
    /// config-ready values, and exit.
    #[arg(short = 'e')]
    encrypt: bool,

    /// With -e: read the values from stdin without prompting.
    #[arg(short = 's')]
    silent: bool,

    /// Configuration file path.
    #[arg(short = 'c', value_name = "conffile")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if cli.encrypt {
        return creds::encrypt_userpwd(cli.silent);
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::with_default_listener(),
    };
    if config.tls.keyfile_enctype != KeyEncType::Plain && config.tls.keyfile_pass.is_none() {
        bail!("tls.keyfile_enctype set without tls.keyfile_pass");
    }
    if !cli.foreground {
        info!("running attached; use a service manager to daemonize");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building runtime")?
        .block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<Event>();
    let blocklist = Arc::new(RwLock::new(Blocklist::new(config.blocklist.clone())));

    let acceptor = listener::build_tls_acceptor(&config).context("TLS setup")?;
    listener::spawn_listeners(
        &config,
        acceptor,
        blocklist.clone(),
        events_tx.clone(),
        cancel.clone(),
    )
    .await?;

    // SIGHUP reopens the message log (for rotation).
    {
        let events_tx = events_tx.clone();
        let mut hup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            .context("installing SIGHUP handler")?;
        tokio::spawn(async move {
            while hup.recv().await.is_some() {
                let _ = events_tx.send(Event::ReopenMsgLog);
            }
        });
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutting down");
                cancel.cancel();
            }
        });
    }

    let broker = Broker::new(config, blocklist, events_tx);
    broker.run(events_rx, cancel).await;
    Ok(())
}
