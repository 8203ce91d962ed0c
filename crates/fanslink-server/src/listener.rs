//! Listener and per-connection I/O tasks.
//!
//! Raw-TLS and WebSocket listeners accept sockets, consult the
//! blocklist *before* paying for the TLS handshake, and hand each
//! surviving connection a reader task (incremental text decode with
//! stage-dependent input caps) and a writer task (drains the broker's
//! encoded-line channel). The framing difference between the two
//! transports lives entirely in this module.

use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use rustls::ServerConfig;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fanslink_models::text;

use crate::blocklist::Blocklist;
use crate::broker::Event;
use crate::config::{parse_listen_addr, Config, DEFAULT_TLS_PORT, DEFAULT_WS_PORT};
use crate::conn::{ConnShared, TransportKind};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Build the server-side rustls config from the `[tls]` section.
pub fn build_tls_acceptor(config: &Config) -> Result<TlsAcceptor> {
    let certfile = config
        .tls
        .certfile
        .as_ref()
        .context("tls.certfile not configured")?;
    let keyfile = config
        .tls
        .keyfile
        .as_ref()
        .context("tls.keyfile not configured")?;

    let certs: Vec<CertificateDer<'static>> = {
        let file = std::fs::File::open(certfile)
            .with_context(|| format!("opening {}", certfile.display()))?;
        rustls_pemfile::certs(&mut BufReader::new(file))
            .collect::<std::result::Result<_, _>>()
            .context("parsing tls.certfile")?
    };
    if certs.is_empty() {
        bail!("tls.certfile contains no certificates");
    }
    let key: PrivateKeyDer<'static> = {
        let file = std::fs::File::open(keyfile)
            .with_context(|| format!("opening {}", keyfile.display()))?;
        rustls_pemfile::private_key(&mut BufReader::new(file))
            .context("parsing tls.keyfile")?
            .context("tls.keyfile contains no private key")?
    };

    if config.tls.keyfile_enctype != crate::config::KeyEncType::Plain {
        // Passphrase-protected keys are decrypted out of band (e.g.
        // `openssl pkcs8`); rustls only loads plain PKCS#8/PKCS#1.
        bail!(
            "tls.keyfile_enctype {:?}: decrypt the private key before loading",
            config.tls.keyfile_enctype
        );
    }

    let builder = ServerConfig::builder();
    let server_config = if config.tls.req_client_cert {
        let cafile = config
            .tls
            .cafile
            .as_ref()
            .context("tls.req_client_cert without tls.cafile")?;
        let mut roots = rustls::RootCertStore::empty();
        let file = std::fs::File::open(cafile)
            .with_context(|| format!("opening {}", cafile.display()))?;
        for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
            roots.add(cert.context("parsing tls.cafile")?)?;
        }
        let mut verifier_builder = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots));
        if let Some(crlfile) = &config.tls.crlfile {
            let file = std::fs::File::open(crlfile)
                .with_context(|| format!("opening {}", crlfile.display()))?;
            let crls = rustls_pemfile::crls(&mut BufReader::new(file))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("parsing tls.crlfile")?;
            verifier_builder = verifier_builder.with_crls(crls);
        }
        let verifier = verifier_builder
            .build()
            .context("building client verifier")?;
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?
    } else {
        builder
            .with_no_client_auth()
            .with_single_cert(certs, key)?
    };
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Bind every configured listener and spawn its accept loop.
pub async fn spawn_listeners(
    config: &Config,
    acceptor: TlsAcceptor,
    blocklist: Arc<RwLock<Blocklist>>,
    events: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) -> Result<()> {
    for (label, spec) in &config.listen.tcp {
        let (host, port) = parse_listen_addr(spec, DEFAULT_TLS_PORT)?;
        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("binding listener {label} on {host}:{port}"))?;
        info!(%label, %host, port, "TLS listener up");
        tokio::spawn(accept_loop(
            listener,
            TransportKind::Tls,
            acceptor.clone(),
            blocklist.clone(),
            events.clone(),
            cancel.clone(),
        ));
    }
    for (label, spec) in &config.listen.lws {
        let (host, port) = parse_listen_addr(spec, DEFAULT_WS_PORT)?;
        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("binding listener {label} on {host}:{port}"))?;
        info!(%label, %host, port, "WebSocket listener up");
        tokio::spawn(accept_loop(
            listener,
            TransportKind::WebSocket,
            acceptor.clone(),
            blocklist.clone(),
            events.clone(),
            cancel.clone(),
        ));
    }
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    kind: TransportKind,
    acceptor: TlsAcceptor,
    blocklist: Arc<RwLock<Blocklist>>,
    events: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) {
    loop {
        let (stream, peer) = tokio::select! {
            r = listener.accept() => match r {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
            () = cancel.cancelled() => return,
        };
        // Reject before the TLS handshake costs anything.
        let blocked = blocklist
            .read()
            .map(|b| b.is_blocked(peer.ip()))
            .unwrap_or(false);
        if blocked {
            debug!(%peer, "rejecting blocklisted peer");
            continue;
        }
        stream.set_nodelay(true).ok();
        let acceptor = acceptor.clone();
        let events = events.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match kind {
                TransportKind::Tls => serve_tls(stream, peer, acceptor, events, cancel).await,
                TransportKind::WebSocket => serve_ws(stream, peer, acceptor, events, cancel).await,
            }
        });
    }
}

/// Read-side bookkeeping shared by both transports: push bytes into
/// the decoder, enforce the stage cap, and emit inbound events.
/// Returns `false` when the connection must close.
fn feed_decoder(
    id: u64,
    decoder: &mut text::Decoder,
    bytes: &[u8],
    shared: &ConnShared,
    events: &mpsc::UnboundedSender<Event>,
) -> bool {
    decoder.push(bytes);
    loop {
        match decoder.next() {
            Ok(Some(msg)) => {
                if events.send(Event::Inbound { id, msg }).is_err() {
                    return false;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = events.send(Event::InputError {
                    id,
                    reason: e.to_string(),
                });
                return false;
            }
        }
    }
    if let Some(cap) = shared.input_cap() {
        if decoder.pending() > cap {
            let _ = events.send(Event::InputError {
                id,
                reason: format!("input exceeds {cap}-byte pre-logon cap"),
            });
            return false;
        }
    }
    true
}

async fn serve_tls(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    events: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) {
    let stream = match acceptor.accept(stream).await {
        Ok(stream) => stream,
        Err(e) => {
            // Handshake failure: close without any logon response.
            debug!(%peer, error = %e, "TLS handshake failed");
            return;
        }
    };
    let id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let shared = ConnShared::new();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    if events
        .send(Event::Accepted {
            id,
            kind: TransportKind::Tls,
            peer,
            outbound: outbound_tx,
            shared: shared.clone(),
        })
        .is_err()
    {
        return;
    }

    let (mut read_half, mut write_half) = tokio::io::split(stream);

    tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if write_half.write_all(&line).await.is_err() {
                break;
            }
        }
        write_half.shutdown().await.ok();
    });

    let mut decoder = text::Decoder::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = tokio::select! {
            r = read_half.read(&mut buf) => match r {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            },
            () = cancel.cancelled() => break,
        };
        if !feed_decoder(id, &mut decoder, &buf[..n], &shared, &events) {
            // The broker drops the connection; the writer drains what
            // is already queued and shuts the stream down.
            return;
        }
    }
    let _ = events.send(Event::Closed { id });
}

async fn serve_ws(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    events: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) {
    let stream = match acceptor.accept(stream).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!(%peer, error = %e, "TLS handshake failed");
            return;
        }
    };
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let shared = ConnShared::new();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    if events
        .send(Event::Accepted {
            id,
            kind: TransportKind::WebSocket,
            peer,
            outbound: outbound_tx,
            shared: shared.clone(),
        })
        .is_err()
    {
        return;
    }

    let (mut sink, mut source) = ws.split();

    tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if sink.send(WsMessage::binary(line)).await.is_err() {
                break;
            }
        }
        sink.close().await.ok();
    });

    let mut decoder = text::Decoder::new();
    loop {
        let frame = tokio::select! {
            f = source.next() => match f {
                Some(Ok(frame)) => frame,
                _ => break,
            },
            () = cancel.cancelled() => break,
        };
        let bytes = match frame {
            WsMessage::Text(text) => text.as_bytes().to_vec(),
            WsMessage::Binary(bytes) => bytes.to_vec(),
            WsMessage::Close(_) => break,
            // Ping/pong are handled by tungstenite itself.
            _ => continue,
        };
        if !feed_decoder(id, &mut decoder, &bytes, &shared, &events) {
            return;
        }
    }
    let _ = events.send(Event::Closed { id });
}
