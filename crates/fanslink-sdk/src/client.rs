//! The client runtime: a persistent TLS link to the broker with a
//! non-blocking application API.
//!
//! [`LinkClient`] owns a background I/O task which holds the TLS
//! session exclusively; the application-facing methods only touch
//! mutex-guarded queues and never block on network I/O. Send results
//! are reported through opaque [`MsgToken`]s.
//!
//! Logon progression:
//!
//! ```text
//! None → ConnectingLink → HandshakingLink → LinkAvail → InProgress → Complete
//! ```
//!
//! Any failure raises the sticky `logon_failed` flag and drops the
//! status back to `None`; `logoff()` forces `None`.

use std::collections::{HashMap, VecDeque};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fanslink_models::{text, Callsign, Message, PacketType};

use crate::error::SdkError;

/// Opaque identifier for a queued outbound message.
pub type MsgToken = u64;

/// Token value that never identifies a real message.
pub const INVALID_MSG_TOKEN: MsgToken = u64::MAX;

/// How many token statuses are retained before the oldest are evicted.
const STATUS_BACKLOG: usize = 1024;

/// Default broker port for raw TLS links.
pub const DEFAULT_TLS_PORT: u16 = 17622;

/// Client-side logon progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogonStatus {
    /// Not connected.
    None,
    /// TCP connection in progress.
    ConnectingLink,
    /// TCP up, TLS handshake in progress.
    HandshakingLink,
    /// Secure link up, LOGON not yet sent.
    LinkAvail,
    /// LOGON sent, awaiting the broker's answer.
    InProgress,
    /// Logged on, ready for operation.
    Complete,
}

/// Delivery status of one outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgStatus {
    Sending,
    Sent,
    SendFailed,
    /// The token is unknown or its record has been evicted.
    InvalidToken,
}

/// Connection parameters for a [`LinkClient`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    /// CA bundle for server-certificate verification; when absent the
    /// server certificate is not verified.
    pub cafile: Option<PathBuf>,
    /// Client certificate + key files, when the broker demands one.
    pub certfile: Option<PathBuf>,
    pub keyfile: Option<PathBuf>,
}

impl LinkConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            cafile: None,
            certfile: None,
            keyfile: None,
        }
    }
}

#[derive(Debug)]
struct PendingLogon {
    data: String,
    from: Callsign,
    to: Option<Callsign>,
}

#[derive(Debug, Default)]
struct ClientState {
    logon_status_raw: u8,
    logon_failed: bool,
    pending_logon: Option<PendingLogon>,
    logoff_requested: bool,
    outbound: VecDeque<(MsgToken, Message)>,
    statuses: HashMap<MsgToken, MsgStatus>,
    status_order: VecDeque<MsgToken>,
    inbound: VecDeque<Message>,
    next_token: MsgToken,
    next_min: u32,
}

impl ClientState {
    fn status(&self) -> LogonStatus {
        match self.logon_status_raw {
            1 => LogonStatus::ConnectingLink,
            2 => LogonStatus::HandshakingLink,
            3 => LogonStatus::LinkAvail,
            4 => LogonStatus::InProgress,
            5 => LogonStatus::Complete,
            _ => LogonStatus::None,
        }
    }

    fn set_status(&mut self, status: LogonStatus) {
        self.logon_status_raw = match status {
            LogonStatus::None => 0,
            LogonStatus::ConnectingLink => 1,
            LogonStatus::HandshakingLink => 2,
            LogonStatus::LinkAvail => 3,
            LogonStatus::InProgress => 4,
            LogonStatus::Complete => 5,
        };
    }

    fn record_status(&mut self, token: MsgToken, status: MsgStatus) {
        if !self.statuses.contains_key(&token) {
            self.status_order.push_back(token);
            if self.status_order.len() > STATUS_BACKLOG {
                if let Some(old) = self.status_order.pop_front() {
                    self.statuses.remove(&old);
                }
            }
        }
        self.statuses.insert(token, status);
    }
}

struct Shared {
    state: Mutex<ClientState>,
    wakeup: Notify,
}

/// A broker link: background I/O task plus non-blocking accessors.
pub struct LinkClient {
    config: LinkConfig,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl LinkClient {
    /// Create an idle client; no connection is made until
    /// [`logon`](Self::logon) is called.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(ClientState::default()),
                wakeup: Notify::new(),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Start the logon sequence. Spawns the I/O task; must be called
    /// from within a tokio runtime. Progress is observable through
    /// [`logon_status`](Self::logon_status).
    pub fn logon(&self, logon_data: &str, from: Callsign, to: Option<Callsign>) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.logon_failed = false;
            state.logoff_requested = false;
            state.pending_logon = Some(PendingLogon {
                data: logon_data.to_string(),
                from,
                to,
            });
            state.set_status(LogonStatus::ConnectingLink);
        }
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = io_task(shared.clone(), config, cancel).await {
                debug!(error = %e, "link task ended");
                fail_link(&shared);
            }
        });
    }

    /// Drop the link and return the logon status to `None`. A LOGOFF
    /// message is sent if the link is still up.
    pub fn logoff(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.logoff_requested = true;
        self.shared.wakeup.notify_one();
    }

    /// Current logon status.
    pub fn logon_status(&self) -> LogonStatus {
        self.shared.state.lock().unwrap().status()
    }

    /// Sticky flag raised when the last logon attempt failed; cleared
    /// on the next [`logon`](Self::logon).
    pub fn logon_failed(&self) -> bool {
        self.shared.state.lock().unwrap().logon_failed
    }

    /// Queue a message for transmission and return its token. A copy
    /// is taken; a MIN is assigned if the message has none.
    pub fn send(&self, msg: &Message) -> MsgToken {
        let mut state = self.shared.state.lock().unwrap();
        let mut msg = msg.clone();
        if msg.min.is_none() {
            msg.min = Some(state.next_min);
            state.next_min = (state.next_min + 1) % 64;
        }
        let token = state.next_token;
        state.next_token += 1;
        state.record_status(token, MsgStatus::Sending);
        state.outbound.push_back((token, msg));
        drop(state);
        self.shared.wakeup.notify_one();
        token
    }

    /// Allocate the next MIN without sending (used by the message
    /// list to stamp messages before queuing).
    pub fn allocate_min(&self) -> u32 {
        let mut state = self.shared.state.lock().unwrap();
        let min = state.next_min;
        state.next_min = (state.next_min + 1) % 64;
        min
    }

    /// Delivery status of a previously queued message.
    pub fn msg_status(&self, token: MsgToken) -> MsgStatus {
        self.shared
            .state
            .lock()
            .unwrap()
            .statuses
            .get(&token)
            .copied()
            .unwrap_or(MsgStatus::InvalidToken)
    }

    /// Non-blocking dequeue of the next inbound message.
    pub fn recv(&self) -> Option<Message> {
        self.shared.state.lock().unwrap().inbound.pop_front()
    }
}

impl Drop for LinkClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn fail_link(shared: &Shared) {
    // Any link loss drops us back to None; messages still queued
    // become send failures.
    let mut state = shared.state.lock().unwrap();
    state.logon_failed = state.status() != LogonStatus::None;
    state.set_status(LogonStatus::None);
    let pending: Vec<MsgToken> = state.outbound.iter().map(|(t, _)| *t).collect();
    for token in pending {
        state.record_status(token, MsgStatus::SendFailed);
    }
    state.outbound.clear();
}

fn build_tls_config(config: &LinkConfig) -> Result<ClientConfig, SdkError> {
    let builder = ClientConfig::builder();
    let builder = match &config.cafile {
        Some(path) => {
            let mut roots = RootCertStore::empty();
            let file = std::fs::File::open(path)
                .map_err(|e| SdkError::Config(format!("cafile {}: {e}", path.display())))?;
            let mut reader = BufReader::new(file);
            for cert in rustls_pemfile::certs(&mut reader) {
                let cert = cert.map_err(|e| SdkError::Config(format!("cafile: {e}")))?;
                roots
                    .add(cert)
                    .map_err(|e| SdkError::Config(format!("cafile: {e}")))?;
            }
            builder.with_root_certificates(roots)
        }
        None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert)),
    };
    match (&config.certfile, &config.keyfile) {
        (Some(certfile), Some(keyfile)) => {
            let certs = {
                let mut reader = BufReader::new(std::fs::File::open(certfile).map_err(|e| {
                    SdkError::Config(format!("certfile {}: {e}", certfile.display()))
                })?);
                rustls_pemfile::certs(&mut reader)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| SdkError::Config(format!("certfile: {e}")))?
            };
            let key = {
                let mut reader = BufReader::new(std::fs::File::open(keyfile).map_err(|e| {
                    SdkError::Config(format!("keyfile {}: {e}", keyfile.display()))
                })?);
                rustls_pemfile::private_key(&mut reader)
                    .map_err(|e| SdkError::Config(format!("keyfile: {e}")))?
                    .ok_or_else(|| SdkError::Config("keyfile: no private key".to_string()))?
            };
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| SdkError::Config(format!("client cert: {e}")))
        }
        _ => Ok(builder.with_no_client_auth()),
    }
}

async fn io_task(
    shared: Arc<Shared>,
    config: LinkConfig,
    cancel: CancellationToken,
) -> Result<(), SdkError> {
    let tls_config = build_tls_config(&config)?;
    let connector = TlsConnector::from(Arc::new(tls_config));

    let tcp = tokio::select! {
        r = TcpStream::connect((config.host.as_str(), config.port)) => {
            r.map_err(|e| SdkError::Connect(e.to_string()))?
        }
        () = cancel.cancelled() => return Ok(()),
    };
    tcp.set_nodelay(true).ok();
    {
        let mut state = shared.state.lock().unwrap();
        state.set_status(LogonStatus::HandshakingLink);
    }

    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| SdkError::Config(format!("hostname: {e}")))?;
    let mut stream = tokio::select! {
        r = connector.connect(server_name, tcp) => {
            r.map_err(|e| SdkError::Connect(format!("TLS handshake: {e}")))?
        }
        () = cancel.cancelled() => return Ok(()),
    };

    // Link is up; fire the pending LOGON.
    let logon_line = {
        let mut state = shared.state.lock().unwrap();
        state.set_status(LogonStatus::LinkAvail);
        let pending = state
            .pending_logon
            .take()
            .ok_or_else(|| SdkError::Config("no pending logon".to_string()))?;
        let min = state.next_min;
        state.next_min = (state.next_min + 1) % 64;
        let mut msg = Message::logon(&pending.data, min);
        msg.from = Some(pending.from);
        msg.to = pending.to;
        state.set_status(LogonStatus::InProgress);
        text::encode(&msg)?
    };
    stream.write_all(logon_line.as_bytes()).await?;

    let mut decoder = text::Decoder::new();
    let mut read_buf = [0u8; 4096];
    loop {
        // Drain the outbound queue first so sends never wait on reads.
        loop {
            let (token, msg, logoff) = {
                let mut state = shared.state.lock().unwrap();
                if state.logoff_requested {
                    state.logoff_requested = false;
                    let min = state.next_min;
                    state.next_min = (state.next_min + 1) % 64;
                    (INVALID_MSG_TOKEN, Message::logoff(min), true)
                } else {
                    match state.outbound.pop_front() {
                        Some((token, msg)) => (token, msg, false),
                        None => break,
                    }
                }
            };
            let line = match text::encode(&msg) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "dropping unencodable message");
                    let mut state = shared.state.lock().unwrap();
                    state.record_status(token, MsgStatus::SendFailed);
                    continue;
                }
            };
            match stream.write_all(line.as_bytes()).await {
                Ok(()) => {
                    if logoff {
                        stream.shutdown().await.ok();
                        let mut state = shared.state.lock().unwrap();
                        state.set_status(LogonStatus::None);
                        return Ok(());
                    }
                    let mut state = shared.state.lock().unwrap();
                    state.record_status(token, MsgStatus::Sent);
                }
                Err(e) => {
                    let mut state = shared.state.lock().unwrap();
                    state.record_status(token, MsgStatus::SendFailed);
                    drop(state);
                    return Err(e.into());
                }
            }
        }

        tokio::select! {
            () = cancel.cancelled() => {
                let mut state = shared.state.lock().unwrap();
                state.set_status(LogonStatus::None);
                return Ok(());
            }
            () = shared.wakeup.notified() => {}
            r = stream.read(&mut read_buf) => {
                let n = r?;
                if n == 0 {
                    return Err(SdkError::Connect("peer closed".to_string()));
                }
                decoder.push(&read_buf[..n]);
                loop {
                    match decoder.next() {
                        Ok(Some(msg)) => handle_inbound(&shared, msg, &mut stream).await?,
                        Ok(None) => break,
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
    }
}

async fn handle_inbound(
    shared: &Arc<Shared>,
    msg: Message,
    stream: &mut tokio_rustls::client::TlsStream<TcpStream>,
) -> Result<(), SdkError> {
    // The broker's logon verdict steers the state machine; PINGs are
    // answered in place. Everything else lands on the inbound queue.
    if let Some(data) = &msg.logon {
        let mut state = shared.state.lock().unwrap();
        if state.status() == LogonStatus::InProgress {
            if data == "SUCCESS" {
                state.set_status(LogonStatus::Complete);
            } else {
                state.logon_failed = true;
                state.set_status(LogonStatus::None);
            }
            return Ok(());
        }
    }
    if msg.packet_type == PacketType::Ping {
        let pong = Message::pong(&msg);
        let line = text::encode(&pong)?;
        stream.write_all(line.as_bytes()).await?;
        return Ok(());
    }
    shared.state.lock().unwrap().inbound.push_back(msg);
    Ok(())
}

/// Server-certificate verifier used when no CA file is configured:
/// accepts any certificate, matching the optional-verification link
/// contract.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_progress_and_evict() {
        let client = LinkClient::new(LinkConfig::new("localhost", DEFAULT_TLS_PORT));
        let msg = Message::ping(1);
        let first = client.send(&msg);
        assert_eq!(client.msg_status(first), MsgStatus::Sending);
        assert_eq!(client.msg_status(9999), MsgStatus::InvalidToken);

        for _ in 0..STATUS_BACKLOG + 8 {
            client.send(&msg);
        }
        assert_eq!(client.msg_status(first), MsgStatus::InvalidToken);
    }

    #[tokio::test]
    async fn min_assignment_wraps() {
        let client = LinkClient::new(LinkConfig::new("localhost", DEFAULT_TLS_PORT));
        for _ in 0..63 {
            client.allocate_min();
        }
        assert_eq!(client.allocate_min(), 63);
        assert_eq!(client.allocate_min(), 0);
    }

    #[tokio::test]
    async fn initial_state_is_idle() {
        let client = LinkClient::new(LinkConfig::new("localhost", DEFAULT_TLS_PORT));
        assert_eq!(client.logon_status(), LogonStatus::None);
        assert!(!client.logon_failed());
        assert!(client.recv().is_none());
    }
}
