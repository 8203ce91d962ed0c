//! Per-connection broker state.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

/// Connection identifier, unique for the broker's lifetime.
pub type ConnId = u64;

/// How the peer is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tls,
    WebSocket,
}

impl TransportKind {
    /// Tag used in the logon list file and command substitutions.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Tls => "TLS",
            TransportKind::WebSocket => "WS",
        }
    }
}

/// Broker-side logon progression of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogonState {
    /// No logon in progress.
    None,
    /// LOGON received, authenticator pending.
    Started,
    /// Authenticator answered, finalization pending on the main loop.
    Completing,
    /// Logged on.
    Complete,
}

/// Seconds from accept to required logon completion.
pub const LOGON_GRACE_SECS: u64 = 30;

/// Input cap before any logon attempt.
pub const PRE_LOGON_INPUT_CAP: usize = 128;
/// Input cap while a logon is in flight.
pub const LOGON_INPUT_CAP: usize = 8192;

/// State shared with the connection's read task: the logon stage
/// steers the input size caps without a round trip to the broker.
#[derive(Debug)]
pub struct ConnShared {
    stage: AtomicU8,
}

/// Read-task view of the logon stage, coarser than [`LogonState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStage {
    PreLogon,
    LogonInFlight,
    Complete,
}

impl ConnShared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stage: AtomicU8::new(0),
        })
    }

    pub fn set_stage(&self, stage: InputStage) {
        let raw = match stage {
            InputStage::PreLogon => 0,
            InputStage::LogonInFlight => 1,
            InputStage::Complete => 2,
        };
        self.stage.store(raw, Ordering::Relaxed);
    }

    pub fn stage(&self) -> InputStage {
        match self.stage.load(Ordering::Relaxed) {
            1 => InputStage::LogonInFlight,
            2 => InputStage::Complete,
            _ => InputStage::PreLogon,
        }
    }

    /// The input byte cap in force for the current stage, or `None`
    /// once logged on.
    pub fn input_cap(&self) -> Option<usize> {
        match self.stage() {
            InputStage::PreLogon => Some(PRE_LOGON_INPUT_CAP),
            InputStage::LogonInFlight => Some(LOGON_INPUT_CAP),
            InputStage::Complete => None,
        }
    }
}

/// Captured parameters of a logon awaiting the authenticator.
#[derive(Debug, Clone)]
pub struct PendingLogon {
    pub from: String,
    pub to: Option<String>,
    pub min: Option<u32>,
}

/// One accepted connection as tracked by the broker task.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnId,
    pub kind: TransportKind,
    pub peer: SocketAddr,
    pub state: LogonState,
    pub is_atc: bool,
    /// Authenticated identities. ATC connections may hold several;
    /// aircraft hold exactly one.
    pub froms: Vec<String>,
    /// The aircraft's logon target (current data authority).
    pub to: Option<String>,
    /// Parameters of the in-flight logon.
    pub pending: Option<PendingLogon>,
    /// Encoded-line sink, drained by the writer task.
    pub outbound: mpsc::UnboundedSender<Vec<u8>>,
    pub shared: Arc<ConnShared>,
    pub accepted_at: Instant,
}

impl Connection {
    /// Deadline for reaching `Complete` before the broker closes us.
    pub fn logon_deadline(&self) -> Instant {
        self.accepted_at + std::time::Duration::from_secs(LOGON_GRACE_SECS)
    }

    /// Primary identity (first registered callsign).
    pub fn primary_from(&self) -> Option<&str> {
        self.froms.first().map(String::as_str)
    }

    /// Whether this connection holds the given identity.
    pub fn has_from(&self, from: &str) -> bool {
        self.froms.iter().any(|f| f == from)
    }

    /// Queue an encoded line for transmission; returns `false` when
    /// the writer is gone.
    pub fn send_line(&self, line: Vec<u8>) -> bool {
        self.outbound.send(line).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_caps_follow_stage() {
        let shared = ConnShared::new();
        assert_eq!(shared.input_cap(), Some(PRE_LOGON_INPUT_CAP));
        shared.set_stage(InputStage::LogonInFlight);
        assert_eq!(shared.input_cap(), Some(LOGON_INPUT_CAP));
        shared.set_stage(InputStage::Complete);
        assert_eq!(shared.input_cap(), None);
    }
}
