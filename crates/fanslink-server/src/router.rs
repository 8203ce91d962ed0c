//! Optional RPC message router.
//!
//! When configured, every routable message is submitted to an external
//! HTTP endpoint before delivery. The endpoint either returns the
//! (possibly rewritten) recipient or tells the broker to discard the
//! message. Concurrency is bounded by `msg_router.max_threads`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::MsgRouterConfig;

/// Hard ceiling on one router round trip.
pub const ROUTER_TIMEOUT: Duration = Duration::from_secs(10);

/// Router decision for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteVerdict {
    /// Deliver, to the given (possibly rewritten) recipient.
    Forward { to: String },
    /// Drop the message silently.
    Discard,
}

/// Submission parameters; mirrors what the routing endpoint receives.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub from: String,
    pub to: String,
    pub is_atc: bool,
    pub is_ws: bool,
    pub addr: String,
    pub msgtype: String,
    pub min: Option<u32>,
    pub mrn: Option<u32>,
}

/// Handle to the router worker pool. `None` verdicts never happen —
/// an unreachable endpoint reads as [`RouteVerdict::Discard`].
pub struct MsgRouter {
    config: MsgRouterConfig,
    client: reqwest::Client,
    slots: Arc<Semaphore>,
}

impl MsgRouter {
    /// Build a router from config; returns `None` when no RPC URL is
    /// configured (messages then route directly).
    pub fn from_config(config: &MsgRouterConfig) -> Option<Self> {
        config.rpc.url.as_ref()?;
        let mut builder = reqwest::Client::builder().timeout(ROUTER_TIMEOUT);
        if let Some(cainfo) = &config.rpc.cainfo {
            if let Ok(pem) = std::fs::read(cainfo) {
                if let Ok(cert) = reqwest::Certificate::from_pem(&pem) {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }
        let client = builder.build().ok()?;
        Some(Self {
            config: config.clone(),
            client,
            slots: Arc::new(Semaphore::new(config.max_threads.max(1))),
        })
    }

    /// Ask the endpoint where (whether) to deliver a message.
    pub async fn route(&self, req: RouteRequest) -> RouteVerdict {
        let Some(url) = &self.config.rpc.url else {
            return RouteVerdict::Forward { to: req.to };
        };
        let _permit = match self.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return RouteVerdict::Discard,
        };

        let body = format!(
            "FROM: {}\nTO: {}\nSTATYPE: {}\nCONNTYPE: {}\nADDR: {}\nMSGTYPE: {}\nMIN: {}\nMRN: {}",
            req.from,
            req.to,
            if req.is_atc { "ATC" } else { "ACFT" },
            if req.is_ws { "WS" } else { "TLS" },
            req.addr,
            req.msgtype,
            req.min.map(|v| v.to_string()).unwrap_or_default(),
            req.mrn.map(|v| v.to_string()).unwrap_or_default(),
        );

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "text/plain")
            .body(body);
        if let Some(username) = &self.config.rpc.username {
            request = request.basic_auth(username, self.config.rpc.password.as_deref());
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                let text = response.text().await.unwrap_or_default();
                match parse_verdict(&text) {
                    Some(to) => RouteVerdict::Forward { to },
                    None => RouteVerdict::Discard,
                }
            }
            Ok(response) => {
                debug!(status = %response.status(), "router discarded message");
                RouteVerdict::Discard
            }
            Err(e) => {
                warn!(error = %e, "router request failed");
                RouteVerdict::Discard
            }
        }
    }
}

/// The response body carries one `to: <callsign>` line to forward;
/// anything else discards.
fn parse_verdict(body: &str) -> Option<String> {
    for line in body.lines() {
        if let Some(value) = line.strip_prefix("to:") {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterRpcConfig;

    #[test]
    fn verdict_parsing() {
        assert_eq!(parse_verdict("to: CTR05\n"), Some("CTR05".to_string()));
        assert_eq!(parse_verdict("to:CTR05"), Some("CTR05".to_string()));
        assert_eq!(parse_verdict("nope"), None);
        assert_eq!(parse_verdict("to: "), None);
    }

    #[test]
    fn disabled_without_url() {
        assert!(MsgRouter::from_config(&MsgRouterConfig::default()).is_none());
        let config = MsgRouterConfig {
            rpc: RouterRpcConfig {
                url: Some("https://rpc.example.com/route".to_string()),
                ..RouterRpcConfig::default()
            },
            ..MsgRouterConfig::default()
        };
        assert!(MsgRouter::from_config(&config).is_some());
    }
}
