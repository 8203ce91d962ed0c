//! Broker configuration: a toml file mapping onto [`Config`].
//!
//! Listener addresses accept `host`, `host:port`, and bracketed IPv6
//! (`[::1]:port`); byte quantities accept `K/M/G/T/P/E` suffixes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Default port for raw-TLS listeners.
pub const DEFAULT_TLS_PORT: u16 = 17622;
/// Default port for WebSocket listeners.
pub const DEFAULT_WS_PORT: u16 = 17623;

/// Supported private-key encryption schemes for `tls.keyfile_enctype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KeyEncType {
    #[default]
    Plain,
    Pbes2Des3,
    Pkcs12Rc4,
    Pbes2Aes128,
    Pbes2Aes192,
    Pbes2Aes256,
    Pkcs12Des3,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    pub keyfile: Option<PathBuf>,
    pub certfile: Option<PathBuf>,
    pub keyfile_pass: Option<String>,
    #[serde(default)]
    pub keyfile_enctype: KeyEncType,
    pub cafile: Option<PathBuf>,
    pub crlfile: Option<PathBuf>,
    #[serde(default)]
    pub req_client_cert: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ListenConfig {
    /// Raw-TLS listeners, keyed by label.
    #[serde(default)]
    pub tcp: BTreeMap<String, String>,
    /// WebSocket listeners, keyed by label.
    #[serde(default)]
    pub lws: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cainfo: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MsgQueueConfig {
    /// Per-sender queued-bytes cap (downlink senders only).
    #[serde(default = "default_quota")]
    pub quota: String,
    /// Global queued-bytes cap.
    #[serde(default = "default_queue_max")]
    pub max: String,
}

impl Default for MsgQueueConfig {
    fn default() -> Self {
        Self {
            quota: default_quota(),
            max: default_queue_max(),
        }
    }
}

fn default_quota() -> String {
    "128k".to_string()
}

fn default_queue_max() -> String {
    "64m".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RouterRpcConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cainfo: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MsgRouterConfig {
    #[serde(default)]
    pub rpc: RouterRpcConfig,
    #[serde(default = "default_router_min_threads")]
    pub min_threads: usize,
    #[serde(default = "default_router_max_threads")]
    pub max_threads: usize,
    /// Idle worker stop delay, seconds.
    #[serde(default = "default_router_stop_delay")]
    pub stop_delay: u64,
}

impl Default for MsgRouterConfig {
    fn default() -> Self {
        Self {
            rpc: RouterRpcConfig::default(),
            min_threads: default_router_min_threads(),
            max_threads: default_router_max_threads(),
            stop_delay: default_router_stop_delay(),
        }
    }
}

fn default_router_min_threads() -> usize {
    0
}

fn default_router_max_threads() -> usize {
    8
}

fn default_router_stop_delay() -> u64 {
    2
}

/// The broker's full configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub listen: ListenConfig,
    pub blocklist: Option<PathBuf>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub msgqueue: MsgQueueConfig,
    pub msglog: Option<PathBuf>,
    pub logon_list_file: Option<PathBuf>,
    pub logon_cmd: Option<String>,
    pub logoff_cmd: Option<String>,
    #[serde(default)]
    pub msg_router: MsgRouterConfig,
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// A config with one default TLS listener, for running without a
    /// config file.
    pub fn with_default_listener() -> Self {
        let mut config = Config::default();
        config
            .listen
            .tcp
            .insert("default".to_string(), format!("localhost:{DEFAULT_TLS_PORT}"));
        config
    }

    fn validate(&self) -> Result<()> {
        if self.listen.tcp.is_empty() && self.listen.lws.is_empty() {
            bail!("no listeners configured (listen.tcp / listen.lws)");
        }
        parse_byte_size(&self.msgqueue.quota).context("msgqueue.quota")?;
        parse_byte_size(&self.msgqueue.max).context("msgqueue.max")?;
        if self.msg_router.min_threads > self.msg_router.max_threads {
            bail!("msg_router.min_threads exceeds max_threads");
        }
        for (label, spec) in self.listen.tcp.iter().chain(&self.listen.lws) {
            parse_listen_addr(spec, 0).with_context(|| format!("listener {label}"))?;
        }
        Ok(())
    }

    /// Per-sender quota in bytes.
    pub fn quota_bytes(&self) -> u64 {
        parse_byte_size(&self.msgqueue.quota).unwrap_or(128 * 1024)
    }

    /// Global queue cap in bytes.
    pub fn queue_max_bytes(&self) -> u64 {
        parse_byte_size(&self.msgqueue.max).unwrap_or(64 * 1024 * 1024)
    }
}

/// Parse `host[:port]` with bracketed-IPv6 support. `default_port`
/// applies when no port is given.
pub fn parse_listen_addr(spec: &str, default_port: u16) -> Result<(String, u16)> {
    if let Some(rest) = spec.strip_prefix('[') {
        // Bracketed IPv6: [::1]:4096 or [::1]
        let end = rest
            .find(']')
            .with_context(|| format!("unterminated '[' in \"{spec}\""))?;
        let host = &rest[..end];
        let tail = &rest[end + 1..];
        let port = if let Some(port) = tail.strip_prefix(':') {
            port.parse()
                .with_context(|| format!("bad port in \"{spec}\""))?
        } else if tail.is_empty() {
            default_port
        } else {
            bail!("trailing garbage in \"{spec}\"");
        };
        Ok((host.to_string(), port))
    } else if let Some((host, port)) = spec.rsplit_once(':') {
        if host.contains(':') {
            // Unbracketed IPv6 without port.
            Ok((spec.to_string(), default_port))
        } else {
            Ok((
                host.to_string(),
                port.parse()
                    .with_context(|| format!("bad port in \"{spec}\""))?,
            ))
        }
    } else {
        Ok((spec.to_string(), default_port))
    }
}

/// Parse a byte quantity with an optional K/M/G/T/P/E suffix
/// (case-insensitive, powers of 1024).
pub fn parse_byte_size(spec: &str) -> Result<u64> {
    let spec = spec.trim();
    if spec.is_empty() {
        bail!("empty byte size");
    }
    let (digits, shift) = match spec.as_bytes()[spec.len() - 1].to_ascii_lowercase() {
        b'k' => (&spec[..spec.len() - 1], 10),
        b'm' => (&spec[..spec.len() - 1], 20),
        b'g' => (&spec[..spec.len() - 1], 30),
        b't' => (&spec[..spec.len() - 1], 40),
        b'p' => (&spec[..spec.len() - 1], 50),
        b'e' => (&spec[..spec.len() - 1], 60),
        _ => (spec, 0),
    };
    let value: u64 = digits
        .parse()
        .with_context(|| format!("bad byte size \"{spec}\""))?;
    value
        .checked_shl(shift)
        .filter(|v| shift == 0 || *v >> shift == value)
        .with_context(|| format!("byte size \"{spec}\" overflows"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_suffixes() {
        assert_eq!(parse_byte_size("128k").unwrap(), 131_072);
        assert_eq!(parse_byte_size("2g").unwrap(), 2 * (1 << 30));
        assert_eq!(parse_byte_size("2G").unwrap(), 2 * (1 << 30));
        assert_eq!(parse_byte_size("1024").unwrap(), 1024);
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("x").is_err());
        assert!(parse_byte_size("999999999e").is_err());
    }

    #[test]
    fn listen_addr_forms() {
        assert_eq!(
            parse_listen_addr("[::1]:4096", DEFAULT_TLS_PORT).unwrap(),
            ("::1".to_string(), 4096)
        );
        assert_eq!(
            parse_listen_addr("[::1]", DEFAULT_TLS_PORT).unwrap(),
            ("::1".to_string(), DEFAULT_TLS_PORT)
        );
        assert_eq!(
            parse_listen_addr("0.0.0.0:17000", DEFAULT_TLS_PORT).unwrap(),
            ("0.0.0.0".to_string(), 17000)
        );
        assert_eq!(
            parse_listen_addr("example.com", DEFAULT_WS_PORT).unwrap(),
            ("example.com".to_string(), DEFAULT_WS_PORT)
        );
        assert!(parse_listen_addr("[::1]x", DEFAULT_TLS_PORT).is_err());
        assert!(parse_listen_addr("host:notaport", DEFAULT_TLS_PORT).is_err());
    }

    #[test]
    fn config_parses_full_key_set() {
        let raw = r#"
            blocklist = "/etc/cpdlcd/blocklist"
            msglog = "/var/log/cpdlcd/messages.log"
            logon_list_file = "/run/cpdlcd/logons"
            logon_cmd = "logger logon ${FROM} ${TO} ${ADDR} ${STATYPE} ${CONNTYPE}"
            logoff_cmd = "logger logoff ${FROM}"

            [tls]
            keyfile = "/etc/cpdlcd/key.pem"
            certfile = "/etc/cpdlcd/cert.pem"
            keyfile_pass = "hunter2"
            keyfile_enctype = "pbes2-aes256"
            cafile = "/etc/cpdlcd/ca.pem"
            req_client_cert = true

            [listen.tcp]
            main = "0.0.0.0:17622"
            alt = "[::]:17722"

            [listen.lws]
            web = "0.0.0.0:17623"

            [auth]
            url = "https://auth.example.com/logon"
            username = "broker"
            password = "secret"

            [msgqueue]
            quota = "64k"
            max = "2g"

            [msg_router]
            min_threads = 1
            max_threads = 4
            stop_delay = 10

            [msg_router.rpc]
            url = "https://rpc.example.com/route"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.quota_bytes(), 64 * 1024);
        assert_eq!(config.queue_max_bytes(), 2 * (1 << 30));
        assert_eq!(config.tls.keyfile_enctype, KeyEncType::Pbes2Aes256);
        assert_eq!(config.listen.tcp.len(), 2);
        assert!(config.tls.req_client_cert);
    }

    #[test]
    fn empty_config_rejected() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_err());
    }
}
