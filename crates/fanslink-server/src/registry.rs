//! The identity registry: callsign → connections multi-map, the
//! atomically-rewritten logon list file, and the logon/logoff shell
//! hooks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::conn::{ConnId, TransportKind};

/// One registered identity on one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegEntry {
    pub conn: ConnId,
    /// The aircraft's logon target; `None` for ATC identities.
    pub to: Option<String>,
    pub is_atc: bool,
    pub addr: String,
    pub kind: TransportKind,
}

/// Callsign → connections registry.
#[derive(Debug, Default)]
pub struct Registry {
    by_from: HashMap<String, Vec<RegEntry>>,
    /// Set when membership changed since the last logon-list dump.
    dirty: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity. Multiple connections may share a callsign
    /// (ATC multi-logon); one connection registering the same callsign
    /// twice replaces its previous entry.
    pub fn register(&mut self, from: &str, entry: RegEntry) {
        let entries = self.by_from.entry(from.to_string()).or_default();
        entries.retain(|e| e.conn != entry.conn);
        entries.push(entry);
        self.dirty = true;
    }

    /// Remove one identity from one connection.
    pub fn unregister(&mut self, from: &str, conn: ConnId) -> Option<RegEntry> {
        let entries = self.by_from.get_mut(from)?;
        let idx = entries.iter().position(|e| e.conn == conn)?;
        let entry = entries.remove(idx);
        if entries.is_empty() {
            self.by_from.remove(from);
        }
        self.dirty = true;
        Some(entry)
    }

    /// Remove every identity held by a connection, returning the
    /// `(callsign, entry)` pairs removed.
    pub fn unregister_conn(&mut self, conn: ConnId) -> Vec<(String, RegEntry)> {
        let mut removed = Vec::new();
        let froms: Vec<String> = self.by_from.keys().cloned().collect();
        for from in froms {
            if let Some(entry) = self.unregister(&from, conn) {
                removed.push((from, entry));
            }
        }
        removed
    }

    /// All connections currently holding a callsign.
    pub fn lookup(&self, from: &str) -> &[RegEntry] {
        self.by_from.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any connection holds the callsign.
    pub fn is_online(&self, from: &str) -> bool {
        !self.lookup(from).is_empty()
    }

    /// Whether membership changed since the last dump.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the logon list file via write-then-rename, clearing the
    /// dirty flag on success. One line per identity:
    /// `<from>\t<to|->\t(ATC|ACFT)\t<addr>\t(WS|TLS)`.
    pub fn write_logon_list(&mut self, path: &Path) {
        if !self.dirty {
            return;
        }
        let mut out = String::new();
        let mut froms: Vec<&String> = self.by_from.keys().collect();
        froms.sort();
        for from in froms {
            for entry in &self.by_from[from] {
                out.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\n",
                    from,
                    entry.to.as_deref().unwrap_or("-"),
                    if entry.is_atc { "ATC" } else { "ACFT" },
                    entry.addr,
                    entry.kind.as_str(),
                ));
            }
        }
        let tmp: PathBuf = path.with_extension("tmp");
        let result = std::fs::write(&tmp, out).and_then(|()| std::fs::rename(&tmp, path));
        match result {
            Ok(()) => {
                self.dirty = false;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write logon list");
                std::fs::remove_file(&tmp).ok();
            }
        }
    }
}

/// Expand a logon/logoff command template and spawn it via
/// `/bin/sh -c`. Substituted values are shell-quoted.
pub fn run_hook(template: &str, from: &str, to: &str, addr: &str, statype: &str, conntype: &str) {
    let cmd = template
        .replace("${FROM}", &shell_quote(from))
        .replace("${TO}", &shell_quote(to))
        .replace("${ADDR}", &shell_quote(addr))
        .replace("${STATYPE}", &shell_quote(statype))
        .replace("${CONNTYPE}", &shell_quote(conntype));
    info!(%cmd, "running hook");
    match tokio::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(&cmd)
        .spawn()
    {
        Ok(mut child) => {
            tokio::spawn(async move {
                let _ = child.wait().await;
            });
        }
        Err(e) => warn!(%cmd, error = %e, "failed to spawn hook"),
    }
}

/// Single-quote a value for `/bin/sh`, closing around embedded quotes.
fn shell_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(conn: ConnId, is_atc: bool) -> RegEntry {
        RegEntry {
            conn,
            to: if is_atc { None } else { Some("CTR01".to_string()) },
            is_atc,
            addr: "10.0.0.1:5000".to_string(),
            kind: TransportKind::Tls,
        }
    }

    #[test]
    fn multi_logon_and_removal() {
        let mut reg = Registry::new();
        reg.register("CTR01", entry(1, true));
        reg.register("CTR01", entry(2, true));
        assert_eq!(reg.lookup("CTR01").len(), 2);

        reg.unregister("CTR01", 1).unwrap();
        assert_eq!(reg.lookup("CTR01").len(), 1);
        reg.unregister("CTR01", 2).unwrap();
        assert!(!reg.is_online("CTR01"));
    }

    #[test]
    fn reregistration_replaces() {
        let mut reg = Registry::new();
        reg.register("ACA123", entry(7, false));
        reg.register("ACA123", entry(7, false));
        assert_eq!(reg.lookup("ACA123").len(), 1);
    }

    #[test]
    fn unregister_conn_sweeps_all_identities() {
        let mut reg = Registry::new();
        reg.register("CTR01", entry(1, true));
        reg.register("CTR02", entry(1, true));
        reg.register("ACA123", entry(2, false));
        let removed = reg.unregister_conn(1);
        assert_eq!(removed.len(), 2);
        assert!(reg.is_online("ACA123"));
    }

    #[test]
    fn logon_list_format() {
        let path = std::env::temp_dir().join(format!(
            "fanslink-logonlist-{}",
            std::process::id()
        ));
        let mut reg = Registry::new();
        reg.register("ACA123", entry(1, false));
        reg.register("CTR01", entry(2, true));
        reg.write_logon_list(&path);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            raw,
            "ACA123\tCTR01\tACFT\t10.0.0.1:5000\tTLS\nCTR01\t-\tATC\t10.0.0.1:5000\tTLS\n"
        );
        assert!(!reg.is_dirty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn quote_survives_injection_attempts() {
        assert_eq!(shell_quote("ACA123"), "'ACA123'");
        assert_eq!(shell_quote("x'; rm -rf /"), "'x'\\''; rm -rf /'");
    }
}
