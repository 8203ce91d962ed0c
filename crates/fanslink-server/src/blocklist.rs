//! Address blocklist with mtime-based hot reload.
//!
//! The file lists one IP address per line; blank lines and `#`
//! comments are ignored. Consulted before the TLS handshake so
//! blocked peers never cost us crypto work.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct Blocklist {
    path: Option<PathBuf>,
    entries: HashSet<IpAddr>,
    mtime: Option<SystemTime>,
}

impl Blocklist {
    /// A blocklist bound to a file; the initial load happens on the
    /// first [`maybe_reload`](Self::maybe_reload).
    pub fn new(path: Option<PathBuf>) -> Self {
        let mut list = Self {
            path,
            entries: HashSet::new(),
            mtime: None,
        };
        list.maybe_reload();
        list
    }

    pub fn is_blocked(&self, addr: IpAddr) -> bool {
        self.entries.contains(&addr)
    }

    /// Re-read the file if its mtime changed. Returns `true` when the
    /// entry set was reloaded (callers then re-check live connections).
    pub fn maybe_reload(&mut self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        let mtime = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => Some(mtime),
            Err(_) => None,
        };
        if mtime == self.mtime && self.mtime.is_some() {
            return false;
        }
        let Some(new_mtime) = mtime else {
            // File vanished: keep the last loaded set.
            return false;
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let mut entries = HashSet::new();
                for line in raw.lines() {
                    let line = line.split('#').next().unwrap_or("").trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line.parse::<IpAddr>() {
                        Ok(addr) => {
                            entries.insert(addr);
                        }
                        Err(_) => {
                            warn!(path = %path.display(), entry = line, "ignoring bad blocklist entry");
                        }
                    }
                }
                info!(path = %path.display(), entries = entries.len(), "blocklist loaded");
                self.entries = entries;
                self.mtime = Some(new_mtime);
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read blocklist");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fanslink-blocklist-{name}-{}", std::process::id()))
    }

    #[test]
    fn loads_and_filters() {
        let path = temp_path("load");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# bad actors").unwrap();
        writeln!(f, "10.1.2.3").unwrap();
        writeln!(f, "::1  # local").unwrap();
        writeln!(f, "not-an-address").unwrap();
        drop(f);

        let list = Blocklist::new(Some(path.clone()));
        assert!(list.is_blocked("10.1.2.3".parse().unwrap()));
        assert!(list.is_blocked("::1".parse().unwrap()));
        assert!(!list.is_blocked("10.1.2.4".parse().unwrap()));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reload_only_on_mtime_change() {
        let path = temp_path("reload");
        std::fs::write(&path, "10.0.0.1\n").unwrap();
        let mut list = Blocklist::new(Some(path.clone()));
        assert!(list.is_blocked("10.0.0.1".parse().unwrap()));
        // Unchanged mtime: no reload.
        assert!(!list.maybe_reload());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn no_path_blocks_nothing() {
        let mut list = Blocklist::new(None);
        assert!(!list.is_blocked("10.0.0.1".parse().unwrap()));
        assert!(!list.maybe_reload());
    }
}
