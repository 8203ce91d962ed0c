//! Store-and-forward queue for messages to disconnected recipients.
//!
//! Encoded bytes are frozen at enqueue time; requeueing is not
//! possible. Per-sender quotas apply to downlink (non-ATC) senders
//! only; a global byte cap applies to everyone. Expired messages are
//! dropped silently.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use fanslink_models::DEFERRED_TTL_SECS;

/// Why an enqueue was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The sender's queued-byte quota is exhausted.
    SenderQuota,
    /// The global queue cap is exhausted.
    GlobalCap,
}

#[derive(Debug)]
struct QueuedMsg {
    from: String,
    to: String,
    is_atc: bool,
    enqueued_at: Instant,
    bytes: Vec<u8>,
}

/// The deferred-delivery queue.
#[derive(Debug)]
pub struct DeferredQueue {
    items: Vec<QueuedMsg>,
    /// Queued bytes per non-ATC sender.
    per_sender: HashMap<String, u64>,
    total: u64,
    quota: u64,
    max_total: u64,
    ttl: Duration,
}

impl DeferredQueue {
    pub fn new(quota: u64, max_total: u64) -> Self {
        Self {
            items: Vec::new(),
            per_sender: HashMap::new(),
            total: 0,
            quota,
            max_total,
            ttl: Duration::from_secs(u64::from(DEFERRED_TTL_SECS)),
        }
    }

    /// Queue one encoded message for a disconnected recipient.
    pub fn enqueue(
        &mut self,
        from: &str,
        to: &str,
        is_atc: bool,
        bytes: Vec<u8>,
        now: Instant,
    ) -> Result<(), EnqueueError> {
        let len = bytes.len() as u64;
        if self.total + len > self.max_total {
            return Err(EnqueueError::GlobalCap);
        }
        if !is_atc {
            let used = self.per_sender.get(from).copied().unwrap_or(0);
            if used + len > self.quota {
                return Err(EnqueueError::SenderQuota);
            }
            *self.per_sender.entry(from.to_string()).or_insert(0) += len;
        }
        self.total += len;
        self.items.push(QueuedMsg {
            from: from.to_string(),
            to: to.to_string(),
            is_atc,
            enqueued_at: now,
            bytes,
        });
        Ok(())
    }

    fn release(per_sender: &mut HashMap<String, u64>, total: &mut u64, item: &QueuedMsg) {
        let len = item.bytes.len() as u64;
        *total -= len;
        if !item.is_atc {
            if let Some(used) = per_sender.get_mut(&item.from) {
                *used = used.saturating_sub(len);
                if *used == 0 {
                    per_sender.remove(&item.from);
                }
            }
        }
    }

    /// Remove and return, in queue order, every message addressed to
    /// the given recipient.
    pub fn take_for(&mut self, recipient: &str) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if item.to == recipient {
                Self::release(&mut self.per_sender, &mut self.total, &item);
                out.push(item.bytes);
            } else {
                kept.push(item);
            }
        }
        self.items = kept;
        out
    }

    /// Drop messages older than the TTL. No notification is sent.
    pub fn expire(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut dropped = 0;
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if now.duration_since(item.enqueued_at) > ttl {
                Self::release(&mut self.per_sender, &mut self.total, &item);
                dropped += 1;
            } else {
                kept.push(item);
            }
        }
        self.items = kept;
        dropped
    }

    /// Queued messages currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total queued bytes.
    pub fn total_bytes(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(quota: u64, max: u64) -> DeferredQueue {
        DeferredQueue::new(quota, max)
    }

    #[test]
    fn delivery_in_queue_order() {
        let mut queue = q(1024, 4096);
        let now = Instant::now();
        queue.enqueue("CTR01", "ACA123", true, b"first".to_vec(), now).unwrap();
        queue.enqueue("CTR01", "OTHER", true, b"other".to_vec(), now).unwrap();
        queue.enqueue("CTR01", "ACA123", true, b"second".to_vec(), now).unwrap();
        let out = queue.take_for("ACA123");
        assert_eq!(out, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(queue.len(), 1);
        // Exactly once: nothing left for the same recipient.
        assert!(queue.take_for("ACA123").is_empty());
    }

    #[test]
    fn sender_quota_enforced_for_downlink_only() {
        let mut queue = q(1024, 1 << 20);
        let now = Instant::now();
        // 20 × 100-byte undeliverable downlink messages against a 1 KiB
        // quota: the eleventh must bounce.
        let payload = vec![b'x'; 100];
        let mut accepted = 0;
        for _ in 0..20 {
            if queue
                .enqueue("ACA123", "CTR01", false, payload.clone(), now)
                .is_ok()
            {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 10);
        assert_eq!(
            queue.enqueue("ACA123", "CTR01", false, payload.clone(), now),
            Err(EnqueueError::SenderQuota)
        );
        // ATC senders are not quota-bound.
        for _ in 0..20 {
            queue
                .enqueue("CTR01", "ACA999", true, payload.clone(), now)
                .unwrap();
        }
    }

    #[test]
    fn quota_frees_on_delivery_and_expiry() {
        let mut queue = q(200, 1 << 20);
        let now = Instant::now();
        let payload = vec![b'x'; 150];
        queue.enqueue("ACA123", "CTR01", false, payload.clone(), now).unwrap();
        assert_eq!(
            queue.enqueue("ACA123", "CTR01", false, payload.clone(), now),
            Err(EnqueueError::SenderQuota)
        );
        queue.take_for("CTR01");
        queue.enqueue("ACA123", "CTR01", false, payload.clone(), now).unwrap();

        let late = now + Duration::from_secs(601);
        assert_eq!(queue.expire(late), 1);
        assert_eq!(queue.total_bytes(), 0);
        queue.enqueue("ACA123", "CTR01", false, payload, late).unwrap();
    }

    #[test]
    fn ttl_boundary() {
        let mut queue = q(1024, 4096);
        let now = Instant::now();
        queue.enqueue("CTR01", "ACA123", true, b"m".to_vec(), now).unwrap();
        assert_eq!(queue.expire(now + Duration::from_secs(600)), 0);
        assert_eq!(queue.expire(now + Duration::from_secs(601)), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn global_cap() {
        let mut queue = q(1 << 20, 250);
        let now = Instant::now();
        queue.enqueue("A", "B", true, vec![b'x'; 200], now).unwrap();
        assert_eq!(
            queue.enqueue("C", "D", true, vec![b'x'; 100], now),
            Err(EnqueueError::GlobalCap)
        );
    }
}
