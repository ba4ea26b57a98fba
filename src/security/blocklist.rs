//! Explicit IP block list with lazy expiry.
//!
//! Entries carry an absolute expiry timestamp. Lookups treat a lapsed entry as
//! absent and drop it on the spot; the background sweeper removes the ones
//! nobody asks about.

use dashmap::DashMap;
use serde::Serialize;

use crate::clock::SharedClock;

/// A currently blocked address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    pub ip: String,
    pub blocked_until: u64,
}

pub struct IpBlockRegistry {
    entries: DashMap<String, u64>,
    clock: SharedClock,
}

impl IpBlockRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Block `ip` for `duration_ms`. Re-blocking never shortens an active block.
    pub fn block(&self, ip: &str, duration_ms: u64) -> u64 {
        let until = self.clock.now_ms().saturating_add(duration_ms);
        let mut entry = self.entries.entry(ip.to_string()).or_insert(until);
        if *entry < until {
            *entry = until;
        }
        tracing::info!(ip = %ip, blocked_until = *entry, "IP blocked");
        *entry
    }

    /// Returns true if `ip` had an entry, expired or not.
    pub fn unblock(&self, ip: &str) -> bool {
        let removed = self.entries.remove(ip).is_some();
        if removed {
            tracing::info!(ip = %ip, "IP unblocked");
        }
        removed
    }

    pub fn is_blocked(&self, ip: &str) -> bool {
        self.blocked_until(ip).is_some()
    }

    /// Expiry of an active block on `ip`.
    pub fn blocked_until(&self, ip: &str) -> Option<u64> {
        let now = self.clock.now_ms();
        let until = *self.entries.get(ip)?;
        if until > now {
            return Some(until);
        }
        self.entries.remove_if(ip, |_, until| *until <= now);
        None
    }

    /// Active blocks ordered by address.
    pub fn list(&self) -> Vec<BlockEntry> {
        let now = self.clock.now_ms();
        let mut list: Vec<BlockEntry> = self
            .entries
            .iter()
            .filter(|e| *e.value() > now)
            .map(|e| BlockEntry {
                ip: e.key().clone(),
                blocked_until: *e.value(),
            })
            .collect();
        list.sort_by(|a, b| a.ip.cmp(&b.ip));
        list
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every lapsed entry.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, until| *until > now);
        before - self.entries.len()
    }
}
