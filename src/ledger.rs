//! The proxy ledger: authoritative per-proxy counters and status.
//!
//! Runners never hold entry state of their own; every mutation goes through
//! the ledger so that update-and-read is atomic per entry.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use crate::classifier::Verdict;

/// Running counters for one proxy.
#[derive(Debug, Clone, Default)]
pub struct LedgerEntry {
    pub requests_sent: u64,
    pub requests_failed: u64,
    pub consecutive_failures: u32,
    pub disabled: bool,
    pub disable_reason: Option<Verdict>,
    pub first_request_at: Option<Instant>,
    pub disabled_at: Option<Instant>,
}

impl LedgerEntry {
    /// Lifetime failure ratio in percent. Zero before the first request.
    pub fn failure_percentage(&self) -> f64 {
        if self.requests_sent == 0 {
            return 0.0;
        }
        self.requests_failed as f64 / self.requests_sent as f64 * 100.0
    }

    /// Wall-clock time from first request to disable, if both happened.
    pub fn lifetime(&self) -> Option<std::time::Duration> {
        match (self.first_request_at, self.disabled_at) {
            (Some(first), Some(at)) => Some(at.duration_since(first)),
            _ => None,
        }
    }
}

/// Thread-safe map from proxy id (`host:port`) to its [`LedgerEntry`].
///
/// A single proxy's requests are issued sequentially by its own runner, so
/// one coarse lock over the map is enough to keep entry updates atomic.
#[derive(Debug, Default)]
pub struct ProxyLedger {
    entries: Mutex<HashMap<String, LedgerEntry>>,
}

impl ProxyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a request is about to be issued.
    pub fn record_attempt(&self, proxy_id: &str) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(proxy_id.to_string()).or_default();
        entry.requests_sent += 1;
        if entry.first_request_at.is_none() {
            entry.first_request_at = Some(Instant::now());
        }
    }

    /// Fold a verdict into the entry and return a consistent snapshot.
    ///
    /// Success resets `consecutive_failures`; any other verdict bumps both
    /// failure counters. The returned snapshot is what the disable policy
    /// must be evaluated against.
    pub fn record_outcome(&self, proxy_id: &str, verdict: Verdict) -> LedgerEntry {
        let mut entries = self.entries.lock();
        let entry = entries.entry(proxy_id.to_string()).or_default();
        if verdict.is_success() {
            entry.consecutive_failures = 0;
        } else {
            entry.requests_failed += 1;
            entry.consecutive_failures += 1;
        }
        entry.clone()
    }

    /// Mark the entry disabled. Idempotent: returns `true` only for the
    /// call that performed the transition, so a lifetime is recorded
    /// exactly once per proxy.
    pub fn mark_disabled(&self, proxy_id: &str, reason: Verdict, at: Instant) -> bool {
        let mut entries = self.entries.lock();
        let entry = entries.entry(proxy_id.to_string()).or_default();
        if entry.disabled {
            return false;
        }
        entry.disabled = true;
        entry.disable_reason = Some(reason);
        entry.disabled_at = Some(at);
        true
    }

    /// Snapshot of one entry, if the proxy has been seen.
    pub fn snapshot(&self, proxy_id: &str) -> Option<LedgerEntry> {
        self.entries.lock().get(proxy_id).cloned()
    }

    /// Snapshot of every entry, for summary building after the run.
    pub fn entries(&self) -> Vec<(String, LedgerEntry)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }
}
