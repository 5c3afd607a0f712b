//! The disable policy: when a proxy leaves the rotation.

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerEntry;

/// Thresholds for removing a proxy from rotation. Loaded once per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DisablePolicyConfig {
    /// Consecutive failures that disable a proxy.
    #[serde(default = "default_consecutive_threshold")]
    pub consecutive_threshold: u32,
    /// Lifetime failure percentage (0-100) that disables a proxy.
    #[serde(default = "default_percentage_threshold")]
    pub percentage_threshold: f64,
}

fn default_consecutive_threshold() -> u32 {
    3
}

fn default_percentage_threshold() -> f64 {
    5.0
}

impl Default for DisablePolicyConfig {
    fn default() -> Self {
        Self {
            consecutive_threshold: default_consecutive_threshold(),
            percentage_threshold: default_percentage_threshold(),
        }
    }
}

/// Pure decision: should this entry be disabled right now?
///
/// Evaluated against the snapshot returned by every ledger update, so the
/// policy reacts at single-request granularity. The percentage arm only
/// activates once at least one request has been sent.
pub fn should_disable(entry: &LedgerEntry, config: &DisablePolicyConfig) -> bool {
    if entry.consecutive_failures >= config.consecutive_threshold {
        return true;
    }
    entry.requests_sent >= 1 && entry.failure_percentage() >= config.percentage_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sent: u64, failed: u64, consecutive: u32) -> LedgerEntry {
        LedgerEntry {
            requests_sent: sent,
            requests_failed: failed,
            consecutive_failures: consecutive,
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let config = DisablePolicyConfig::default();
        assert_eq!(config.consecutive_threshold, 3);
        assert_eq!(config.percentage_threshold, 5.0);
    }

    #[test]
    fn consecutive_threshold_fires_at_boundary() {
        let config = DisablePolicyConfig::default();
        assert!(!should_disable(&entry(10, 2, 2), &config));
        assert!(should_disable(&entry(10, 3, 3), &config));
        assert!(should_disable(&entry(10, 4, 4), &config));
    }

    #[test]
    fn percentage_threshold_fires_exactly_at_crossing() {
        let config = DisablePolicyConfig {
            consecutive_threshold: 1000,
            percentage_threshold: 5.0,
        };
        // 4/100 = 4% stays, 5/100 = 5% fires.
        assert!(!should_disable(&entry(100, 4, 1), &config));
        assert!(should_disable(&entry(100, 5, 1), &config));
        // 6 failures spread over 120 requests is exactly 5%.
        assert!(should_disable(&entry(120, 6, 1), &config));
        assert!(!should_disable(&entry(121, 6, 0), &config));
    }

    #[test]
    fn percentage_arm_needs_at_least_one_request() {
        let config = DisablePolicyConfig {
            consecutive_threshold: 1000,
            percentage_threshold: 0.0,
        };
        // Threshold of 0% would otherwise fire before any request.
        assert!(!should_disable(&entry(0, 0, 0), &config));
        assert!(should_disable(&entry(1, 0, 0), &config));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: DisablePolicyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.consecutive_threshold, 3);
        assert_eq!(config.percentage_threshold, 5.0);

        let config: DisablePolicyConfig =
            serde_json::from_str(r#"{"consecutive_threshold":5,"percentage_threshold":12.5}"#)
                .unwrap();
        assert_eq!(config.consecutive_threshold, 5);
        assert_eq!(config.percentage_threshold, 12.5);
    }
}
