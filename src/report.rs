//! Run output shapes: per-proxy outcomes, lifetime records, and the
//! run summary handed to persistence and reporting.

use serde::{Deserialize, Serialize};

use crate::classifier::Verdict;
use crate::ledger::LedgerEntry;

/// Write-once record of how long a proxy survived before being disabled.
///
/// This exact shape is persisted into the config's `lifetimes` map keyed by
/// `host:port`, and reloaded on later runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeRecord {
    /// `host:port` of the proxy.
    pub ip: String,
    /// Configured request interval in milliseconds.
    pub interval: u64,
    /// Wall-clock time from first request to disable.
    pub lifetime_ms: u64,
    /// Total failed requests.
    pub errors: u64,
    /// `errors / requests_sent * 100`.
    pub errors_percents: f64,
}

/// Terminal state of one tested proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Hit a disable threshold during the run.
    Disabled,
    /// Finished its request budget (or the run was cancelled) unscathed.
    Completed,
    /// Was disabled in configuration before the run started; never scheduled.
    Skipped,
}

/// One line of the results file, written for every proxy in the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyOutcome {
    /// `host:port` of the proxy.
    pub ip: String,
    pub status: OutcomeStatus,
    /// The verdict that triggered the disable; null for completed/skipped.
    pub disable_reason: Option<Verdict>,
    pub interval_ms: u64,
    pub requests_sent: u64,
    pub requests_failed: u64,
    pub errors_percents: f64,
    /// Elapsed time from first request to the terminal state, when any
    /// request was made.
    pub lifetime_ms: Option<u64>,
}

impl ProxyOutcome {
    /// Build an outcome from a terminal ledger snapshot.
    pub fn from_entry(
        ip: String,
        interval_ms: u64,
        status: OutcomeStatus,
        entry: &LedgerEntry,
        lifetime_ms: Option<u64>,
    ) -> Self {
        Self {
            ip,
            status,
            disable_reason: entry.disable_reason,
            interval_ms,
            requests_sent: entry.requests_sent,
            requests_failed: entry.requests_failed,
            errors_percents: entry.failure_percentage(),
            lifetime_ms,
        }
    }

    pub fn skipped(ip: String, interval_ms: u64) -> Self {
        Self {
            ip,
            status: OutcomeStatus::Skipped,
            disable_reason: None,
            interval_ms,
            requests_sent: 0,
            requests_failed: 0,
            errors_percents: 0.0,
            lifetime_ms: None,
        }
    }

    /// Lifetime record for persistence; only disabled proxies produce one.
    pub fn lifetime_record(&self) -> Option<LifetimeRecord> {
        if self.status != OutcomeStatus::Disabled {
            return None;
        }
        Some(LifetimeRecord {
            ip: self.ip.clone(),
            interval: self.interval_ms,
            lifetime_ms: self.lifetime_ms.unwrap_or(0),
            errors: self.requests_failed,
            errors_percents: self.errors_percents,
        })
    }
}

/// Aggregate result of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub enabled_count: usize,
    pub disabled_count: usize,
    pub completed_count: usize,
    pub skipped_count: usize,
    pub outcomes: Vec<ProxyOutcome>,
}

impl RunSummary {
    /// Lifetime records of every proxy disabled during this run.
    pub fn lifetime_records(&self) -> Vec<LifetimeRecord> {
        self.outcomes
            .iter()
            .filter_map(ProxyOutcome::lifetime_record)
            .collect()
    }
}

/// Format milliseconds for log output: `950ms`, `4.20s`, `2m 5.00s`, `1.50h`.
pub fn format_ms(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else if ms < 3_600_000 {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) as f64 / 1000.0;
        format!("{}m {:.2}s", minutes, seconds)
    } else {
        format!("{:.2}h", ms as f64 / 3_600_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_percents_round_trip() {
        let entry = LedgerEntry {
            requests_sent: 20,
            requests_failed: 2,
            disabled: true,
            disable_reason: Some(Verdict::RateLimited),
            ..Default::default()
        };
        let outcome = ProxyOutcome::from_entry(
            "1.2.3.4:8080".into(),
            1000,
            OutcomeStatus::Disabled,
            &entry,
            Some(19_000),
        );
        assert_eq!(outcome.errors_percents, 10.0);

        let record = outcome.lifetime_record().unwrap();
        assert_eq!(record.ip, "1.2.3.4:8080");
        assert_eq!(record.interval, 1000);
        assert_eq!(record.lifetime_ms, 19_000);
        assert_eq!(record.errors, 2);
        assert_eq!(record.errors_percents, 10.0);
    }

    #[test]
    fn completed_proxy_has_no_lifetime_record_and_null_reason() {
        let entry = LedgerEntry {
            requests_sent: 50,
            ..Default::default()
        };
        let outcome = ProxyOutcome::from_entry(
            "1.2.3.4:8080".into(),
            500,
            OutcomeStatus::Completed,
            &entry,
            Some(25_000),
        );
        assert!(outcome.lifetime_record().is_none());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        assert!(json["disable_reason"].is_null());
    }

    #[test]
    fn lifetime_record_serialization_shape() {
        let record = LifetimeRecord {
            ip: "9.9.9.9:3128".into(),
            interval: 2000,
            lifetime_ms: 60_500,
            errors: 3,
            errors_percents: 7.5,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ip": "9.9.9.9:3128",
                "interval": 2000,
                "lifetime_ms": 60500,
                "errors": 3,
                "errors_percents": 7.5,
            })
        );
    }

    #[test]
    fn format_ms_ranges() {
        assert_eq!(format_ms(950), "950ms");
        assert_eq!(format_ms(4_200), "4.20s");
        assert_eq!(format_ms(125_000), "2m 5.00s");
        assert_eq!(format_ms(5_400_000), "1.50h");
    }
}
