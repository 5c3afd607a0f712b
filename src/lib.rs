//! # limitprobe
//!
//! A rate limit tester for HTTP APIs behind a pool of proxies.
//!
//! Each enabled proxy probes the target API on its own fixed cadence. Every
//! response is classified as a success or one of several failure kinds, and
//! a proxy is removed from rotation once it crosses the configured failure
//! thresholds. The outcome of each proxy (how long it survived at its
//! interval, and why it was disabled) is persisted for later reuse.

pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod orchestrator;
pub mod policy;
pub mod proxy;
pub mod report;
pub mod runner;

pub use classifier::{classify, FieldEquals, ProbeOutcome, ValidationRules, Verdict};
pub use config::{ApiConfig, AppConfig, ValidationConfig};
pub use error::ConfigError;
pub use events::RunnerEvent;
pub use ledger::{LedgerEntry, ProxyLedger};
pub use orchestrator::TestOrchestrator;
pub use policy::{should_disable, DisablePolicyConfig};
pub use proxy::{Proxy, ProxyProtocol};
pub use report::{format_ms, LifetimeRecord, OutcomeStatus, ProxyOutcome, RunSummary};
pub use runner::{ApiProber, ProxyRunner, ReqwestProber};
