//! Runs one test loop per enabled proxy and aggregates the results.

use std::sync::Arc;

use futures::future;
use log::{error, info};
use tokio::sync::watch;

use crate::classifier::ValidationRules;
use crate::events::EventSender;
use crate::ledger::ProxyLedger;
use crate::policy::DisablePolicyConfig;
use crate::proxy::Proxy;
use crate::report::{OutcomeStatus, ProxyOutcome, RunSummary};
use crate::runner::{ApiProber, ProxyRunner};

/// Starts one [`ProxyRunner`] per enabled proxy, waits for every runner to
/// reach a terminal state, and folds the ledger into a [`RunSummary`].
pub struct TestOrchestrator {
    prober: Arc<dyn ApiProber>,
    rules: ValidationRules,
    policy: DisablePolicyConfig,
    request_budget: Option<u64>,
    events: Option<EventSender>,
}

impl TestOrchestrator {
    pub fn new(
        prober: Arc<dyn ApiProber>,
        rules: ValidationRules,
        policy: DisablePolicyConfig,
    ) -> Self {
        Self {
            prober,
            rules,
            policy,
            request_budget: None,
            events: None,
        }
    }

    /// Cap the number of requests each proxy may issue. Without a budget,
    /// runners only stop on disable or cancellation.
    pub fn with_request_budget(mut self, budget: u64) -> Self {
        self.request_budget = Some(budget);
        self
    }

    /// Attach an event channel for progress observers.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the whole pool. Proxies disabled in configuration are counted as
    /// skipped and never scheduled; everything else runs concurrently until
    /// a terminal state or the stop signal.
    pub async fn run(&self, proxies: &[Proxy], stop: watch::Receiver<bool>) -> RunSummary {
        let ledger = Arc::new(ProxyLedger::new());
        let mut outcomes = Vec::with_capacity(proxies.len());
        let mut handles = Vec::new();

        for proxy in proxies {
            if !proxy.enabled {
                outcomes.push(ProxyOutcome::skipped(proxy.id(), proxy.interval_ms));
                continue;
            }
            let runner = ProxyRunner::new(
                proxy.clone(),
                Arc::clone(&self.prober),
                Arc::clone(&ledger),
                self.rules.clone(),
                self.policy,
                self.request_budget,
                stop.clone(),
                self.events.clone(),
            );
            handles.push(tokio::spawn(runner.run()));
        }

        let enabled_count = handles.len();
        info!(
            "testing {} enabled proxies ({} skipped)",
            enabled_count,
            proxies.len() - enabled_count
        );

        for result in future::join_all(handles).await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("proxy runner task failed: {}", e),
            }
        }

        let disabled_count = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Disabled)
            .count();
        let completed_count = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Completed)
            .count();
        let skipped_count = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Skipped)
            .count();

        RunSummary {
            enabled_count,
            disabled_count,
            completed_count,
            skipped_count,
            outcomes,
        }
    }
}
