//! Per-proxy test loop.
//!
//! A [`ProxyRunner`] owns one proxy's lifecycle: it issues requests at the
//! proxy's configured interval, classifies every response, folds the verdict
//! into the ledger, and stops as soon as the disable policy triggers or the
//! request budget runs out.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use tokio::sync::watch;

use crate::classifier::{classify, ProbeOutcome, ValidationRules};
use crate::config::ApiConfig;
use crate::events::{EventSender, RunnerEvent};
use crate::ledger::ProxyLedger;
use crate::policy::{should_disable, DisablePolicyConfig};
use crate::proxy::Proxy;
use crate::report::{OutcomeStatus, ProxyOutcome};

/// Issues one probe of the target API through a given proxy.
///
/// The seam between the test loop and the network; tests substitute a
/// scripted implementation.
#[async_trait]
pub trait ApiProber: Send + Sync {
    async fn probe(&self, proxy: &Proxy) -> ProbeOutcome;
}

/// Production prober: one reqwest client per probe, configured with the
/// proxy and the API timeout.
pub struct ReqwestProber {
    api: ApiConfig,
}

impl ReqwestProber {
    pub fn new(api: ApiConfig) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ApiProber for ReqwestProber {
    async fn probe(&self, proxy: &Proxy) -> ProbeOutcome {
        let reqwest_proxy = match proxy.to_reqwest_proxy() {
            Ok(p) => p,
            Err(e) => return ProbeOutcome::TransportFailure(e.to_string()),
        };

        let client = match reqwest::Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.api.timeout())
            .build()
        {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::TransportFailure(e.to_string()),
        };

        let method = self.api.method();
        let mut request = client.request(method.clone(), &self.api.url);
        request = if method == http::Method::GET {
            request.query(&self.api.params)
        } else {
            request.json(&self.api.params)
        };
        for (name, value) in &self.api.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(body) => ProbeOutcome::Http { status, body },
                    Err(e) => ProbeOutcome::TransportFailure(e.to_string()),
                }
            }
            // Timeouts land here too.
            Err(e) => ProbeOutcome::TransportFailure(e.to_string()),
        }
    }
}

/// Test loop for a single proxy. Terminal states are `Disabled` (policy
/// triggered) and `Completed` (budget exhausted or run cancelled).
pub struct ProxyRunner {
    proxy: Proxy,
    prober: Arc<dyn ApiProber>,
    ledger: Arc<ProxyLedger>,
    rules: ValidationRules,
    policy: DisablePolicyConfig,
    request_budget: Option<u64>,
    stop: watch::Receiver<bool>,
    events: Option<EventSender>,
}

impl ProxyRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        proxy: Proxy,
        prober: Arc<dyn ApiProber>,
        ledger: Arc<ProxyLedger>,
        rules: ValidationRules,
        policy: DisablePolicyConfig,
        request_budget: Option<u64>,
        stop: watch::Receiver<bool>,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            proxy,
            prober,
            ledger,
            rules,
            policy,
            request_budget,
            stop,
            events,
        }
    }

    /// Run to a terminal state and report the outcome.
    pub async fn run(mut self) -> ProxyOutcome {
        let proxy_id = self.proxy.id();
        let interval = Duration::from_millis(self.proxy.interval_ms.max(1));
        let quota =
            Quota::with_period(interval).unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
        let limiter = RateLimiter::direct(quota);

        let mut request_num: u64 = 0;
        loop {
            if let Some(budget) = self.request_budget {
                if request_num >= budget {
                    return self.finish(&proxy_id, OutcomeStatus::Completed);
                }
            }

            // Wait for the pacing slot. The first request fires immediately;
            // a stop signal interrupts the wait but never an in-flight call.
            tokio::select! {
                _ = limiter.until_ready() => {}
                changed = self.stop.changed() => {
                    if changed.is_err() {
                        // Stop sender gone; no signal can arrive anymore.
                        limiter.until_ready().await;
                    }
                }
            }
            if *self.stop.borrow() {
                return self.finish(&proxy_id, OutcomeStatus::Completed);
            }

            request_num += 1;
            self.ledger.record_attempt(&proxy_id);
            self.emit(RunnerEvent::Attempt {
                proxy: proxy_id.clone(),
                request_num,
            });

            let outcome = self.prober.probe(&self.proxy).await;
            let verdict = classify(&outcome, &self.rules);
            self.emit(RunnerEvent::Outcome {
                proxy: proxy_id.clone(),
                request_num,
                verdict,
            });

            let entry = self.ledger.record_outcome(&proxy_id, verdict);
            if should_disable(&entry, &self.policy) {
                let now = Instant::now();
                if self.ledger.mark_disabled(&proxy_id, verdict, now) {
                    let lifetime_ms = entry
                        .first_request_at
                        .map(|first| now.duration_since(first).as_millis() as u64)
                        .unwrap_or(0);
                    self.emit(RunnerEvent::Disabled {
                        proxy: proxy_id.clone(),
                        reason: verdict,
                        lifetime_ms,
                    });
                }
                return self.finish(&proxy_id, OutcomeStatus::Disabled);
            }
        }
    }

    fn finish(&self, proxy_id: &str, status: OutcomeStatus) -> ProxyOutcome {
        let entry = self.ledger.snapshot(proxy_id).unwrap_or_default();
        let lifetime_ms = match status {
            OutcomeStatus::Disabled => entry.lifetime().map(|d| d.as_millis() as u64),
            _ => entry
                .first_request_at
                .map(|first| first.elapsed().as_millis() as u64),
        };
        if status == OutcomeStatus::Completed {
            self.emit(RunnerEvent::Completed {
                proxy: proxy_id.to_string(),
                requests_sent: entry.requests_sent,
            });
        }
        ProxyOutcome::from_entry(
            proxy_id.to_string(),
            self.proxy.interval_ms,
            status,
            &entry,
            lifetime_ms,
        )
    }

    fn emit(&self, event: RunnerEvent) {
        if let Some(sender) = &self.events {
            // A dropped receiver just means nobody is watching.
            let _ = sender.send(event);
        }
    }
}
