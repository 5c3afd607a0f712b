//! Command-line entry point.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use log::{error, info, warn};
use tokio::sync::watch;

use limitprobe::{
    events, format_ms, AppConfig, OutcomeStatus, ReqwestProber, RunnerEvent, TestOrchestrator,
};

const RESULTS_FILE: &str = "test_results.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config_path = Path::new(&config_path);

    let mut config =
        AppConfig::load(config_path).with_context(|| format!("loading {}", config_path.display()))?;
    let mut proxies = config.parse_proxies().context("parsing proxy lines")?;

    // Ctrl-C flips the stop flag; runners finish their in-flight request
    // and stop scheduling new ones.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stop requested, letting in-flight requests finish");
            let _ = stop_tx.send(true);
        }
    });

    let (event_tx, mut event_rx) = events::channel();
    let renderer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            render(event);
        }
    });

    let prober = Arc::new(ReqwestProber::new(config.api.clone()));
    let mut orchestrator =
        TestOrchestrator::new(prober, config.api.validation.rules(), config.policy)
            .with_events(event_tx);
    if let Some(budget) = config.request_budget {
        orchestrator = orchestrator.with_request_budget(budget);
    }

    let summary = orchestrator.run(&proxies, stop_rx).await;
    drop(orchestrator);
    renderer.await.context("event renderer task")?;

    // Persist: flip disabled proxies off, merge lifetimes, back up and save.
    let disabled_ids: HashSet<String> = summary
        .outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Disabled)
        .map(|o| o.ip.clone())
        .collect();
    for proxy in &mut proxies {
        if disabled_ids.contains(&proxy.id()) {
            proxy.enabled = false;
        }
    }
    config.apply_run(&proxies, summary.lifetime_records());
    config
        .save(config_path)
        .with_context(|| format!("saving {}", config_path.display()))?;

    let results_path = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(RESULTS_FILE);
    limitprobe::config::write_results(&results_path, &summary.outcomes)
        .with_context(|| format!("writing {}", results_path.display()))?;
    info!("results written to {}", results_path.display());

    info!("run finished: {} enabled", summary.enabled_count);
    info!("  disabled:  {}", summary.disabled_count);
    info!("  completed: {}", summary.completed_count);
    info!("  skipped:   {}", summary.skipped_count);
    for record in summary.lifetime_records() {
        info!(
            "  {} survived {} at {} interval ({} errors, {:.1}%)",
            record.ip,
            format_ms(record.lifetime_ms),
            format_ms(record.interval),
            record.errors,
            record.errors_percents
        );
    }

    Ok(())
}

fn render(event: RunnerEvent) {
    match event {
        RunnerEvent::Attempt { .. } => {}
        RunnerEvent::Outcome {
            proxy,
            request_num,
            verdict,
        } => {
            if verdict.is_success() {
                info!("request #{} ok | proxy {}", request_num, proxy);
            } else {
                error!(
                    "request #{} failed | reason: {} | proxy {}",
                    request_num, verdict, proxy
                );
            }
        }
        RunnerEvent::Disabled {
            proxy,
            reason,
            lifetime_ms,
        } => {
            warn!(
                "disabled proxy {} | reason: {} | lifetime: {}",
                proxy,
                reason,
                format_ms(lifetime_ms)
            );
        }
        RunnerEvent::Completed {
            proxy,
            requests_sent,
        } => {
            info!(
                "proxy {} completed after {} requests",
                proxy, requests_sent
            );
        }
    }
}
