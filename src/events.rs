//! Structured events emitted by runners.
//!
//! Rendering is an observer concern: runners push events on a channel and
//! keep no knowledge of how (or whether) they are displayed.

use tokio::sync::mpsc;

use crate::classifier::Verdict;

/// One event in a proxy's test loop.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// A request is about to be dispatched.
    Attempt { proxy: String, request_num: u64 },
    /// A response was classified.
    Outcome {
        proxy: String,
        request_num: u64,
        verdict: Verdict,
    },
    /// The proxy crossed a disable threshold.
    Disabled {
        proxy: String,
        reason: Verdict,
        lifetime_ms: u64,
    },
    /// The runner reached `Completed` without being disabled.
    Completed { proxy: String, requests_sent: u64 },
}

/// Sender half handed to runners. `None` means nobody is listening.
pub type EventSender = mpsc::UnboundedSender<RunnerEvent>;

/// Create an event channel for a run.
pub fn channel() -> (EventSender, mpsc::UnboundedReceiver<RunnerEvent>) {
    mpsc::unbounded_channel()
}
