//! Per-session telemetry context
//!
//! The polling loop is the only writer. Readers (display, API, loggers)
//! subscribe to whole snapshots, so they never observe a half-updated
//! sample or score triple.

use driver_score::Scores;
use obd_protocol::DecodedSample;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Latest published state of a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetrySnapshot {
    /// Polling cycle that produced this snapshot (0-based)
    pub cycle: u64,
    pub sample: DecodedSample,
    /// Driver scores, absent when evaluation is off
    pub scores: Option<Scores>,
    pub failure_score: Option<f64>,
}

/// Single-writer, many-reader publication of [`TelemetrySnapshot`]s
#[derive(Debug)]
pub struct TelemetryContext {
    tx: watch::Sender<TelemetrySnapshot>,
}

impl TelemetryContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TelemetrySnapshot::default());
        Self { tx }
    }

    /// Receive every snapshot published from now on
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.tx.subscribe()
    }

    /// Copy of the most recent snapshot
    pub fn latest(&self) -> TelemetrySnapshot {
        self.tx.borrow().clone()
    }

    pub(crate) fn publish(&self, snapshot: TelemetrySnapshot) {
        self.tx.send_replace(snapshot);
    }
}

impl Default for TelemetryContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation for the polling loop.
///
/// Checked between polling cycles only; an in-flight read always runs to
/// completion or timeout first.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_see_latest_snapshot() {
        let context = TelemetryContext::new();
        let mut rx = context.subscribe();

        context.publish(TelemetrySnapshot {
            cycle: 3,
            ..Default::default()
        });

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().cycle, 3);
        assert_eq!(context.latest().cycle, 3);
    }

    #[test]
    fn test_stop_handle_shared() {
        let handle = StopHandle::new();
        let other = handle.clone();
        other.stop();
        assert!(handle.is_stopped());
    }
}
