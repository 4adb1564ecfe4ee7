//! OBD-II Session Polling
//!
//! Drives repeated PID reads for one logging session and fans each decoded
//! sample out to the CSV log, the driver evaluator, the failure predictor
//! and the live display.

mod context;
mod predictor;
mod scheduler;
mod sinks;

pub use context::{StopHandle, TelemetryContext, TelemetrySnapshot};
pub use predictor::{
    FailurePredictor, NullPredictor, SequenceModel, WindowedPredictor, FEATURE_COUNT, WINDOW_SIZE,
};
pub use scheduler::{
    PidScheduler, SchedulerConfig, SessionSummary, CORE_EVAL_PIDS, DEFAULT_LOGGED_PIDS,
};
pub use sinks::{DisplaySink, Sinks, TracingDisplay};

use thiserror::Error;

/// Errors that end a polling session
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Polling requires a negotiated adapter
    #[error("OBD error: {0}")]
    Obd(#[from] obd_protocol::ObdError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),
}
