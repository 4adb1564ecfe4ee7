//! Driver Behaviour Scoring
//!
//! Consumes periodic telemetry samples and keeps bounded 0-100 scores for
//! acceleration smoothness and fuel economy.

mod evaluator;

pub use evaluator::{DriverEvaluator, DriverSample, Regime, Scores};
