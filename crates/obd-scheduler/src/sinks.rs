//! Per-cycle consumers of decoded samples

use crate::predictor::FailurePredictor;
use obd_protocol::DecodedSample;
use std::io::Write;
use storage::CsvLogger;
use tracing::info;

/// Live view of the session, updated once per polling cycle
pub trait DisplaySink {
    fn update(&mut self, status: &str, sample: &DecodedSample);
}

/// Display that writes status lines to the log
#[derive(Debug, Clone)]
pub struct TracingDisplay {
    every: u64,
    updates: u64,
    logged: u64,
}

impl TracingDisplay {
    /// Log one of every `every` updates (0 is treated as 1)
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            updates: 0,
            logged: 0,
        }
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Status lines actually written to the log
    pub fn logged(&self) -> u64 {
        self.logged
    }
}

impl Default for TracingDisplay {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DisplaySink for TracingDisplay {
    fn update(&mut self, status: &str, sample: &DecodedSample) {
        if self.updates % self.every == 0 {
            let readings: Vec<String> = sample
                .values
                .iter()
                .filter_map(|(pid, value)| {
                    let value = value.as_ref()?;
                    Some(format!("{}={}", pid.label(), value.to_display(pid.precision())))
                })
                .collect();
            info!(readings = %readings.join(", "), "{}", status);
            self.logged += 1;
        }
        self.updates += 1;
    }
}

/// Everything a polling session writes to besides the telemetry context
pub struct Sinks<'a, W: Write> {
    /// Absent when the session keeps no CSV log
    pub csv: Option<&'a mut CsvLogger<W>>,
    pub display: &'a mut dyn DisplaySink,
    pub predictor: &'a mut dyn FailurePredictor,
}
