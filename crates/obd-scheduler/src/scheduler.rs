//! PID Scheduler Implementation

use crate::context::{StopHandle, TelemetryContext, TelemetrySnapshot};
use crate::predictor::FEATURE_COUNT;
use crate::sinks::Sinks;
use crate::SchedulerError;
use driver_score::{DriverEvaluator, DriverSample, Scores};
use obd_protocol::{column_for, DecodedSample, ObdClient, Pid, Transport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// PIDs the driver evaluator reads, polled whether logged or not
pub const CORE_EVAL_PIDS: [Pid; 5] = [
    Pid::Rpm,
    Pid::Speed,
    Pid::CoolantTemp,
    Pid::Maf,
    Pid::ThrottlePosition,
];

/// Logged when the user selects nothing
pub const DEFAULT_LOGGED_PIDS: [u8; 2] = [0x0C, 0x05];

/// Configuration for the PID scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause between polling cycles (default ~5 Hz)
    pub period_ms: u64,
    /// Mode 01 PIDs written to the CSV log, in column order
    pub logged_pids: Vec<u8>,
    /// Run the driver evaluator on every sample
    pub evaluate_driver: bool,
    /// Skip PIDs the ECU does not advertise instead of requesting them
    pub skip_unsupported: bool,
    /// End the session after this many samples
    pub max_samples: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_ms: 200,
            logged_pids: DEFAULT_LOGGED_PIDS.to_vec(),
            evaluate_driver: true,
            skip_unsupported: false,
            max_samples: None,
        }
    }
}

impl SchedulerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Outcome of one polling session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Session start (Unix seconds)
    pub start_time_sec: u64,
    /// Session end (Unix seconds)
    pub end_time_sec: u64,
    /// Completed polling cycles
    pub samples: u64,
    /// Final driver scores, absent when evaluation is off
    pub scores: Option<Scores>,
    /// The adapter went away before the session was stopped
    pub connection_lost: bool,
}

/// Caller-driven polling loop for one logging session.
///
/// Owns the driver evaluator for the session's duration and is the only
/// writer of the [`TelemetryContext`].
pub struct PidScheduler {
    config: SchedulerConfig,
    logged: Vec<u8>,
    polled: Vec<Pid>,
    evaluator: Option<DriverEvaluator>,
    context: Arc<TelemetryContext>,
    stop: StopHandle,
    running: bool,
}

impl PidScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let logged = if config.logged_pids.is_empty() {
            DEFAULT_LOGGED_PIDS.to_vec()
        } else {
            config.logged_pids.clone()
        };

        let polled: BTreeSet<Pid> = logged
            .iter()
            .filter_map(|code| Pid::from_hex(*code))
            .chain(CORE_EVAL_PIDS)
            .collect();

        let evaluator = config.evaluate_driver.then(DriverEvaluator::new);

        info!(
            "PID scheduler created: {} logged, {} polled",
            logged.len(),
            polled.len()
        );

        Self {
            config,
            logged,
            polled: polled.into_iter().collect(),
            evaluator,
            context: Arc::new(TelemetryContext::new()),
            stop: StopHandle::new(),
            running: false,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// PIDs written to the log, in column order
    pub fn logged_pids(&self) -> &[u8] {
        &self.logged
    }

    /// PIDs requested each cycle, ascending
    pub fn polled_pids(&self) -> &[Pid] {
        &self.polled
    }

    /// CSV header: elapsed seconds, then one column per logged PID
    pub fn header(&self) -> Vec<String> {
        std::iter::once("time_s".to_string())
            .chain(self.logged.iter().map(|code| column_for(*code)))
            .collect()
    }

    /// Handle that ends the session at the next cycle boundary
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn context(&self) -> Arc<TelemetryContext> {
        Arc::clone(&self.context)
    }

    /// Stop the scheduler
    pub fn stop(&self) {
        info!("Stopping PID scheduler");
        self.stop.stop();
    }

    /// Check if scheduler is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run the scheduler loop until stopped, the sample limit is reached or
    /// the adapter goes away.
    pub async fn run<T, W>(
        &mut self,
        client: &mut ObdClient<T>,
        mut sinks: Sinks<'_, W>,
    ) -> Result<SessionSummary, SchedulerError>
    where
        T: Transport,
        W: Write,
    {
        client.ensure_connected()?;

        if let Some(csv) = sinks.csv.as_deref_mut() {
            csv.write_header(self.header())?;
        }

        info!("Starting PID scheduler");
        self.running = true;

        let start_time_sec = unix_millis() / 1000;
        let started = Instant::now();
        let mut samples = 0u64;
        let mut last_logged_second = None;
        let mut connection_lost = false;

        loop {
            if self.stop.is_stopped() {
                info!("Stop requested after {} samples", samples);
                break;
            }
            if self.config.max_samples.is_some_and(|max| samples >= max) {
                info!("Sample limit of {} reached", samples);
                break;
            }
            if !client.is_connected() {
                warn!("Adapter connection lost after {} samples", samples);
                connection_lost = true;
                break;
            }

            let elapsed_sec = started.elapsed().as_secs();
            let sample = self.poll_once(client).await;

            let scores = self
                .evaluator
                .as_mut()
                .map(|evaluator| evaluator.on_sample(&driver_sample(&sample)));

            if last_logged_second != Some(elapsed_sec) {
                last_logged_second = Some(elapsed_sec);
                if let Some(csv) = sinks.csv.as_deref_mut() {
                    let row = self.row(elapsed_sec, &sample);
                    if let Err(e) = csv.write_row(row) {
                        warn!("Failed to write CSV row: {}", e);
                    }
                }
            }

            let failure_score = sinks.predictor.add_sample(features(&sample));

            let mut status = format!(
                "{:.0} km/h, {:.0} rpm",
                sample.number(Pid::Speed).unwrap_or(0.0),
                sample.number(Pid::Rpm).unwrap_or(0.0)
            );
            if let Some(score) = failure_score {
                status.push_str(&format!(", fail={score:.3}"));
            }
            sinks.display.update(&status, &sample);

            self.context.publish(TelemetrySnapshot {
                cycle: samples,
                sample,
                scores,
                failure_score,
            });
            samples += 1;

            tokio::time::sleep(self.config.period()).await;
        }

        self.running = false;
        let summary = SessionSummary {
            start_time_sec,
            end_time_sec: unix_millis() / 1000,
            samples,
            scores: self.evaluator.as_ref().map(DriverEvaluator::scores),
            connection_lost,
        };
        info!("PID scheduler stopped: {:?}", summary);
        Ok(summary)
    }

    async fn poll_once<T: Transport>(&self, client: &mut ObdClient<T>) -> DecodedSample {
        let mut sample = DecodedSample::new(unix_millis());
        for &pid in &self.polled {
            if self.config.skip_unsupported && !client.is_supported(pid.as_hex()) {
                sample.insert(pid, None);
                continue;
            }
            let value = client.read(pid).await;
            if value.is_none() {
                debug!("{} unavailable this cycle", pid);
            }
            sample.insert(pid, value);
        }
        sample
    }

    fn row(&self, elapsed_sec: u64, sample: &DecodedSample) -> Vec<String> {
        std::iter::once(elapsed_sec.to_string())
            .chain(self.logged.iter().map(|code| {
                Pid::from_hex(*code)
                    .map(|pid| sample.cell(pid))
                    .unwrap_or_default()
            }))
            .collect()
    }
}

fn driver_sample(sample: &DecodedSample) -> DriverSample {
    DriverSample {
        timestamp_ms: sample.timestamp_ms,
        speed_kmh: sample.number(Pid::Speed),
        rpm: sample.number(Pid::Rpm),
        throttle_pct: sample.number(Pid::ThrottlePosition),
        maf_gps: sample.number(Pid::Maf),
        coolant_c: sample.number(Pid::CoolantTemp),
    }
}

fn features(sample: &DecodedSample) -> [f64; FEATURE_COUNT] {
    [Pid::Rpm, Pid::Speed, Pid::CoolantTemp].map(|pid| sample.number(pid).unwrap_or(0.0))
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
