//! OBD-II Session Logger
//!
//! Connects to an ELM327 adapter (or the built-in simulator), negotiates a
//! bus protocol, then polls telemetry into a CSV log while scoring the
//! driver. Each finished session is appended to the session history.

mod settings;

pub use settings::{AppConfig, LoggerConfig, DEFAULT_CONFIG_FILE, MOCK_DEVICE};

use anyhow::Context;
use chrono::Local;
use obd_protocol::{column_for, ObdClient, SerialTransport, SimulatedAdapter, Transport};
use obd_scheduler::{NullPredictor, PidScheduler, Sinks, TracingDisplay};
use storage::{log_file_name, CsvLogger, SessionRecord, SessionStore};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let max_level = level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run one logging session on the configured device
pub async fn run(config: &AppConfig) -> anyhow::Result<SessionRecord> {
    if config.is_mock() {
        info!("Using simulated adapter");
        run_session(SimulatedAdapter::demo(), config).await
    } else {
        let transport = SerialTransport::open(&config.logger.device, config.logger.baud_rate)
            .with_context(|| format!("Failed to open {}", config.logger.device))?;
        run_session(transport, config).await
    }
}

/// Negotiate, poll until stopped and persist the session record
pub async fn run_session<T: Transport>(
    transport: T,
    config: &AppConfig,
) -> anyhow::Result<SessionRecord> {
    let started = Local::now();
    let mut client = ObdClient::new(
        transport,
        config.framer.clone(),
        config.negotiator.clone(),
    );

    let negotiated = client
        .negotiate()
        .await
        .context("Protocol negotiation failed")?;
    info!(
        "Connected: {} ({})",
        negotiated.candidate.protocol.description(),
        negotiated.candidate.directives.join(" ")
    );

    let mut scheduler = PidScheduler::new(config.scheduler.clone());

    let supported = client.refresh_supported().await;
    let unsupported: Vec<String> = scheduler
        .logged_pids()
        .iter()
        .filter(|code| !supported.contains(**code))
        .map(|code| column_for(*code))
        .collect();
    if !unsupported.is_empty() {
        warn!("ECU does not advertise: {}", unsupported.join(", "));
    }

    let csv_path = config.logger.log_dir.join(log_file_name(&started));
    let mut csv = CsvLogger::create(&csv_path)?;

    let stop = scheduler.stop_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing session");
            stop.stop();
        }
    });

    let mut display = TracingDisplay::new(config.logger.status_every);
    let mut predictor = NullPredictor;
    let result = scheduler
        .run(
            &mut client,
            Sinks {
                csv: Some(&mut csv),
                display: &mut display,
                predictor: &mut predictor,
            },
        )
        .await;
    ctrl_c.abort();
    let summary = result?;

    if summary.connection_lost {
        warn!("Session ended early: adapter disconnected");
    }
    csv.close()?;
    client.close();

    let mut record = SessionRecord::new(
        summary.start_time_sec as i64,
        summary.end_time_sec as i64,
        Some(csv_path.display().to_string()),
    );
    if let Some(scores) = summary.scores {
        record = record.with_scores(scores.accel, scores.fuel, scores.overall);
    }
    SessionStore::new(&config.logger.session_store)
        .save(&record)
        .context("Failed to save session record")?;

    info!(
        "Session {} saved: {} samples over {}s",
        record.id,
        summary.samples,
        record.duration_sec()
    );
    Ok(record)
}
