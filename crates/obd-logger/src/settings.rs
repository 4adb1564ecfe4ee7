//! Logger configuration

use obd_protocol::{FramerConfig, NegotiatorConfig};
use obd_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Device name selecting the built-in simulated adapter
pub const MOCK_DEVICE: &str = "mock";

/// Config file read when none is named on the command line
pub const DEFAULT_CONFIG_FILE: &str = "obd-logger.toml";

/// Prefix of environment overrides, e.g. `OBD_LOGGER__DEVICE`
const ENV_PREFIX: &str = "OBD";

/// Session-level settings of the logger binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Serial device path, or `mock`
    pub device: String,
    pub baud_rate: u32,
    /// Directory receiving one CSV file per session
    pub log_dir: PathBuf,
    /// JSON file holding the session history
    pub session_store: PathBuf,
    /// Maximum tracing level (`trace` .. `error`)
    pub log_level: String,
    /// Log every n-th status line; 1 logs every polling cycle
    pub status_every: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            device: MOCK_DEVICE.to_string(),
            baud_rate: 38_400,
            log_dir: PathBuf::from("logs"),
            session_store: PathBuf::from("sessions.json"),
            log_level: "info".to_string(),
            status_every: 5,
        }
    }
}

/// Full configuration, one section per concern
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logger: LoggerConfig,
    pub framer: FramerConfig,
    pub negotiator: NegotiatorConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Built-in defaults, then `path` if it exists, then `OBD_*` variables
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// True when the simulated adapter stands in for hardware
    pub fn is_mock(&self) -> bool {
        self.logger.device.eq_ignore_ascii_case(MOCK_DEVICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load("does-not-exist.toml").unwrap();
        assert!(config.is_mock());
        assert_eq!(config.logger.baud_rate, 38_400);
        assert_eq!(config.framer.query_timeout_ms, 1200);
        assert_eq!(config.scheduler.period_ms, 200);
        assert_eq!(config.scheduler.logged_pids, vec![0x0C, 0x05]);
    }

    #[test]
    fn test_file_overrides_sections() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("logger.toml");
        std::fs::write(
            &path,
            "[logger]\ndevice = \"/dev/rfcomm0\"\n\n[framer]\nprompt = \">\"\nsettle_delay_ms = 40\n\n[scheduler]\nlogged_pids = [13, 17]\nmax_samples = 50\n",
        )
        .unwrap();

        let config = AppConfig::load(path.to_str().unwrap()).unwrap();
        assert!(!config.is_mock());
        assert_eq!(config.logger.device, "/dev/rfcomm0");
        assert_eq!(config.logger.log_level, "info");
        assert_eq!(config.framer.prompt, b'>');
        assert_eq!(config.framer.settle_delay_ms, 40);
        assert_eq!(config.scheduler.logged_pids, vec![13, 17]);
        assert_eq!(config.scheduler.max_samples, Some(50));
        assert!(config.scheduler.evaluate_driver);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
