//! Framer and negotiator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and buffering for command/response transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    /// Adapter processing latency before the first read (default: 80ms)
    pub settle_delay_ms: u64,
    /// Reply window for steady-state queries (default: 1200ms)
    pub query_timeout_ms: u64,
    /// Reply window while negotiating, for slow bus searches (default: 2200ms)
    pub negotiation_timeout_ms: u64,
    /// Pause between empty reads (default: 10ms)
    pub poll_interval_ms: u64,
    /// Maximum bytes taken per read (default: 256)
    pub read_chunk: usize,
    /// Prompt character the adapter emits when ready (default: `">"`)
    #[serde(with = "prompt_char")]
    pub prompt: u8,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 80,
            query_timeout_ms: 1200,
            negotiation_timeout_ms: 2200,
            poll_interval_ms: 10,
            read_chunk: 256,
            prompt: b'>',
        }
    }
}

impl FramerConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Pacing for the negotiation state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiatorConfig {
    /// Pause after every init directive (default: 80ms)
    pub directive_delay_ms: u64,
    /// Pause after forcing auto-formatting off, before the retry (default: 60ms)
    pub caf0_retry_delay_ms: u64,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            directive_delay_ms: 80,
            caf0_retry_delay_ms: 60,
        }
    }
}

impl NegotiatorConfig {
    pub fn directive_delay(&self) -> Duration {
        Duration::from_millis(self.directive_delay_ms)
    }

    pub fn caf0_retry_delay(&self) -> Duration {
        Duration::from_millis(self.caf0_retry_delay_ms)
    }
}

/// The prompt as a one-character string in config files
mod prompt_char {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(prompt: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&char::from(*prompt).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let text = String::deserialize(deserializer)?;
        match text.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(D::Error::custom(format!(
                "prompt must be a single ASCII character, got {text:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_reads_as_character() {
        let config: FramerConfig = serde_json::from_str(r##"{"prompt": "#"}"##).unwrap();
        assert_eq!(config.prompt, b'#');
        assert_eq!(config.query_timeout_ms, 1200);

        let json = serde_json::to_string(&FramerConfig::default()).unwrap();
        assert!(json.contains(r#""prompt":">""#));
    }

    #[test]
    fn test_prompt_rejects_multiple_characters() {
        assert!(serde_json::from_str::<FramerConfig>(r#"{"prompt": ">>"}"#).is_err());
        assert!(serde_json::from_str::<FramerConfig>(r#"{"prompt": ""}"#).is_err());
    }
}
