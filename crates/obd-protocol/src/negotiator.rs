//! Protocol Negotiator
//!
//! Runs the hygiene sequence, then walks [`CANDIDATES`] until one passes the
//! Mode 01 / PID 0x00 smoke test.

use crate::codec::{build_request, has_positive};
use crate::config::NegotiatorConfig;
use crate::framer::Framer;
use crate::mode;
use crate::protocol::{ProtocolCandidate, AUTO_FORMAT_OFF, CANDIDATES, HYGIENE_SEQUENCE};
use crate::transport::Transport;
use serde::Serialize;
use tracing::{debug, info, warn};

/// The configuration negotiation settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NegotiatedConfig {
    pub candidate: ProtocolCandidate,
    /// Auto-formatting had to be forced off for the smoke test to pass
    pub auto_format_forced_off: bool,
}

/// A single smoke test run during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub candidate: ProtocolCandidate,
    pub auto_format_forced_off: bool,
    pub passed: bool,
}

/// Terminal state of a negotiation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NegotiationOutcome {
    Success {
        config: NegotiatedConfig,
        attempts: Vec<Attempt>,
    },
    Failure {
        attempts: Vec<Attempt>,
    },
}

impl NegotiationOutcome {
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            NegotiationOutcome::Success { attempts, .. } => attempts,
            NegotiationOutcome::Failure { attempts } => attempts,
        }
    }

    pub fn config(&self) -> Option<NegotiatedConfig> {
        match self {
            NegotiationOutcome::Success { config, .. } => Some(*config),
            NegotiationOutcome::Failure { .. } => None,
        }
    }
}

/// Candidate-walking state machine. Holds no state between runs.
pub struct Negotiator {
    config: NegotiatorConfig,
}

impl Negotiator {
    pub fn new(config: NegotiatorConfig) -> Self {
        Self { config }
    }

    /// Negotiate over `framer`, trying [`CANDIDATES`] in order
    pub async fn run<T: Transport>(&self, framer: &mut Framer<T>) -> NegotiationOutcome {
        self.run_with(framer, &CANDIDATES).await
    }

    /// Negotiate over `framer` with an explicit candidate list
    pub async fn run_with<T: Transport>(
        &self,
        framer: &mut Framer<T>,
        candidates: &[ProtocolCandidate],
    ) -> NegotiationOutcome {
        info!("Negotiating adapter protocol ({} candidates)", candidates.len());

        for directive in HYGIENE_SEQUENCE {
            self.send_directive(framer, directive).await;
        }

        let mut attempts = Vec::new();
        for candidate in candidates {
            debug!("Trying {}", candidate.protocol.description());
            for directive in candidate.directives {
                self.send_directive(framer, directive).await;
            }

            let passed = smoke_test(framer).await;
            attempts.push(Attempt {
                candidate: *candidate,
                auto_format_forced_off: false,
                passed,
            });
            if passed {
                return self.success(*candidate, false, attempts);
            }

            if candidate.uses_auto_format() {
                debug!("Retrying {} with auto-formatting off", candidate.protocol.description());
                let settle = framer.config().settle_delay();
                let timeout = framer.config().negotiation_timeout();
                framer.transact(AUTO_FORMAT_OFF, settle, timeout).await;
                tokio::time::sleep(self.config.caf0_retry_delay()).await;

                let passed = smoke_test(framer).await;
                attempts.push(Attempt {
                    candidate: *candidate,
                    auto_format_forced_off: true,
                    passed,
                });
                if passed {
                    return self.success(*candidate, true, attempts);
                }
            }

            warn!("No ECU response on {}", candidate.protocol.description());
        }

        warn!("Protocol negotiation exhausted {} candidates", candidates.len());
        NegotiationOutcome::Failure { attempts }
    }

    fn success(
        &self,
        candidate: ProtocolCandidate,
        auto_format_forced_off: bool,
        attempts: Vec<Attempt>,
    ) -> NegotiationOutcome {
        info!(
            "Connected using {}{}",
            candidate.protocol.description(),
            if auto_format_forced_off { " (auto-formatting off)" } else { "" }
        );
        NegotiationOutcome::Success {
            config: NegotiatedConfig {
                candidate,
                auto_format_forced_off,
            },
            attempts,
        }
    }

    async fn send_directive<T: Transport>(&self, framer: &mut Framer<T>, directive: &str) {
        let settle = framer.config().settle_delay();
        let timeout = framer.config().negotiation_timeout();
        framer.transact(directive, settle, timeout).await;
        tokio::time::sleep(self.config.directive_delay()).await;
    }
}

/// Request Mode 01 / PID 0x00 and check for a positive response
pub async fn smoke_test<T: Transport>(framer: &mut Framer<T>) -> bool {
    let settle = framer.config().settle_delay();
    let timeout = framer.config().negotiation_timeout();
    let lines = framer
        .transact(&build_request(mode::CURRENT_DATA, 0x00), settle, timeout)
        .await;
    has_positive(&lines, mode::CURRENT_DATA, 0x00)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FramerConfig;
    use crate::protocol::ObdProtocol;
    use crate::simulator::SimulatedAdapter;

    fn framer(adapter: SimulatedAdapter) -> Framer<SimulatedAdapter> {
        let adapter = adapter.with_response(0x00, vec![0xBE, 0x3F, 0xA8, 0x13]);
        Framer::new(adapter, FramerConfig::default())
    }

    fn negotiator() -> Negotiator {
        Negotiator::new(NegotiatorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_detect_first() {
        let mut framer = framer(SimulatedAdapter::new());
        let outcome = negotiator().run(&mut framer).await;

        let config = outcome.config().unwrap();
        assert_eq!(config.candidate.protocol, ObdProtocol::Auto);
        assert_eq!(outcome.attempts().len(), 1);
        assert_eq!(
            framer.transport().commands(),
            &["ATZ", "ATE0", "ATL0", "ATS0", "ATH1", "ATST0A", "ATSP0", "0100"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_candidate_after_caf0_retries() {
        let mut framer = framer(SimulatedAdapter::new().linked_on(&["ATSP7"]));
        let outcome = negotiator().run(&mut framer).await;

        let config = outcome.config().unwrap();
        assert_eq!(config.candidate.protocol, ObdProtocol::Iso15765_4Can29bit500);
        assert!(!config.auto_format_forced_off);

        let tried: Vec<_> = outcome
            .attempts()
            .iter()
            .map(|a| (a.candidate.protocol, a.auto_format_forced_off, a.passed))
            .collect();
        assert_eq!(
            tried,
            vec![
                (ObdProtocol::Auto, false, false),
                (ObdProtocol::Iso15765_4Can11bit500, false, false),
                (ObdProtocol::Iso15765_4Can11bit500, true, false),
                (ObdProtocol::Iso15765_4Can29bit500, false, true),
            ]
        );
        assert_eq!(
            &framer.transport().commands()[6..],
            &[
                "ATSP0", "0100", "ATSP6", "ATSH7DF", "ATCAF1", "0100", "ATCAF0", "0100", "ATSP7",
                "ATSHDB33F1", "ATCAF1", "0100"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_caf0_retry_rescues_candidate() {
        let adapter = SimulatedAdapter::new()
            .linked_on(&["ATSP6"])
            .rejecting_auto_format();
        let mut framer = framer(adapter);
        let outcome = negotiator().run(&mut framer).await;

        let config = outcome.config().unwrap();
        assert_eq!(config.candidate.protocol, ObdProtocol::Iso15765_4Can11bit500);
        assert!(config.auto_format_forced_off);
        assert_eq!(outcome.attempts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_failure() {
        let mut framer = framer(SimulatedAdapter::new().linked_on(&[]));
        let outcome = negotiator().run(&mut framer).await;

        assert!(outcome.config().is_none());
        // Five candidates plus a retry for each of the two CAN ones
        assert_eq!(outcome.attempts().len(), 7);
        assert!(outcome.attempts().iter().all(|a| !a.passed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_fails_smoke_test() {
        let mut framer = framer(SimulatedAdapter::new());
        framer.close();
        assert!(!smoke_test(&mut framer).await);
    }
}
