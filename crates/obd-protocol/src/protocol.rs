//! OBD-II Protocol Definitions
//!
//! Bus protocols the ELM327 can select and the ordered candidate
//! configurations tried during negotiation.

use serde::{Deserialize, Serialize};

/// Supported OBD-II protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObdProtocol {
    /// Automatic protocol detection
    #[default]
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (10.4 kbaud, 5 baud init)
    Iso9141_2,
    /// ISO 14230-4 KWP (slow init, 10.4 kbaud)
    Iso14230_4Kwp,
    /// ISO 14230-4 KWP (fast init, 10.4 kbaud)
    Iso14230_4KwpFast,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    Iso15765_4Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    Iso15765_4Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    Iso15765_4Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    Iso15765_4Can29bit250,
}

impl ObdProtocol {
    /// Get the ELM327 AT command for this protocol
    pub fn to_elm_command(&self) -> &'static str {
        match self {
            ObdProtocol::Auto => "ATSP0",
            ObdProtocol::J1850Pwm => "ATSP1",
            ObdProtocol::J1850Vpw => "ATSP2",
            ObdProtocol::Iso9141_2 => "ATSP3",
            ObdProtocol::Iso14230_4Kwp => "ATSP4",
            ObdProtocol::Iso14230_4KwpFast => "ATSP5",
            ObdProtocol::Iso15765_4Can11bit500 => "ATSP6",
            ObdProtocol::Iso15765_4Can29bit500 => "ATSP7",
            ObdProtocol::Iso15765_4Can11bit250 => "ATSP8",
            ObdProtocol::Iso15765_4Can29bit250 => "ATSP9",
        }
    }

    /// Check if this is a CAN protocol
    pub fn is_can(&self) -> bool {
        matches!(
            self,
            ObdProtocol::Iso15765_4Can11bit500
                | ObdProtocol::Iso15765_4Can29bit500
                | ObdProtocol::Iso15765_4Can11bit250
                | ObdProtocol::Iso15765_4Can29bit250
        )
    }

    /// Short description for logs
    pub fn description(&self) -> &'static str {
        match self {
            ObdProtocol::Auto => "automatic",
            ObdProtocol::J1850Pwm => "SAE J1850 PWM",
            ObdProtocol::J1850Vpw => "SAE J1850 VPW",
            ObdProtocol::Iso9141_2 => "ISO 9141-2",
            ObdProtocol::Iso14230_4Kwp => "ISO 14230-4 KWP (slow init)",
            ObdProtocol::Iso14230_4KwpFast => "ISO 14230-4 KWP (fast init)",
            ObdProtocol::Iso15765_4Can11bit500 => "ISO 15765-4 CAN (11-bit, 500 kbps)",
            ObdProtocol::Iso15765_4Can29bit500 => "ISO 15765-4 CAN (29-bit, 500 kbps)",
            ObdProtocol::Iso15765_4Can11bit250 => "ISO 15765-4 CAN (11-bit, 250 kbps)",
            ObdProtocol::Iso15765_4Can29bit250 => "ISO 15765-4 CAN (29-bit, 250 kbps)",
        }
    }
}

/// Turns CAN auto-formatting on
pub const AUTO_FORMAT_ON: &str = "ATCAF1";
/// Turns CAN auto-formatting off
pub const AUTO_FORMAT_OFF: &str = "ATCAF0";

/// Adapter hygiene sent before any candidate: reset, echo off, linefeeds
/// off, spaces off, headers on, response timeout 0x0A * 4ms.
pub const HYGIENE_SEQUENCE: [&str; 6] = ["ATZ", "ATE0", "ATL0", "ATS0", "ATH1", "ATST0A"];

/// One adapter configuration to try during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtocolCandidate {
    pub protocol: ObdProtocol,
    /// Directives sent in order before the smoke test
    pub directives: &'static [&'static str],
}

impl ProtocolCandidate {
    /// Whether the candidate turns CAN auto-formatting on
    pub fn uses_auto_format(&self) -> bool {
        self.directives.contains(&AUTO_FORMAT_ON)
    }
}

/// Candidates in priority order: auto-detect, the two common CAN variants,
/// then the legacy K-line buses.
pub const CANDIDATES: [ProtocolCandidate; 5] = [
    ProtocolCandidate {
        protocol: ObdProtocol::Auto,
        directives: &["ATSP0"],
    },
    ProtocolCandidate {
        protocol: ObdProtocol::Iso15765_4Can11bit500,
        directives: &["ATSP6", "ATSH7DF", AUTO_FORMAT_ON],
    },
    ProtocolCandidate {
        protocol: ObdProtocol::Iso15765_4Can29bit500,
        directives: &["ATSP7", "ATSHDB33F1", AUTO_FORMAT_ON],
    },
    ProtocolCandidate {
        protocol: ObdProtocol::Iso14230_4KwpFast,
        directives: &["ATSP5"],
    },
    ProtocolCandidate {
        protocol: ObdProtocol::Iso9141_2,
        directives: &["ATSP3"],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_select_their_protocol() {
        for candidate in CANDIDATES {
            assert_eq!(candidate.directives[0], candidate.protocol.to_elm_command());
        }
    }

    #[test]
    fn test_auto_format_candidates() {
        let flagged: Vec<_> = CANDIDATES.iter().map(|c| c.uses_auto_format()).collect();
        assert_eq!(flagged, vec![false, true, true, false, false]);
        assert!(CANDIDATES
            .iter()
            .filter(|c| c.uses_auto_format())
            .all(|c| c.protocol.is_can()));
    }
}
