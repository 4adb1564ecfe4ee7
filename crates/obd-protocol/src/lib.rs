//! OBD-II Protocol Implementation
//!
//! This crate talks to ELM327-compatible OBD-II adapters over an opaque byte
//! channel: it frames commands, negotiates a bus protocol, requests Mode 01
//! PIDs and decodes the replies into physical values.

mod client;
mod codec;
mod config;
mod error;
mod framer;
mod negotiator;
mod pid;
mod protocol;
mod registry;
mod simulator;
mod transport;

pub use client::ObdClient;
pub use codec::{
    build_request, has_positive, hex_tokens, parse_frames, parse_positive_reply, select_frame,
    ParseStrategy, ParsedFrame, PRIMARY_ECU_TAGS,
};
pub use config::{FramerConfig, NegotiatorConfig};
pub use error::ObdError;
pub use framer::{split_reply, Framer};
pub use negotiator::{smoke_test, Attempt, NegotiatedConfig, NegotiationOutcome, Negotiator};
pub use pid::{column_for, decode, DecodedSample, Pid, PidValue};
pub use protocol::{ObdProtocol, ProtocolCandidate, CANDIDATES, HYGIENE_SEQUENCE};
pub use registry::{SupportedPidSet, SupportedPids, BITMAP_BASES};
pub use simulator::SimulatedAdapter;
pub use transport::{SerialTransport, Transport};

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
}
