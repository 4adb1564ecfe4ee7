//! OBD-II Client for ELM327 Adapters
//!
//! Ties the framer, negotiator, codec and supported-PID registry together
//! over one transport.

use crate::codec::{build_request, has_positive, parse_positive_reply};
use crate::config::{FramerConfig, NegotiatorConfig};
use crate::error::ObdError;
use crate::framer::Framer;
use crate::mode;
use crate::negotiator::{NegotiatedConfig, NegotiationOutcome, Negotiator};
use crate::pid::{Pid, PidValue};
use crate::registry::{SupportedPidSet, SupportedPids, BITMAP_BASES};
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{debug, info};

/// OBD-II client for communicating with ELM327-compatible adapters
pub struct ObdClient<T: Transport> {
    framer: Framer<T>,
    negotiator: Negotiator,
    /// Configuration negotiation settled on; `None` until negotiated
    negotiated: Option<NegotiatedConfig>,
    supported: SupportedPids,
}

impl<T: Transport> ObdClient<T> {
    /// Create a client over an opened transport
    pub fn new(transport: T, framer: FramerConfig, negotiator: NegotiatorConfig) -> Self {
        Self {
            framer: Framer::new(transport, framer),
            negotiator: Negotiator::new(negotiator),
            negotiated: None,
            supported: SupportedPids::new(),
        }
    }

    /// Create a client with default timings
    pub fn with_defaults(transport: T) -> Self {
        Self::new(transport, FramerConfig::default(), NegotiatorConfig::default())
    }

    /// Negotiate a bus configuration with the adapter.
    ///
    /// On failure no configuration is kept; the caller should treat the
    /// adapter as disconnected and may start over.
    pub async fn negotiate(&mut self) -> Result<NegotiatedConfig, ObdError> {
        self.negotiated = None;
        match self.negotiator.run(&mut self.framer).await {
            NegotiationOutcome::Success { config, .. } => {
                self.negotiated = Some(config);
                Ok(config)
            }
            NegotiationOutcome::Failure { attempts } => Err(ObdError::NegotiationFailed {
                attempts: attempts.len(),
            }),
        }
    }

    /// Issue Mode 01 / PID 0x00 and check for a positive response
    pub async fn smoke_test(&mut self) -> bool {
        let lines = self
            .framer
            .query(&build_request(mode::CURRENT_DATA, 0x00))
            .await;
        has_positive(&lines, mode::CURRENT_DATA, 0x00)
    }

    /// Request `service`/`pid` and return the selected payload, or `None`
    /// when no reply line matched.
    pub async fn request_parameter(&mut self, service: u8, pid: u8) -> Option<Vec<u8>> {
        let lines = self.framer.query(&build_request(service, pid)).await;
        let payload = parse_positive_reply(&lines, service, pid);
        if payload.is_none() {
            debug!("No value for {:02X}{:02X}", service, pid);
        }
        payload
    }

    /// Read and decode a Mode 01 PID
    pub async fn read(&mut self, pid: Pid) -> Option<PidValue> {
        let payload = self.request_parameter(mode::CURRENT_DATA, pid.as_hex()).await?;
        pid.decode(&payload)
    }

    /// Rebuild the supported-PID set from the three bitmap PIDs
    pub async fn refresh_supported(&mut self) -> Arc<SupportedPidSet> {
        let mut set = SupportedPidSet::new();
        for base in BITMAP_BASES {
            if let Some(payload) = self.request_parameter(mode::CURRENT_DATA, base).await {
                set.absorb_bitmap(base, &payload);
            }
        }
        info!("ECU supports {} Mode 01 PIDs", set.len());
        self.supported.replace(set);
        self.supported.snapshot()
    }

    pub fn is_supported(&self, pid: u8) -> bool {
        self.supported.is_supported(pid)
    }

    /// Shared handle to the supported-PID set, for other readers
    pub fn supported_pids(&self) -> SupportedPids {
        self.supported.clone()
    }

    /// Configuration negotiation settled on
    pub fn negotiated(&self) -> Option<NegotiatedConfig> {
        self.negotiated
    }

    /// Negotiated and the channel is still open
    pub fn is_connected(&self) -> bool {
        self.negotiated.is_some() && self.framer.is_open()
    }

    /// Fail with [`ObdError::NotConnected`] unless [`is_connected`](Self::is_connected)
    pub fn ensure_connected(&self) -> Result<(), ObdError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ObdError::NotConnected)
        }
    }

    pub fn transport(&self) -> &T {
        self.framer.transport()
    }

    /// Close the transport and forget the negotiated configuration
    pub fn close(&mut self) {
        if self.negotiated.take().is_some() {
            info!("Disconnecting OBD client");
        }
        self.framer.close();
    }
}
