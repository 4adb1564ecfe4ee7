//! Command/Response Framer
//!
//! Serializes one command at a time onto the transport and collects the reply
//! up to the adapter prompt or a timeout, whichever comes first.

use crate::config::FramerConfig;
use crate::transport::Transport;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Half-duplex command/response framer over a [`Transport`]
///
/// Taking `&mut self` for every transaction keeps exactly one command in
/// flight on the channel.
pub struct Framer<T: Transport> {
    transport: T,
    config: FramerConfig,
}

impl<T: Transport> Framer<T> {
    /// Create a framer over an already opened transport
    pub fn new(transport: T, config: FramerConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Run a transaction with the steady-state settle delay and timeout
    pub async fn query(&mut self, command: &str) -> Vec<String> {
        let settle = self.config.settle_delay();
        let timeout = self.config.query_timeout();
        self.transact(command, settle, timeout).await
    }

    /// Send `command`, wait `settle`, then collect reply lines for up to `timeout`.
    ///
    /// Returns an empty list when the channel is closed or fails; that means
    /// "nothing to parse", not an error. A reply cut off by the timeout is
    /// still split and returned.
    pub async fn transact(
        &mut self,
        command: &str,
        settle: Duration,
        timeout: Duration,
    ) -> Vec<String> {
        if !self.transport.is_open() {
            debug!("Channel closed, skipping {:?}", command.trim());
            return Vec::new();
        }

        let mut wire = command.as_bytes().to_vec();
        if !wire.ends_with(b"\r") {
            wire.push(b'\r');
        }
        if let Err(e) = self
            .transport
            .write(&wire)
            .and_then(|_| self.transport.flush())
        {
            warn!("Write of {:?} failed: {}", command.trim(), e);
            return Vec::new();
        }

        tokio::time::sleep(settle).await;

        let raw = self.read_until_prompt(timeout).await;
        let lines = split_reply(&raw, command, self.config.prompt);
        debug!("{} -> {:?}", command.trim(), lines);
        lines
    }

    async fn read_until_prompt(&mut self, timeout: Duration) -> String {
        let start = Instant::now();
        let mut raw = String::new();
        let mut chunk = vec![0u8; self.config.read_chunk.max(1)];

        while start.elapsed() < timeout {
            let available = match self.transport.bytes_available() {
                Ok(n) => n,
                Err(e) => {
                    warn!("Polling adapter failed: {}", e);
                    break;
                }
            };

            if available > 0 {
                let want = available.min(chunk.len());
                match self.transport.read(&mut chunk[..want]) {
                    Ok(0) => {}
                    Ok(n) => {
                        let got = &chunk[..n];
                        raw.push_str(&String::from_utf8_lossy(got));
                        if got.contains(&self.config.prompt) {
                            return raw;
                        }
                        continue;
                    }
                    Err(e) => {
                        warn!("Read from adapter failed: {}", e);
                        break;
                    }
                }
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }

        if !raw.is_empty() {
            debug!("No prompt within {:?}, parsing partial reply", timeout);
        }
        raw
    }

    /// Close the underlying transport
    pub fn close(&mut self) {
        self.transport.close();
    }
}

/// Split captured reply text into trimmed lines, dropping blanks, the bare
/// prompt and the adapter's echo of `command`.
pub fn split_reply(raw: &str, command: &str, prompt: u8) -> Vec<String> {
    let echo = command.trim();
    let prompt = char::from(prompt).to_string();

    raw.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != prompt && !line.eq_ignore_ascii_case(echo))
        .map(str::to_string)
        .collect()
}
