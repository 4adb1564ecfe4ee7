//! Simulated ELM327 adapter
//!
//! An in-process stand-in for a real adapter, used by tests and by the
//! logger's `mock` device. It understands the AT directives the negotiator
//! sends, answers Mode 01 requests from a table of payloads and can be told
//! to only link up on specific protocol selections.

use crate::transport::Transport;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;

/// Header of the engine controller's replies on 11-bit CAN
const ENGINE_ECU_HEADER: &str = "7E8";
/// Header used for a second, non-engine responder
const SECONDARY_ECU_HEADER: &str = "7E9";

/// Scriptable ELM327 emulator implementing [`Transport`]
#[derive(Debug, Clone)]
pub struct SimulatedAdapter {
    open: bool,
    inbound: Vec<u8>,
    outbound: VecDeque<u8>,
    commands: Vec<String>,

    echo: bool,
    headers: bool,
    spaces: bool,
    auto_format: bool,
    protocol: Option<String>,

    /// Protocol selections (`ATSPn`) that reach the ECU; `None` means all
    linked: Option<BTreeSet<String>>,
    /// Fail every request while CAN auto-formatting is on
    reject_auto_format: bool,
    /// Leave the `>` prompt off replies
    omit_prompt: bool,
    /// Drop the link after this many more OBD requests
    drop_after: Option<usize>,

    /// Mode 01 payloads per PID, cycled per request
    responses: BTreeMap<u8, Vec<Vec<u8>>>,
    cursors: BTreeMap<u8, usize>,
    /// Payloads answered by a second ECU ahead of the engine controller
    secondary: BTreeMap<u8, Vec<u8>>,
}

impl Default for SimulatedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAdapter {
    /// A freshly powered adapter: echo and spaces on, headers off
    pub fn new() -> Self {
        Self {
            open: true,
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            commands: Vec::new(),
            echo: true,
            headers: false,
            spaces: true,
            auto_format: true,
            protocol: None,
            linked: None,
            reject_auto_format: false,
            omit_prompt: false,
            drop_after: None,
            responses: BTreeMap::new(),
            cursors: BTreeMap::new(),
            secondary: BTreeMap::new(),
        }
    }

    /// A vehicle with plausible values for every decoded PID, with RPM,
    /// speed, MAF and throttle moving through a short drive cycle.
    pub fn demo() -> Self {
        let mut adapter = Self::new()
            .with_response(0x00, vec![0xBE, 0x3F, 0xA8, 0x13])
            .with_response(0x20, vec![0x80, 0x00, 0x00, 0x01])
            .with_response(0x40, vec![0xFE, 0xD0, 0x80, 0x00])
            .with_response(0x03, vec![0x02, 0x00])
            .with_response(0x04, vec![0x64])
            .with_response(0x05, vec![0x5A])
            .with_response(0x06, vec![0x84])
            .with_response(0x0B, vec![0x21])
            .with_response(0x0E, vec![0x90])
            .with_response(0x0F, vec![0x38])
            .with_response(0x15, vec![0x5A, 0x80])
            .with_response(0x45, vec![0x20])
            .with_response(0x47, vec![0x3C])
            .with_response(0x4C, vec![0x1E]);

        let rpm = [800u16, 1500, 2400, 3100, 2600, 1800, 900];
        let speed = [0u8, 12, 30, 52, 61, 44, 10];
        let maf = [250u16, 900, 2100, 3600, 2700, 1400, 300];
        let throttle = [0x10u8, 0x40, 0x80, 0xB0, 0x60, 0x30, 0x12];

        adapter = adapter
            .with_sequence(
                0x0C,
                rpm.iter().map(|r| (r * 4).to_be_bytes().to_vec()).collect(),
            )
            .with_sequence(0x0D, speed.iter().map(|s| vec![*s]).collect())
            .with_sequence(0x10, maf.iter().map(|m| m.to_be_bytes().to_vec()).collect())
            .with_sequence(0x11, throttle.iter().map(|t| vec![*t]).collect());
        adapter
    }

    /// Answer `01<pid>` with a fixed payload
    pub fn with_response(self, pid: u8, payload: Vec<u8>) -> Self {
        self.with_sequence(pid, vec![payload])
    }

    /// Answer `01<pid>` with each payload in turn, wrapping around
    pub fn with_sequence(mut self, pid: u8, payloads: Vec<Vec<u8>>) -> Self {
        self.responses.insert(pid, payloads);
        self
    }

    /// Have a second ECU answer `01<pid>` before the engine controller
    pub fn with_secondary_response(mut self, pid: u8, payload: Vec<u8>) -> Self {
        self.secondary.insert(pid, payload);
        self
    }

    /// Only link up on the given `ATSPn` selections
    pub fn linked_on(mut self, protocols: &[&str]) -> Self {
        self.linked = Some(protocols.iter().map(|p| p.to_ascii_uppercase()).collect());
        self
    }

    /// Fail requests while CAN auto-formatting (`ATCAF1`) is active
    pub fn rejecting_auto_format(mut self) -> Self {
        self.reject_auto_format = true;
        self
    }

    /// Never send the `>` prompt
    pub fn without_prompt(mut self) -> Self {
        self.omit_prompt = true;
        self
    }

    /// Close the channel once `requests` more OBD requests have been answered
    pub fn dropping_after(mut self, requests: usize) -> Self {
        self.drop_after = Some(requests);
        self
    }

    /// Commands received so far, trimmed and uppercased
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    fn link_up(&self) -> bool {
        let Some(protocol) = &self.protocol else {
            return false;
        };
        let selected = self.linked.as_ref().map_or(true, |set| set.contains(protocol));
        selected && !(self.reject_auto_format && self.auto_format)
    }

    fn handle(&mut self, raw: &str) {
        let command = raw.trim().to_ascii_uppercase();
        if command.is_empty() {
            return;
        }
        self.commands.push(command.clone());

        let mut reply = String::new();
        if self.echo {
            reply.push_str(raw.trim());
            reply.push('\r');
        }
        let body = if command.starts_with("AT") {
            self.handle_at(&command[2..])
        } else {
            self.handle_request(&command)
        };
        reply.push_str(&body);
        reply.push_str("\r\r");
        if !self.omit_prompt {
            reply.push('>');
        }
        self.outbound.extend(reply.into_bytes());

        if !command.starts_with("AT") {
            if let Some(remaining) = self.drop_after.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.open = false;
                }
            }
        }
    }

    fn handle_at(&mut self, directive: &str) -> String {
        let ok = "OK".to_string();
        match directive {
            "Z" => {
                self.echo = true;
                self.headers = false;
                self.spaces = true;
                self.auto_format = true;
                self.protocol = None;
                "\rELM327 v1.5".to_string()
            }
            "I" => "ELM327 v1.5".to_string(),
            "E0" | "E1" => {
                self.echo = directive == "E1";
                ok
            }
            "S0" | "S1" => {
                self.spaces = directive == "S1";
                ok
            }
            "H0" | "H1" => {
                self.headers = directive == "H1";
                ok
            }
            "CAF0" | "CAF1" => {
                self.auto_format = directive == "CAF1";
                ok
            }
            d if d.starts_with("SP") => {
                self.protocol = Some(format!("AT{d}"));
                ok
            }
            d if d.starts_with('L') || d.starts_with("ST") || d.starts_with("SH") || d == "AL" => ok,
            _ => "?".to_string(),
        }
    }

    fn handle_request(&mut self, command: &str) -> String {
        let parsed = (command.len() == 4)
            .then(|| {
                let service = u8::from_str_radix(&command[..2], 16).ok()?;
                let pid = u8::from_str_radix(&command[2..], 16).ok()?;
                Some((service, pid))
            })
            .flatten();
        let Some((service, pid)) = parsed else {
            return "?".to_string();
        };

        if !self.link_up() {
            return "UNABLE TO CONNECT".to_string();
        }
        if service != 0x01 {
            return "NO DATA".to_string();
        }
        let Some(payloads) = self.responses.get(&pid).filter(|p| !p.is_empty()) else {
            return "NO DATA".to_string();
        };

        let cursor = self.cursors.entry(pid).or_insert(0);
        let payload = payloads[*cursor % payloads.len()].clone();
        *cursor += 1;

        let mut lines = Vec::new();
        if let Some(other) = self.secondary.get(&pid) {
            lines.push(self.format_frame(SECONDARY_ECU_HEADER, pid, other));
        }
        lines.push(self.format_frame(ENGINE_ECU_HEADER, pid, &payload));
        lines.join("\r")
    }

    fn format_frame(&self, header: &str, pid: u8, payload: &[u8]) -> String {
        let mut data = vec![0x41, pid];
        data.extend_from_slice(payload);

        let mut parts = Vec::with_capacity(data.len() + 2);
        if self.headers {
            parts.push(header.to_string());
            parts.push(format!("{:02X}", data.len()));
        }
        parts.extend(data.iter().map(|b| format!("{b:02X}")));
        parts.join(if self.spaces { " " } else { "" })
    }
}

impl Transport for SimulatedAdapter {
    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "adapter closed"));
        }
        for &byte in bytes {
            match byte {
                b'\r' => {
                    let line = String::from_utf8_lossy(&self.inbound).into_owned();
                    self.inbound.clear();
                    self.handle(&line);
                }
                b'\n' => {}
                other => self.inbound.push(other),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.outbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.outbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close(&mut self) {
        self.open = false;
        self.outbound.clear();
    }
}
