//! Duplex byte channel to the adapter.
//!
//! The channel is opened and paired by the caller; the protocol engine only
//! writes, polls for available bytes, reads and eventually closes it.

use crate::error::ObdError;
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{debug, info};

/// Non-blocking byte channel consumed by the [`Framer`](crate::Framer).
pub trait Transport: Send {
    /// Whether the channel is currently usable
    fn is_open(&self) -> bool;

    /// Queue bytes for transmission (may buffer)
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Push buffered bytes onto the wire
    fn flush(&mut self) -> io::Result<()>;

    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes, returning how many were read
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the channel. Further transactions yield no data.
    fn close(&mut self);
}

/// Read timeout applied to the serial port; reads are only issued for bytes
/// already reported as available, so this only bounds pathological drivers.
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Serial (or RFCOMM-backed tty) transport
pub struct SerialTransport {
    /// Device path, kept for logging
    device: String,
    /// Open port, `None` once closed
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open `device` at `baud_rate`
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, ObdError> {
        info!("Opening serial port {} at {} baud", device, baud_rate);
        let port = tokio_serial::new(device, baud_rate)
            .timeout(SERIAL_READ_TIMEOUT)
            .open()?;

        Ok(Self {
            device: device.to_string(),
            port: Some(port),
        })
    }

    /// Device path this transport was opened on
    pub fn device(&self) -> &str {
        &self.device
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
    }
}

impl Transport for SerialTransport {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port()?.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self.port()?)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let count = self.port()?.bytes_to_read()?;
        Ok(count as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match Read::read(self.port()?, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed serial port {}", self.device);
        }
    }
}
