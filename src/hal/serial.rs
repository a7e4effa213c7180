//! Serial-port transport and port discovery (requires `serial` feature).
//!
//! [`SerialTransport`] frames the byte stream on `\n` and enforces the
//! per-read deadline itself, so a controller that trickles bytes cannot hold
//! a read open past its timeout.
//!
//! Port discovery lists USB serial ports whose vendor ID passes the
//! [`DeviceConfig`] filter, sorted by name. The default port is the lowest
//! name.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort, SerialPortInfo, SerialPortType};

use crate::codec::{Frame, MAX_FRAME_LEN, TERMINATOR};
use crate::config::{DeviceConfig, LinkConfig};
use crate::error::TransportError;
use crate::traits::Transport;

// ============================================================================
// Transport
// ============================================================================

/// Newline-framed serial link.
pub struct SerialTransport {
    config: LinkConfig,
    port: Option<Box<dyn SerialPort>>,
    buffer: Vec<u8>,
}

impl SerialTransport {
    /// Creates a closed transport using the link's baud rate and timeouts.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            port: None,
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Take one complete frame out of the receive buffer, if there is one.
    fn take_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        let end = self.buffer.iter().position(|b| *b == TERMINATOR)?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(Frame::from_slice(&line).map_err(|_| TransportError::FrameOverflow(line.len())))
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, port: &str) -> Result<(), TransportError> {
        self.close();
        let opened = serialport::new(port, self.config.baud_rate)
            .timeout(self.config.write_timeout())
            .open()
            .map_err(|e| TransportError::Unavailable {
                port: port.into(),
                reason: e.to_string(),
            })?;
        if let Err(e) = opened.clear(ClearBuffer::All) {
            log::debug!("Could not clear {} buffers: {}", port, e);
        }
        log::info!("Opened {} at {} baud", port, self.config.baud_rate);
        self.port = Some(opened);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::debug!("Serial port closed");
        }
        self.buffer.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        port.set_timeout(self.config.write_timeout())
            .map_err(std::io::Error::from)?;
        port.write_all(frame)?;
        port.flush()?;
        Ok(())
    }

    fn read_frame(&mut self, timeout: Duration) -> Result<Frame, TransportError> {
        if self.port.is_none() {
            return Err(TransportError::NotOpen);
        }
        let deadline = Instant::now() + timeout;
        let timed_out = || TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        };
        let mut chunk = [0u8; MAX_FRAME_LEN];

        loop {
            if let Some(frame) = self.take_frame() {
                return frame;
            }
            if self.buffer.len() >= MAX_FRAME_LEN {
                let len = self.buffer.len();
                self.buffer.clear();
                return Err(TransportError::FrameOverflow(len));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }

            let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
            port.set_timeout(remaining).map_err(std::io::Error::from)?;
            match port.read(&mut chunk) {
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(timed_out()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// ============================================================================
// Port Discovery
// ============================================================================

/// A serial port that may host a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortCandidate {
    /// OS port name (e.g. `/dev/ttyACM0`, `COM3`).
    pub name: String,
    /// USB vendor ID, if a USB port.
    pub vid: Option<u16>,
    /// USB product ID, if a USB port.
    pub pid: Option<u16>,
    /// USB product string, if reported.
    pub product: Option<String>,
}

/// Filter and sort port listings against the vendor filter.
///
/// With an empty vendor filter every port is a candidate; otherwise only USB
/// ports with an accepted vendor ID are.
pub fn filter_candidates(ports: Vec<SerialPortInfo>, device: &DeviceConfig) -> Vec<PortCandidate> {
    let mut candidates: Vec<PortCandidate> = ports
        .into_iter()
        .filter_map(|p| match p.port_type {
            SerialPortType::UsbPort(info) if device.accepts_vendor(info.vid) => Some(PortCandidate {
                name: p.port_name,
                vid: Some(info.vid),
                pid: Some(info.pid),
                product: info.product,
            }),
            _ if device.vendor_ids.is_empty() => Some(PortCandidate {
                name: p.port_name,
                vid: None,
                pid: None,
                product: None,
            }),
            _ => None,
        })
        .collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    candidates
}

/// List ports that may host a controller, sorted by name.
pub fn list_candidate_ports(device: &DeviceConfig) -> Result<Vec<PortCandidate>, TransportError> {
    let ports = serialport::available_ports().map_err(std::io::Error::from)?;
    Ok(filter_candidates(ports, device))
}

/// The lowest-named candidate port, if any.
pub fn pick_default_port(device: &DeviceConfig) -> Result<Option<String>, TransportError> {
    Ok(list_candidate_ports(device)?
        .into_iter()
        .next()
        .map(|c| c.name))
}
