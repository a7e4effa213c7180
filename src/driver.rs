//! Host-side protocol driver.
//!
//! [`ProtocolDriver`] owns one [`Transport`] and runs strictly alternating
//! request/response exchanges over it. Every exchange is bounded by a read
//! timeout from [`LinkConfig`].
//!
//! # Failure Policy
//!
//! The driver fails closed. A transport error, a timeout, or an answer that
//! is not the expected response closes the link and moves the driver to the
//! disconnected state. The public operations then report `false` or `None`;
//! the `try_*` variants return the [`DriverError`] that caused it. Nothing is
//! retried automatically.
//!
//! ```text
//! Disconnected --connect()--> Connected --any I/O failure--> Disconnected
//!                             Connected --disconnect()-----> Disconnected
//! ```
//!
//! # Toggles
//!
//! Toggle operations compute the new state from the last status the driver
//! read ([`ProtocolDriver::last_known`]), which is all-clear until the first
//! successful status read after connecting. Poll status regularly (see
//! [`poll_status`](ProtocolDriver::poll_status)) so toggles act on fresh
//! state.
//!
//! # Example
//!
//! ```rust
//! use safety_io_tester::config::{LinkConfig, SimulatorConfig};
//! use safety_io_tester::hal::Simulator;
//! use safety_io_tester::{Mode, ProtocolDriver};
//!
//! let sim = Simulator::new(SimulatorConfig::default().with_seed(5));
//! let mut driver = ProtocolDriver::new(sim.clone(), LinkConfig::default());
//!
//! assert!(driver.connect("SIM0"));
//! assert!(driver.set_mode(Mode::Manual));
//!
//! let pins = driver.read_status().unwrap();
//! assert_eq!(Mode::from_pins(&pins), Some(Mode::Manual));
//! ```

use core::time::Duration;

use crate::codec::{self, Frame};
use crate::commands::{
    Command, DelayMs, EchoText, HeartbeatReading, Mode, ModeBit, Response, TriggerPattern,
};
use crate::config::LinkConfig;
use crate::error::{DriverError, DriverResult};
use crate::pins::{DualChannel, PinBank};
use crate::traits::{Event, EventSink, LogSink, Transport};

/// Request/response driver for one controller link.
pub struct ProtocolDriver<T: Transport> {
    transport: T,
    config: LinkConfig,
    sink: Box<dyn EventSink>,
    port: Option<String>,
    last_known: PinBank,
}

impl<T: Transport> ProtocolDriver<T> {
    /// Creates a disconnected driver that reports events to the log.
    pub fn new(transport: T, config: LinkConfig) -> Self {
        Self {
            transport,
            config,
            sink: Box::new(LogSink),
            port: None,
            last_known: PinBank::default(),
        }
    }

    /// Report events to `sink` instead of the log.
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Open `port`. Returns `false` if the transport refuses.
    ///
    /// An existing connection is closed first. The last-known pin state is
    /// reset to all-clear.
    pub fn connect(&mut self, port: &str) -> bool {
        if self.is_connected() {
            self.disconnect();
        }
        match self.transport.open(port) {
            Ok(()) => {
                self.port = Some(port.to_string());
                self.last_known = PinBank::default();
                self.sink.emit(&Event::Connected { port: port.into() });
                true
            }
            Err(e) => {
                log::warn!("Failed to connect to {}: {}", port, e);
                false
            }
        }
    }

    /// Close the link. A no-op when already disconnected.
    pub fn disconnect(&mut self) {
        if self.port.is_none() {
            return;
        }
        self.transport.close();
        self.port = None;
        self.sink.emit(&Event::Disconnected {
            reason: "requested".into(),
        });
    }

    /// Whether the driver holds an open link.
    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// The connected port.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Pins from the most recent successful status read.
    pub fn last_known(&self) -> PinBank {
        self.last_known
    }

    /// Mode encoded in the last known pins, if they form a valid mode.
    pub fn current_mode(&self) -> Option<Mode> {
        Mode::from_pins(&self.last_known)
    }

    /// Link configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ========================================================================
    // Exchanges
    // ========================================================================

    /// Send a set command and wait for `OK`.
    pub fn send_and_expect_ack(&mut self, command: &Command) -> bool {
        self.try_send_and_expect_ack(command).is_ok()
    }

    /// Read the full pin state.
    ///
    /// A change from the last known state (heartbeat indicator excluded) is
    /// reported as [`Event::PinsChanged`].
    pub fn read_status(&mut self) -> Option<PinBank> {
        self.try_read_status().ok()
    }

    /// Read heartbeat frequencies, waiting for the controller to measure them.
    pub fn read_heartbeat(&mut self) -> Option<HeartbeatReading> {
        self.try_read_heartbeat().ok()
    }

    /// [`send_and_expect_ack`](Self::send_and_expect_ack), reporting the failure.
    ///
    /// The link is closed before the error is returned.
    pub fn try_send_and_expect_ack(&mut self, command: &Command) -> DriverResult<()> {
        let result = self.expect_ack(command);
        self.fail_closed(result)
    }

    /// [`read_status`](Self::read_status), reporting the failure.
    pub fn try_read_status(&mut self) -> DriverResult<PinBank> {
        let result = self.expect_status();
        self.fail_closed(result)
    }

    /// [`read_heartbeat`](Self::read_heartbeat), reporting the failure.
    pub fn try_read_heartbeat(&mut self) -> DriverResult<HeartbeatReading> {
        let result = self.expect_heartbeat();
        self.fail_closed(result)
    }

    fn expect_ack(&mut self, command: &Command) -> DriverResult<()> {
        let (response, raw) = self.exchange(command, self.config.read_timeout())?;
        match response {
            Response::Ack => Ok(()),
            _ => Err(unexpected("OK", &raw)),
        }
    }

    fn expect_status(&mut self) -> DriverResult<PinBank> {
        let (response, raw) = self.exchange(&Command::ReadStatus, self.config.read_timeout())?;
        let Response::Status(pins) = response else {
            return Err(unexpected("status", &raw));
        };
        if pins.differs_ignoring_heartbeat(&self.last_known) {
            self.sink.emit(&Event::PinsChanged(pins));
        }
        self.last_known = pins;
        Ok(pins)
    }

    fn expect_heartbeat(&mut self) -> DriverResult<HeartbeatReading> {
        let (response, raw) =
            self.exchange(&Command::ReadHeartbeat, self.config.heartbeat_timeout())?;
        let Response::Heartbeat(reading) = response else {
            return Err(unexpected("heartbeat", &raw));
        };
        self.sink.emit(&Event::Heartbeat(reading));
        Ok(reading)
    }

    fn exchange(&mut self, command: &Command, timeout: Duration) -> DriverResult<(Response, Frame)> {
        if !self.is_connected() {
            return Err(DriverError::NotConnected);
        }
        let frame = codec::encode(command);
        self.transport.write_frame(&frame)?;
        self.sink.emit(&Event::FrameSent(codec::frame_text(&frame)));

        let raw = self.transport.read_frame(timeout)?;
        let response = codec::decode_response(&raw);
        log::trace!("{} -> {:?}", codec::frame_text(&frame), response);
        Ok((response, raw))
    }

    /// Apply the failure policy: any error other than `NotConnected` closes the link.
    fn fail_closed<R>(&mut self, result: DriverResult<R>) -> DriverResult<R> {
        match &result {
            Ok(_) => {}
            Err(DriverError::NotConnected) => {
                log::debug!("Ignoring request while disconnected");
            }
            Err(e) => {
                log::warn!("Link failure, disconnecting: {}", e);
                self.transport.close();
                self.port = None;
                self.sink.emit(&Event::Disconnected {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Switch to a named mode.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        self.send_and_expect_ack(&Command::mode(mode))
    }

    /// Flip one mode bit, keeping the other three as last read.
    pub fn toggle_mode_bit(&mut self, bit: ModeBit) -> bool {
        let (signal, channel) = bit.location();
        let mut pins = self.last_known;
        let pair = pins.get_mut(signal);
        pair.set(channel, !pair.get(channel));
        self.send_and_expect_ack(&Command::SetMode {
            a1: pins.mode_bit_1.a,
            a2: pins.mode_bit_2.a,
            b1: pins.mode_bit_1.b,
            b2: pins.mode_bit_2.b,
        })
    }

    /// Trigger the E-Stop channels according to `pattern`.
    ///
    /// `delay` is used only by the staggered patterns.
    pub fn set_estop(&mut self, pattern: TriggerPattern, delay: DelayMs) -> bool {
        let (state, delayed) = pattern.resolve(self.last_known.estop, delay);
        self.send_and_expect_ack(&Command::SetEStop { state, delayed })
    }

    /// Trigger the interlock channels according to `pattern`.
    pub fn set_interlock(&mut self, pattern: TriggerPattern, delay: DelayMs) -> bool {
        let (state, delayed) = pattern.resolve(self.last_known.interlock, delay);
        self.send_and_expect_ack(&Command::SetInterlock { state, delayed })
    }

    /// Turn power off if either channel is on, otherwise on.
    pub fn toggle_power(&mut self) -> bool {
        let on = !self.last_known.power.any();
        self.send_and_expect_ack(&Command::SetPower(on))
    }

    /// Set power on both channels.
    pub fn set_power(&mut self, on: bool) -> bool {
        self.send_and_expect_ack(&Command::SetPower(on))
    }

    /// Measure heartbeat frequencies as `(hz_a, hz_b)`.
    pub fn measure_heartbeat(&mut self) -> Option<(u32, u32)> {
        self.read_heartbeat().map(|r| r.as_tuple())
    }

    /// Show `text` on the controller display.
    pub fn set_echo_string(&mut self, text: &EchoText) -> bool {
        self.send_and_expect_ack(&Command::SetEchoString(text.clone()))
    }

    /// One polling step: read status if connected, otherwise do nothing.
    pub fn poll_status(&mut self) -> Option<PinBank> {
        if !self.is_connected() {
            return None;
        }
        self.read_status()
    }
}

impl<T: Transport> Drop for ProtocolDriver<T> {
    fn drop(&mut self) {
        if self.port.is_some() {
            self.transport.close();
        }
    }
}

fn unexpected(expected: &'static str, raw: &[u8]) -> DriverError {
    DriverError::UnexpectedResponse {
        expected,
        received: codec::frame_text(raw),
    }
}
