//! Diagnostic event sink.
//!
//! The driver and simulator report what happens on the link through an
//! [`EventSink`] passed in at construction. [`LogSink`] forwards events to the
//! `log` facade; tests record them with
//! [`RecordingSink`](crate::hal::RecordingSink).

use std::sync::Arc;

use crate::commands::HeartbeatReading;
use crate::error::CodecError;
use crate::pins::PinBank;

/// Something observable happened on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The driver opened a port.
    Connected {
        /// Port identifier.
        port: String,
    },
    /// The driver closed its port, on request or after a failure.
    Disconnected {
        /// Why the link was closed.
        reason: String,
    },
    /// A command frame was written.
    FrameSent(String),
    /// A status read found pins different from the last known state.
    PinsChanged(PinBank),
    /// A heartbeat measurement completed.
    Heartbeat(HeartbeatReading),
    /// The simulator received a frame it could not decode.
    UnrecognizedFrame {
        /// Printable frame text.
        frame: String,
        /// Decode failure.
        error: CodecError,
    },
}

/// Receiver for diagnostic events.
pub trait EventSink: Send + Sync {
    /// Handle one event. Must not block for long.
    fn emit(&self, event: &Event);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: &Event) {
        (**self).emit(event)
    }
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Writes events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::Connected { port } => log::info!("Connected to {}", port),
            Event::Disconnected { reason } => log::info!("Disconnected: {}", reason),
            Event::FrameSent(text) => log::debug!("Sent {}", text),
            Event::PinsChanged(pins) => log::info!("Pin states updated: {}", pins),
            Event::Heartbeat(reading) => {
                log::info!("Heartbeat A={} Hz B={} Hz", reading.hz_a, reading.hz_b)
            }
            Event::UnrecognizedFrame { frame, error } => {
                log::warn!("Unrecognized frame {:?}: {}", frame, error)
            }
        }
    }
}
