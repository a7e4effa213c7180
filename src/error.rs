//! Error kinds for the codec, transports, request validation, and the driver.
//!
//! The driver's public operations collapse transport and protocol failures to
//! `false`/`None` (after logging and disconnecting). These types are what the
//! lower layers return and what the `try_*` driver methods expose.
//!
//! [`RequestError`] is deliberately separate: it is raised while building
//! request parameters, before any byte is written.

use thiserror::Error;

/// Largest delay that fits the five-digit delay field.
pub const MAX_DELAY_MS: u32 = 99_999;

/// A frame that could not be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Frame was empty.
    #[error("empty frame")]
    Empty,
    /// First byte is not a known command letter.
    #[error("unknown command letter {0:?}")]
    UnknownCommand(char),
    /// Frame length does not match any form of its command.
    #[error("invalid length {len} for '{command}' frame")]
    InvalidLength {
        /// Command letter.
        command: char,
        /// Observed length, terminator excluded.
        len: usize,
    },
    /// A state field was not `'0'` or `'1'`.
    #[error("invalid state character {0:?}")]
    InvalidState(char),
    /// The first-channel marker was not `'A'` or `'B'`.
    #[error("invalid channel marker {0:?}")]
    InvalidChannel(char),
    /// The delay field was not five ASCII digits.
    #[error("invalid delay field")]
    InvalidDelay,
    /// Echo payload contained non-printable or non-ASCII bytes.
    #[error("echo text is not printable ASCII")]
    InvalidText,
}

/// Failure in the byte-stream transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation attempted on a closed transport.
    #[error("transport is not open")]
    NotOpen,
    /// The port could not be opened (busy, missing, or refused).
    #[error("port {port} unavailable: {reason}")]
    Unavailable {
        /// Port that was requested.
        port: String,
        /// Description from the underlying layer.
        reason: String,
    },
    /// No complete frame arrived before the deadline.
    #[error("timed out after {timeout_ms} ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },
    /// Incoming data exceeded the frame capacity before a terminator.
    #[error("incoming frame exceeds {0} bytes")]
    FrameOverflow(usize),
    /// Underlying I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A caller supplied an invalid request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Mode name is not one of Automatic, Stop, Manual, Mute.
    #[error("unknown mode {0:?}")]
    UnknownMode(String),
    /// Mode bit is not one of A1, A2, B1, B2.
    #[error("unknown mode bit {0:?}")]
    UnknownModeBit(String),
    /// Trigger pattern name not recognized.
    #[error("unknown trigger pattern {0:?}")]
    UnknownTrigger(String),
    /// Delay does not fit the five-digit field.
    #[error("delay {0} ms exceeds {max} ms", max = MAX_DELAY_MS)]
    DelayOutOfRange(u32),
    /// Delay text is not a decimal number.
    #[error("delay {0:?} is not a number")]
    InvalidDelay(String),
    /// Echo text too long for one frame.
    #[error("echo text is {len} bytes, limit is {max}")]
    EchoTooLong {
        /// Length supplied.
        len: usize,
        /// Maximum accepted.
        max: usize,
    },
    /// Echo text contains non-printable or non-ASCII characters.
    #[error("echo text must be printable ASCII")]
    EchoNotAscii,
    /// Heartbeat value outside 0..=99999.
    #[error("heartbeat {0} Hz out of range")]
    HeartbeatOutOfRange(u32),
}

/// Why a driver exchange failed.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver has no open connection.
    #[error("not connected")]
    NotConnected,
    /// Transport-level failure, including timeouts.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The device answered with something other than the expected response.
    #[error("unexpected response {received:?}, expected {expected}")]
    UnexpectedResponse {
        /// What was expected.
        expected: &'static str,
        /// Raw response text.
        received: String,
    },
}

/// Result type for driver exchanges.
pub type DriverResult<T> = Result<T, DriverError>;
