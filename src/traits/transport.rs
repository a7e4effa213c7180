//! Framed byte-stream link to the controller.

use std::time::Duration;

use crate::codec::Frame;
use crate::error::TransportError;

/// A bidirectional, newline-framed link to a controller.
///
/// Implemented by the serial port, the [`Simulator`](crate::hal::Simulator)
/// and [`ScriptedTransport`](crate::hal::ScriptedTransport). The driver owns
/// exactly one transport and issues strictly alternating write/read pairs.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use safety_io_tester::hal::ScriptedTransport;
/// use safety_io_tester::traits::Transport;
///
/// let mut link = ScriptedTransport::new();
/// link.push_response(b"OK\n");
///
/// link.open("sim0").unwrap();
/// link.write_frame(b"P1\n").unwrap();
/// let reply = link.read_frame(Duration::from_millis(10)).unwrap();
/// assert_eq!(reply.as_slice(), b"OK\n");
/// assert_eq!(link.written(), vec![b"P1\n".to_vec()]);
/// ```
pub trait Transport: Send {
    /// Open the link to `port`. Opening an open transport reopens it.
    fn open(&mut self, port: &str) -> Result<(), TransportError>;

    /// Close the link. Closing a closed transport is a no-op.
    fn close(&mut self);

    /// Whether the link is currently open.
    fn is_open(&self) -> bool;

    /// Write one complete frame, terminator included.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Read one complete frame, waiting at most `timeout`.
    ///
    /// The returned frame includes its terminator.
    fn read_frame(&mut self, timeout: Duration) -> Result<Frame, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, port: &str) -> Result<(), TransportError> {
        (**self).open(port)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).write_frame(frame)
    }

    fn read_frame(&mut self, timeout: Duration) -> Result<Frame, TransportError> {
        (**self).read_frame(timeout)
    }
}
