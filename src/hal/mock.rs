//! Mock implementations for testing without hardware.
//!
//! These test doubles stand in for the serial link, the clock and the event
//! sink. Each is a cheap `Clone` handle over shared state, so a test can hand
//! one clone to the driver and keep another for inspection.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`ScriptedTransport`] | [`Transport`] | Queued responses, recorded writes |
//! | [`RecordingSink`] | [`EventSink`] | Captures emitted events |
//!
//! # Example
//!
//! ```rust
//! use safety_io_tester::config::LinkConfig;
//! use safety_io_tester::hal::{RecordingSink, ScriptedTransport};
//! use safety_io_tester::ProtocolDriver;
//!
//! let link = ScriptedTransport::new();
//! link.push_response(b"OK\n");
//!
//! let mut driver = ProtocolDriver::new(link.clone(), LinkConfig::default())
//!     .with_sink(RecordingSink::new());
//! assert!(driver.connect("sim0"));
//! assert!(driver.toggle_power());
//! assert_eq!(link.written(), vec![b"P1\n".to_vec()]);
//! ```
//!
//! [`Clock`]: crate::traits::Clock
//! [`Transport`]: crate::traits::Transport
//! [`EventSink`]: crate::traits::EventSink

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::codec::Frame;
use crate::error::TransportError;
use crate::traits::{Clock, Event, EventSink, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Clock
// ============================================================================

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
/// Clones share the same time.
///
/// # Example
///
/// ```rust
/// use safety_io_tester::hal::MockClock;
/// use safety_io_tester::traits::Clock;
///
/// let clock = MockClock::new();
/// let view = clock.clone();
///
/// clock.set(1000);
/// assert_eq!(view.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(view.now_ms(), 1500);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    current_ms: Arc<AtomicU64>,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&self, ms: u64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Transport
// ============================================================================

#[derive(Debug)]
enum Scripted {
    Frame(Vec<u8>),
    Timeout,
}

#[derive(Debug, Default)]
struct ScriptState {
    open: bool,
    port: Option<String>,
    refuse_open: bool,
    fail_writes: bool,
    responses: VecDeque<Scripted>,
    written: Vec<Vec<u8>>,
    last_timeout: Option<Duration>,
}

/// Transport that replays queued responses and records every write.
///
/// Reads pop the next queued response regardless of what was written. An
/// empty queue reads as a timeout.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    /// Creates an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw response bytes, terminator included.
    pub fn push_response(&self, bytes: &[u8]) {
        lock(&self.state)
            .responses
            .push_back(Scripted::Frame(bytes.to_vec()));
    }

    /// Queue a read timeout.
    pub fn push_timeout(&self) {
        lock(&self.state).responses.push_back(Scripted::Timeout);
    }

    /// Make subsequent `open` calls fail.
    pub fn refuse_open(&self, refuse: bool) {
        lock(&self.state).refuse_open = refuse;
    }

    /// Make subsequent writes fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Every frame written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }

    /// Port passed to the last successful `open`.
    pub fn port(&self) -> Option<String> {
        lock(&self.state).port.clone()
    }

    /// Timeout passed to the last `read_frame`.
    pub fn last_timeout(&self) -> Option<Duration> {
        lock(&self.state).last_timeout
    }

    /// Responses still queued.
    pub fn remaining(&self) -> usize {
        lock(&self.state).responses.len()
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, port: &str) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.refuse_open {
            return Err(TransportError::Unavailable {
                port: port.into(),
                reason: "refused by script".into(),
            });
        }
        state.open = true;
        state.port = Some(port.into());
        Ok(())
    }

    fn close(&mut self) {
        lock(&self.state).open = false;
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.fail_writes {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "scripted write failure").into());
        }
        state.written.push(frame.to_vec());
        Ok(())
    }

    fn read_frame(&mut self, timeout: Duration) -> Result<Frame, TransportError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        state.last_timeout = Some(timeout);
        match state.responses.pop_front() {
            Some(Scripted::Frame(bytes)) => {
                Frame::from_slice(&bytes).map_err(|_| TransportError::FrameOverflow(bytes.len()))
            }
            Some(Scripted::Timeout) | None => Err(TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event sink that keeps every event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first.
    pub fn events(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    /// Remove and return recorded events.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *lock(&self.events))
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        lock(&self.events).iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &Event) {
        lock(&self.events).push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_clones_share_time() {
        let clock = MockClock::new();
        let other = clock.clone();
        clock.advance(42);
        assert_eq!(other.now_ms(), 42);
        other.set(7);
        assert_eq!(clock.now_ms(), 7);
    }

    #[test]
    fn scripted_transport_requires_open() {
        let mut link = ScriptedTransport::new();
        assert!(matches!(link.write_frame(b"R\n"), Err(TransportError::NotOpen)));
        assert!(matches!(
            link.read_frame(Duration::from_millis(5)),
            Err(TransportError::NotOpen)
        ));
    }

    #[test]
    fn scripted_transport_replays_in_order() {
        let mut link = ScriptedTransport::new();
        link.push_response(b"OK\n");
        link.push_timeout();
        link.open("port").unwrap();

        let timeout = Duration::from_millis(25);
        assert_eq!(link.read_frame(timeout).unwrap().as_slice(), b"OK\n");
        assert!(matches!(
            link.read_frame(timeout),
            Err(TransportError::Timeout { timeout_ms: 25 })
        ));
        // Empty queue also times out
        assert!(matches!(
            link.read_frame(timeout),
            Err(TransportError::Timeout { .. })
        ));
        assert_eq!(link.last_timeout(), Some(timeout));
    }

    #[test]
    fn scripted_transport_refusal_and_write_failure() {
        let mut link = ScriptedTransport::new();
        link.refuse_open(true);
        assert!(matches!(
            link.open("COM3"),
            Err(TransportError::Unavailable { .. })
        ));
        assert!(!link.is_open());

        link.refuse_open(false);
        link.open("COM3").unwrap();
        link.fail_writes(true);
        assert!(matches!(link.write_frame(b"R\n"), Err(TransportError::Io(_))));
        assert!(link.written().is_empty());
    }

    #[test]
    fn oversized_scripted_frame_overflows() {
        let mut link = ScriptedTransport::new();
        link.push_response(&[b'x'; 100]);
        link.open("p").unwrap();
        assert!(matches!(
            link.read_frame(Duration::from_millis(1)),
            Err(TransportError::FrameOverflow(100))
        ));
    }

    #[test]
    fn recording_sink_take_drains() {
        let sink = RecordingSink::new();
        sink.emit(&Event::FrameSent("R".into()));
        sink.emit(&Event::FrameSent("H".into()));
        assert_eq!(sink.count(|e| matches!(e, Event::FrameSent(_))), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.events().is_empty());
    }
}
