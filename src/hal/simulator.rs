//! In-process controller simulator.
//!
//! [`Simulator`] implements [`Transport`] and behaves like a controller on the
//! other end of the serial line: each written frame is decoded and applied to
//! a [`ControllerState`], and the encoded answer is queued for the next read.
//!
//! # Timing
//!
//! Delayed transitions fire in two ways, both under the same mutex that
//! serializes command processing:
//!
//! - Lazily, before every write and read and on [`Simulator::pins`]. This makes
//!   tests with a [`MockClock`](crate::hal::MockClock) fully deterministic.
//! - From an optional timer thread ([`Simulator::start_timer`]) that sleeps
//!   until the next deadline and is woken whenever a command is applied.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use safety_io_tester::config::SimulatorConfig;
//! use safety_io_tester::hal::Simulator;
//! use safety_io_tester::traits::Transport;
//!
//! let mut sim = Simulator::new(SimulatorConfig::default().with_seed(1));
//! sim.open("SIM0").unwrap();
//!
//! sim.write_frame(b"M1001\n").unwrap();
//! let reply = sim.read_frame(Duration::from_millis(100)).unwrap();
//! assert_eq!(reply.as_slice(), b"OK\n");
//! assert!(sim.pins().mode_bit_1.a);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::codec::{self, Frame};
use crate::commands::{Command, EchoText, HeartbeatReading};
use crate::config::SimulatorConfig;
use crate::controller::ControllerState;
use crate::error::TransportError;
use crate::pins::{DualChannel, PinBank, Signal};
use crate::scheduler::DelayedTransition;
use crate::traits::{Clock, Event, EventSink, LogSink, SystemClock, Transport};

/// Longest the timer thread sleeps before re-reading the clock.
const MAX_TIMER_WAIT: Duration = Duration::from_millis(50);

struct SimState {
    controller: ControllerState,
    open: bool,
    outbox: VecDeque<Frame>,
    rng: StdRng,
    config: SimulatorConfig,
    shutdown: bool,
}

struct Shared {
    state: Mutex<SimState>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stops and joins the timer thread when the last simulator handle drops.
struct TimerGuard {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Simulator timer thread panicked");
            }
        }
    }
}

/// A simulated safety I/O controller behind the [`Transport`] trait.
///
/// Clones share one controller, so a test can give one handle to the driver
/// and inspect state through another.
#[derive(Clone)]
pub struct Simulator {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    timer: Option<Arc<TimerGuard>>,
}

impl Simulator {
    /// Creates a simulator on the system clock, logging events.
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = SimState {
            controller: ControllerState::new(config.initial_pins),
            open: false,
            outbox: VecDeque::new(),
            rng,
            config,
            shutdown: false,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                wake: Condvar::new(),
            }),
            clock: Arc::new(SystemClock::new()),
            sink: Arc::new(LogSink),
            timer: None,
        }
    }

    /// Use a different clock. Call before [`start_timer`](Self::start_timer).
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Use a different event sink.
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Spawn the timer thread that fires delayed transitions on time.
    ///
    /// Starting an already started timer is a no-op. The thread stops when
    /// the last handle to this simulator drops.
    pub fn start_timer(&mut self) -> std::io::Result<()> {
        if self.timer.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let clock = Arc::clone(&self.clock);
        let handle = thread::Builder::new()
            .name("sim-timer".to_string())
            .spawn(move || timer_loop(shared, clock))?;
        self.timer = Some(Arc::new(TimerGuard {
            shared: Arc::clone(&self.shared),
            handle: Mutex::new(Some(handle)),
        }));
        log::debug!("Simulator timer started");
        Ok(())
    }

    /// Whether the timer thread is running.
    pub fn is_timer_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Current pins, after applying any transitions that are due.
    pub fn pins(&self) -> PinBank {
        let now = self.clock.now_ms();
        let mut state = self.shared.lock();
        state.controller.update(now);
        *state.controller.pins()
    }

    /// Reset the controller to `pins`, discarding pending transitions.
    pub fn set_pins(&self, pins: PinBank) {
        let mut state = self.shared.lock();
        state.controller = ControllerState::new(pins);
    }

    /// Last echo text received.
    pub fn echo_text(&self) -> Option<EchoText> {
        self.shared.lock().controller.echo_text().cloned()
    }

    /// Pending delayed transition for a signal.
    pub fn pending(&self, signal: Signal) -> Option<DelayedTransition> {
        self.shared.lock().controller.pending(signal).copied()
    }

    /// Responses written but not yet read.
    pub fn queued_responses(&self) -> usize {
        self.shared.lock().outbox.len()
    }

    fn handle_frame(&self, state: &mut SimState, bytes: &[u8], now_ms: u64) {
        let command = match codec::decode_command(bytes) {
            Ok(command) => command,
            Err(error) => {
                let frame = codec::frame_text(bytes);
                self.sink.emit(&Event::UnrecognizedFrame { frame, error });
                return;
            }
        };
        log::trace!("Simulator <- {:?}", command);

        if command == Command::ReadHeartbeat {
            let range = state.config.heartbeat_range();
            let hz_a = state.rng.gen_range(range.clone());
            let hz_b = state.rng.gen_range(range);
            // Range is clamped to five digits by the config
            if let Ok(reading) = HeartbeatReading::new(hz_a, hz_b) {
                state.controller.set_heartbeat(reading);
            }
            if state.config.indicator_jitter {
                let jitter = DualChannel::new(state.rng.gen(), state.rng.gen());
                *state.controller.heartbeat_indicator_mut() = jitter;
            }
        }

        let response = state.controller.apply(&command, now_ms);
        if let Some(frame) = codec::encode_response(&response) {
            state.outbox.push_back(frame);
        }
    }
}

impl Transport for Simulator {
    fn open(&mut self, port: &str) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        if state.config.refuse_connections {
            return Err(TransportError::Unavailable {
                port: port.into(),
                reason: "simulator refuses connections".into(),
            });
        }
        state.open = true;
        state.outbox.clear();
        log::debug!("Simulator opened as {}", port);
        Ok(())
    }

    /// Closing drops unread responses but keeps pending transitions.
    fn close(&mut self) {
        let mut state = self.shared.lock();
        state.open = false;
        state.outbox.clear();
    }

    fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let now = self.clock.now_ms();
        let mut state = self.shared.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        state.controller.update(now);
        self.handle_frame(&mut state, frame, now);
        drop(state);
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Returns the next queued response, or times out at once if there is
    /// none: the simulator answers synchronously, so nothing more will arrive.
    fn read_frame(&mut self, timeout: Duration) -> Result<Frame, TransportError> {
        let now = self.clock.now_ms();
        let mut state = self.shared.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        state.controller.update(now);
        state.outbox.pop_front().ok_or(TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}

impl core::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Simulator")
            .field("open", &state.open)
            .field("pins", state.controller.pins())
            .field("timer", &self.timer.is_some())
            .finish()
    }
}

fn timer_loop(shared: Arc<Shared>, clock: Arc<dyn Clock>) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            break;
        }
        let now = clock.now_ms();
        state.controller.update(now);
        state = match state.controller.next_deadline() {
            Some(deadline) => {
                let wait = Duration::from_millis(deadline.saturating_sub(now).max(1));
                shared
                    .wake
                    .wait_timeout(state, wait.min(MAX_TIMER_WAIT))
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => shared
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner),
        };
    }
    log::debug!("Simulator timer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{MockClock, RecordingSink};
    use crate::pins::Channel;

    fn open_sim(config: SimulatorConfig) -> (Simulator, MockClock, RecordingSink) {
        let clock = MockClock::new();
        let sink = RecordingSink::new();
        let mut sim = Simulator::new(config.with_seed(3))
            .with_clock(clock.clone())
            .with_sink(sink.clone());
        sim.open("SIM0").unwrap();
        (sim, clock, sink)
    }

    fn exchange(sim: &mut Simulator, frame: &[u8]) -> Result<Frame, TransportError> {
        sim.write_frame(frame)?;
        sim.read_frame(Duration::from_millis(10))
    }

    #[test]
    fn status_reflects_initial_pins() {
        let (mut sim, _, _) = open_sim(SimulatorConfig::default());
        let reply = exchange(&mut sim, b"R\n").unwrap();
        let expected = codec::encode_response(&crate::commands::Response::Status(
            PinBank::factory_default(),
        ))
        .unwrap();
        assert_eq!(reply, expected);
    }

    #[test]
    fn requires_open() {
        let mut sim = Simulator::new(SimulatorConfig::default());
        assert!(matches!(sim.write_frame(b"R\n"), Err(TransportError::NotOpen)));
    }

    #[test]
    fn refuses_connections_when_configured() {
        let mut sim = Simulator::new(SimulatorConfig::default().with_refuse_connections(true));
        assert!(matches!(
            sim.open("SIM0"),
            Err(TransportError::Unavailable { .. })
        ));
        assert!(!sim.is_open());
    }

    #[test]
    fn malformed_frame_gets_no_response() {
        let (mut sim, _, sink) = open_sim(SimulatorConfig::default());
        let result = exchange(&mut sim, b"Z99\n");
        assert!(matches!(result, Err(TransportError::Timeout { timeout_ms: 10 })));
        assert_eq!(
            sink.count(|e| matches!(e, Event::UnrecognizedFrame { frame, .. } if frame == "Z99")),
            1
        );
    }

    #[test]
    fn heartbeat_within_configured_range() {
        let (mut sim, _, _) =
            open_sim(SimulatorConfig::default().with_heartbeat_range(5, 15));
        for _ in 0..50 {
            let reply = exchange(&mut sim, b"H\n").unwrap();
            match codec::decode_response(&reply) {
                crate::commands::Response::Heartbeat(r) => {
                    assert!((5..=15).contains(&r.hz_a));
                    assert!((5..=15).contains(&r.hz_b));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn jitter_only_touches_heartbeat_indicator() {
        let (mut sim, _, _) = open_sim(SimulatorConfig::default());
        let before = sim.pins();
        for _ in 0..20 {
            exchange(&mut sim, b"H\n").unwrap();
            assert!(!sim.pins().differs_ignoring_heartbeat(&before));
        }
    }

    #[test]
    fn no_jitter_keeps_indicator() {
        let (mut sim, _, _) =
            open_sim(SimulatorConfig::default().with_indicator_jitter(false));
        let before = sim.pins();
        for _ in 0..5 {
            exchange(&mut sim, b"H\n").unwrap();
        }
        assert_eq!(sim.pins(), before);
    }

    #[test]
    fn delayed_transition_fires_on_mock_clock() {
        let (mut sim, clock, _) =
            open_sim(SimulatorConfig::default().with_initial_pins(PinBank::default()));
        exchange(&mut sim, b"E11A00300\n").unwrap();

        assert_eq!(sim.pins().estop, DualChannel::new(true, false));
        assert!(sim.pending(Signal::EStop).is_some());

        clock.advance(299);
        assert_eq!(sim.pins().estop, DualChannel::new(true, false));

        clock.advance(1);
        assert_eq!(sim.pins().estop, DualChannel::SET);
        assert_eq!(sim.pins().stop, DualChannel::SET);
        assert!(sim.pending(Signal::EStop).is_none());
    }

    #[test]
    fn close_keeps_pending_transitions() {
        let (mut sim, clock, _) =
            open_sim(SimulatorConfig::default().with_initial_pins(PinBank::default()));
        exchange(&mut sim, b"I11B00100\n").unwrap();
        sim.close();

        assert!(sim.pending(Signal::Interlock).is_some());
        clock.advance(100);
        assert_eq!(sim.pins().interlock, DualChannel::SET);
    }

    #[test]
    fn close_discards_unread_responses() {
        let (mut sim, _, _) = open_sim(SimulatorConfig::default());
        sim.write_frame(b"P0\n").unwrap();
        assert_eq!(sim.queued_responses(), 1);
        sim.close();
        sim.open("SIM0").unwrap();
        assert_eq!(sim.queued_responses(), 0);
        assert_eq!(sim.pins().power, DualChannel::CLEAR);
    }

    #[test]
    fn echo_text_is_inspectable() {
        let (mut sim, _, _) = open_sim(SimulatorConfig::default());
        assert_eq!(exchange(&mut sim, b"SHello World!\n").unwrap().as_slice(), b"OK\n");
        assert_eq!(sim.echo_text().unwrap().as_str(), "Hello World!");
    }

    #[test]
    fn timer_thread_fires_on_real_clock() {
        let mut sim = Simulator::new(
            SimulatorConfig::default()
                .with_initial_pins(PinBank::default())
                .with_seed(1),
        )
        .with_sink(RecordingSink::new());
        sim.start_timer().unwrap();
        assert!(sim.is_timer_running());

        let observer = sim.clone();
        sim.open("SIM0").unwrap();
        exchange(&mut sim, b"E11B00050\n").unwrap();

        // Observe through the shared state only, without applying anything lazily
        let read_raw = |s: &Simulator| *s.shared.lock().controller.pins();
        assert_eq!(read_raw(&observer).estop, DualChannel::new(false, true));

        thread::sleep(Duration::from_millis(300));
        assert_eq!(read_raw(&observer).estop, DualChannel::SET);
        assert!(read_raw(&observer).stop.get(Channel::A));
    }

    #[test]
    fn timer_stops_when_last_handle_drops() {
        let mut sim = Simulator::new(SimulatorConfig::default().with_seed(2))
            .with_sink(RecordingSink::new());
        sim.start_timer().unwrap();
        let shared = Arc::clone(&sim.shared);
        let clone = sim.clone();
        drop(sim);
        assert!(!shared.lock().shutdown);
        drop(clone);
        assert!(shared.lock().shutdown);
    }
}
