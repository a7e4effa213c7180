//! Controller-side state machine.
//!
//! [`ControllerState`] holds the pin bank the controller exposes and applies
//! decoded commands to it, exactly as the device does. It is the core of the
//! [`Simulator`](crate::hal::Simulator), but has no I/O of its own and can be
//! driven directly in tests.
//!
//! # Rules
//!
//! - `stop` mirrors `estop` after every E-Stop change, immediate or delayed.
//!   No command writes `stop` directly.
//! - A staggered E-Stop or interlock command applies its first channel now and
//!   schedules the other channel. A newer command for the same signal cancels
//!   the pending change.
//! - Set commands answer [`Response::Ack`]; reads never mutate pins.
//!
//! # Example
//!
//! ```rust
//! use safety_io_tester::controller::ControllerState;
//! use safety_io_tester::{Channel, Command, DelayMs, Delayed, DualChannel, PinBank, Response};
//!
//! let mut controller = ControllerState::new(PinBank::default());
//!
//! let cmd = Command::SetEStop {
//!     state: DualChannel::SET,
//!     delayed: Some(Delayed::new(Channel::B, DelayMs::new(250).unwrap())),
//! };
//! assert_eq!(controller.apply(&cmd, 0), Response::Ack);
//!
//! // B applied now, A still pending
//! assert_eq!(controller.pins().estop, DualChannel::new(false, true));
//!
//! controller.update(250);
//! assert_eq!(controller.pins().estop, DualChannel::SET);
//! assert_eq!(controller.pins().stop, DualChannel::SET);
//! ```

use crate::commands::{Command, Delayed, EchoText, HeartbeatReading, Response};
use crate::pins::{Channel, DualChannel, PinBank, Signal};
use crate::scheduler::{DelayedTransition, ScheduleResult, TransitionScheduler};

/// Pin bank plus pending transitions of one controller.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pins: PinBank,
    scheduler: TransitionScheduler,
    heartbeat: HeartbeatReading,
    echo: Option<EchoText>,
}

impl ControllerState {
    /// Creates a controller with the given initial pins.
    pub fn new(pins: PinBank) -> Self {
        Self {
            pins,
            scheduler: TransitionScheduler::new(),
            heartbeat: HeartbeatReading::default(),
            echo: None,
        }
    }

    /// Apply one command at `now_ms` and return the controller's answer.
    ///
    /// Transitions already due fire before the command is processed. A
    /// zero-delay stagger fires before this returns.
    pub fn apply(&mut self, command: &Command, now_ms: u64) -> Response {
        self.update(now_ms);

        let response = match command {
            Command::ReadStatus => Response::Status(self.pins),
            Command::ReadHeartbeat => Response::Heartbeat(self.heartbeat),
            Command::SetMode { a1, a2, b1, b2 } => {
                self.pins.mode_bit_1 = DualChannel::new(*a1, *b1);
                self.pins.mode_bit_2 = DualChannel::new(*a2, *b2);
                Response::Ack
            }
            Command::SetEStop { state, delayed } => {
                self.set_dual(Signal::EStop, *state, *delayed, now_ms);
                Response::Ack
            }
            Command::SetInterlock { state, delayed } => {
                self.set_dual(Signal::Interlock, *state, *delayed, now_ms);
                Response::Ack
            }
            Command::SetPower(on) => {
                self.pins.power = DualChannel::new(*on, *on);
                Response::Ack
            }
            Command::SetEchoString(text) => {
                log::info!("Display text: {}", text);
                self.echo = Some(text.clone());
                Response::Ack
            }
        };

        self.update(now_ms);
        response
    }

    /// Fire every transition due at `now_ms`. Returns how many fired.
    pub fn update(&mut self, now_ms: u64) -> usize {
        let fired = self.scheduler.due(now_ms);
        for t in &fired {
            log::debug!(
                "Delayed {} {} -> {} at {} ms",
                t.signal.as_str(),
                t.channel,
                t.value,
                now_ms
            );
            self.write_channel(t.signal, t.channel, t.value);
        }
        fired.len()
    }

    fn set_dual(&mut self, signal: Signal, state: DualChannel, delayed: Option<Delayed>, now_ms: u64) {
        match delayed {
            None => {
                if self.scheduler.cancel(signal).is_some() {
                    log::debug!("Cancelled pending {} transition", signal.as_str());
                }
                for channel in [Channel::A, Channel::B] {
                    self.write_channel(signal, channel, state.get(channel));
                }
            }
            Some(Delayed { first, delay }) => {
                self.write_channel(signal, first, state.get(first));
                let second = first.other();
                let transition = DelayedTransition::new(
                    signal,
                    second,
                    state.get(second),
                    now_ms + u64::from(delay.get()),
                );
                if let ScheduleResult::Superseded { previous } = self.scheduler.schedule(transition)
                {
                    log::debug!(
                        "Superseded pending {} transition due at {} ms",
                        signal.as_str(),
                        previous.fire_at_ms
                    );
                }
            }
        }
    }

    /// Single-channel write that keeps `stop` derived from `estop`.
    fn write_channel(&mut self, signal: Signal, channel: Channel, value: bool) {
        self.pins.set(signal, channel, value);
        if signal == Signal::EStop {
            self.pins.set(Signal::Stop, channel, value);
        }
    }

    /// Current pins.
    pub fn pins(&self) -> &PinBank {
        &self.pins
    }

    /// Heartbeat indicator pair, which the simulator jitters.
    pub fn heartbeat_indicator_mut(&mut self) -> &mut DualChannel {
        &mut self.pins.heartbeat
    }

    /// Set the value returned by the next heartbeat reads.
    pub fn set_heartbeat(&mut self, reading: HeartbeatReading) {
        self.heartbeat = reading;
    }

    /// Last text received by echo.
    pub fn echo_text(&self) -> Option<&EchoText> {
        self.echo.as_ref()
    }

    /// Pending delayed transition for a signal.
    pub fn pending(&self, signal: Signal) -> Option<&DelayedTransition> {
        self.scheduler.pending(signal)
    }

    /// Deadline of the earliest pending transition.
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(PinBank::factory_default())
    }
}
