//! Dual-channel pin model of the safety I/O controller.
//!
//! Every safety signal on the controller is physically duplicated as channel A
//! and channel B. [`PinBank`] is the complete snapshot of all eight signals, in
//! the same order they appear in a status frame.
//!
//! # Example
//!
//! ```rust
//! use safety_io_tester::{Channel, DualChannel, PinBank, Signal};
//!
//! let mut pins = PinBank::default();
//! pins.set(Signal::Interlock, Channel::B, true);
//!
//! assert_eq!(pins.interlock, DualChannel::new(false, true));
//! assert_eq!(pins.to_string(), "A00000000B00010000");
//! ```

use core::fmt;

// ============================================================================
// Channels
// ============================================================================

/// One side of a redundant signal pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    /// Channel A.
    A,
    /// Channel B.
    B,
}

impl Channel {
    /// Returns the opposite channel.
    #[inline]
    pub const fn other(self) -> Self {
        match self {
            Channel::A => Channel::B,
            Channel::B => Channel::A,
        }
    }

    /// Wire representation (`b'A'` or `b'B'`).
    #[inline]
    pub const fn as_byte(self) -> u8 {
        match self {
            Channel::A => b'A',
            Channel::B => b'B',
        }
    }

    /// Parse a channel marker byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(Channel::A),
            b'B' => Some(Channel::B),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::A => f.write_str("A"),
            Channel::B => f.write_str("B"),
        }
    }
}

/// State of a redundant signal pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DualChannel {
    /// Channel A state.
    pub a: bool,
    /// Channel B state.
    pub b: bool,
}

impl DualChannel {
    /// Both channels clear.
    pub const CLEAR: Self = Self::new(false, false);

    /// Both channels set.
    pub const SET: Self = Self::new(true, true);

    /// Creates a pair from explicit channel states.
    #[inline]
    pub const fn new(a: bool, b: bool) -> Self {
        Self { a, b }
    }

    /// Returns the state of one channel.
    #[inline]
    pub const fn get(&self, channel: Channel) -> bool {
        match channel {
            Channel::A => self.a,
            Channel::B => self.b,
        }
    }

    /// Sets the state of one channel.
    #[inline]
    pub fn set(&mut self, channel: Channel, value: bool) {
        match channel {
            Channel::A => self.a = value,
            Channel::B => self.b = value,
        }
    }

    /// Returns a copy with the selected channels inverted.
    ///
    /// ```rust
    /// use safety_io_tester::DualChannel;
    ///
    /// let pair = DualChannel::new(true, false);
    /// assert_eq!(pair.toggled(true, false), DualChannel::new(false, false));
    /// assert_eq!(pair.toggled(true, true), DualChannel::new(false, true));
    /// ```
    #[inline]
    pub const fn toggled(self, toggle_a: bool, toggle_b: bool) -> Self {
        Self {
            a: self.a ^ toggle_a,
            b: self.b ^ toggle_b,
        }
    }

    /// True if either channel is set.
    #[inline]
    pub const fn any(&self) -> bool {
        self.a || self.b
    }

    /// True if both channels agree.
    #[inline]
    pub const fn agrees(&self) -> bool {
        self.a == self.b
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Named dual-channel signals, in status-frame order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Signal {
    /// First operating-mode bit.
    ModeBit1,
    /// Second operating-mode bit.
    ModeBit2,
    /// Emergency stop.
    EStop,
    /// Guard/door interlock.
    Interlock,
    /// Stop output, derived from [`EStop`](Self::EStop).
    Stop,
    /// Teach mode indicator.
    Teach,
    /// Heartbeat indicator.
    Heartbeat,
    /// Power.
    Power,
}

impl Signal {
    /// All signals in the order they are transmitted.
    pub const ALL: [Signal; 8] = [
        Signal::ModeBit1,
        Signal::ModeBit2,
        Signal::EStop,
        Signal::Interlock,
        Signal::Stop,
        Signal::Teach,
        Signal::Heartbeat,
        Signal::Power,
    ];

    /// Short lowercase name, used in log lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Signal::ModeBit1 => "mode1",
            Signal::ModeBit2 => "mode2",
            Signal::EStop => "estop",
            Signal::Interlock => "interlock",
            Signal::Stop => "stop",
            Signal::Teach => "teach",
            Signal::Heartbeat => "heartbeat",
            Signal::Power => "power",
        }
    }
}

// ============================================================================
// Pin Bank
// ============================================================================

/// Complete dual-channel state snapshot of the controller.
///
/// `Default` is the all-clear bank, which is also what the host assumes before
/// its first successful status read. [`PinBank::factory_default`] is the
/// state a controller powers up in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinBank {
    /// Mode bit 1 (A1, B1).
    pub mode_bit_1: DualChannel,
    /// Mode bit 2 (A2, B2).
    pub mode_bit_2: DualChannel,
    /// Emergency stop.
    pub estop: DualChannel,
    /// Interlock.
    pub interlock: DualChannel,
    /// Stop; mirrors `estop` on the controller.
    pub stop: DualChannel,
    /// Teach mode.
    pub teach: DualChannel,
    /// Heartbeat indicator.
    pub heartbeat: DualChannel,
    /// Power.
    pub power: DualChannel,
}

impl PinBank {
    /// Power-on state of the controller.
    pub const fn factory_default() -> Self {
        Self {
            mode_bit_1: DualChannel::new(false, true),
            mode_bit_2: DualChannel::new(true, false),
            estop: DualChannel::SET,
            interlock: DualChannel::SET,
            stop: DualChannel::SET,
            teach: DualChannel::CLEAR,
            heartbeat: DualChannel::CLEAR,
            power: DualChannel::SET,
        }
    }

    /// Returns the pair for a signal.
    pub const fn get(&self, signal: Signal) -> DualChannel {
        match signal {
            Signal::ModeBit1 => self.mode_bit_1,
            Signal::ModeBit2 => self.mode_bit_2,
            Signal::EStop => self.estop,
            Signal::Interlock => self.interlock,
            Signal::Stop => self.stop,
            Signal::Teach => self.teach,
            Signal::Heartbeat => self.heartbeat,
            Signal::Power => self.power,
        }
    }

    /// Mutable access to the pair for a signal.
    pub fn get_mut(&mut self, signal: Signal) -> &mut DualChannel {
        match signal {
            Signal::ModeBit1 => &mut self.mode_bit_1,
            Signal::ModeBit2 => &mut self.mode_bit_2,
            Signal::EStop => &mut self.estop,
            Signal::Interlock => &mut self.interlock,
            Signal::Stop => &mut self.stop,
            Signal::Teach => &mut self.teach,
            Signal::Heartbeat => &mut self.heartbeat,
            Signal::Power => &mut self.power,
        }
    }

    /// Sets one channel of one signal.
    ///
    /// This is a raw write: it does not derive `stop` from `estop`. Command
    /// semantics live in [`ControllerState`](crate::controller::ControllerState).
    pub fn set(&mut self, signal: Signal, channel: Channel, value: bool) {
        self.get_mut(signal).set(channel, value);
    }

    /// The eight bits of one channel in transmission order.
    pub fn channel_bits(&self, channel: Channel) -> [bool; 8] {
        Signal::ALL.map(|signal| self.get(signal).get(channel))
    }

    /// Builds a bank from per-channel bit arrays in transmission order.
    pub fn from_channel_bits(a: [bool; 8], b: [bool; 8]) -> Self {
        let mut pins = Self::default();
        for (i, signal) in Signal::ALL.iter().enumerate() {
            *pins.get_mut(*signal) = DualChannel::new(a[i], b[i]);
        }
        pins
    }

    /// True if any signal other than the heartbeat indicator differs.
    ///
    /// The heartbeat indicator toggles continuously on a live controller, so
    /// it is excluded from change detection.
    ///
    /// ```rust
    /// use safety_io_tester::{DualChannel, PinBank};
    ///
    /// let before = PinBank::default();
    /// let mut after = before;
    /// after.heartbeat = DualChannel::SET;
    /// assert!(!after.differs_ignoring_heartbeat(&before));
    ///
    /// after.power = DualChannel::SET;
    /// assert!(after.differs_ignoring_heartbeat(&before));
    /// ```
    pub fn differs_ignoring_heartbeat(&self, other: &PinBank) -> bool {
        Signal::ALL
            .iter()
            .filter(|signal| **signal != Signal::Heartbeat)
            .any(|signal| self.get(*signal) != other.get(*signal))
    }

    /// Whether `stop` currently mirrors `estop` on both channels.
    pub fn stop_mirrors_estop(&self) -> bool {
        self.stop == self.estop
    }
}

/// Formats the bank exactly as the body of a status frame.
impl fmt::Display for PinBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for channel in [Channel::A, Channel::B] {
            write!(f, "{}", channel)?;
            for bit in self.channel_bits(channel) {
                f.write_str(if bit { "1" } else { "0" })?;
            }
        }
        Ok(())
    }
}
