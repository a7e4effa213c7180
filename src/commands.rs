//! Command and response types for the safety I/O controller protocol.
//!
//! This module defines the logical operations the host can request and the
//! typed responses the controller returns. Wire encoding lives in
//! [`codec`](crate::codec).
//!
//! # Validated Parameters
//!
//! Parameters with a restricted wire range are newtypes that can only be
//! constructed through a validating constructor:
//!
//! - [`DelayMs`]: 0 to 99999 ms (five-digit delay field)
//! - [`EchoText`]: printable ASCII, at most [`MAX_ECHO_LEN`] bytes
//!
//! A [`Command`] built from these can always be encoded. Invalid caller input
//! is rejected with a [`RequestError`] before anything is sent.
//!
//! ```rust
//! use safety_io_tester::{DelayMs, RequestError};
//!
//! assert!(DelayMs::new(99_999).is_ok());
//! assert_eq!(DelayMs::new(100_000), Err(RequestError::DelayOutOfRange(100_000)));
//! ```
//!
//! # Operator Vocabulary
//!
//! [`Mode`], [`ModeBit`] and [`TriggerPattern`] are the names an operator
//! picks from. Each parses from text the same way the driver's callers
//! present them:
//!
//! ```rust
//! use safety_io_tester::{Mode, TriggerPattern};
//!
//! let mode: Mode = "Manual".parse().unwrap();
//! assert_eq!(mode.bits(), [true, false, false, true]);
//!
//! let pattern: TriggerPattern = "B then A".parse().unwrap();
//! assert_eq!(pattern, TriggerPattern::BThenA);
//! ```

use core::fmt;
use core::str::FromStr;

use crate::error::{RequestError, MAX_DELAY_MS};
use crate::pins::{Channel, DualChannel, PinBank, Signal};

/// Maximum echo text length in bytes.
pub const MAX_ECHO_LEN: usize = 62;

/// Largest heartbeat value the five-digit field can carry.
pub const MAX_HEARTBEAT_HZ: u32 = 99_999;

// ============================================================================
// Validated Parameters
// ============================================================================

/// Inter-channel delay in milliseconds, guaranteed to fit five digits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DelayMs(u32);

impl DelayMs {
    /// Zero delay.
    pub const ZERO: Self = Self(0);

    /// Largest representable delay.
    pub const MAX: Self = Self(MAX_DELAY_MS);

    /// Validate a delay value.
    pub const fn new(ms: u32) -> Result<Self, RequestError> {
        if ms > MAX_DELAY_MS {
            Err(RequestError::DelayOutOfRange(ms))
        } else {
            Ok(Self(ms))
        }
    }

    /// Parse an operator-entered delay. Empty input means zero.
    pub fn from_text(s: &str) -> Result<Self, RequestError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::ZERO);
        }
        let ms: u32 = s
            .parse()
            .map_err(|_| RequestError::InvalidDelay(s.into()))?;
        Self::new(ms)
    }

    /// The delay in milliseconds.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for DelayMs {
    type Error = RequestError;

    fn try_from(ms: u32) -> Result<Self, Self::Error> {
        Self::new(ms)
    }
}

/// Text for the controller's display, guaranteed to fit one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EchoText(heapless::String<MAX_ECHO_LEN>);

impl EchoText {
    /// Validate echo text: printable ASCII, no longer than [`MAX_ECHO_LEN`].
    ///
    /// ```rust
    /// use safety_io_tester::{EchoText, RequestError};
    ///
    /// assert_eq!(EchoText::new("Hello World!").unwrap().as_str(), "Hello World!");
    /// assert_eq!(EchoText::new("line\nbreak"), Err(RequestError::EchoNotAscii));
    /// ```
    pub fn new(text: &str) -> Result<Self, RequestError> {
        if !text.bytes().all(is_echo_byte) {
            return Err(RequestError::EchoNotAscii);
        }
        let mut s = heapless::String::new();
        s.push_str(text).map_err(|_| RequestError::EchoTooLong {
            len: text.len(),
            max: MAX_ECHO_LEN,
        })?;
        Ok(Self(s))
    }

    /// The text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The text as wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EchoText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes allowed in echo text.
#[inline]
pub(crate) fn is_echo_byte(b: u8) -> bool {
    b == b' ' || b.is_ascii_graphic()
}

// ============================================================================
// Commands
// ============================================================================

/// Staggered application of a dual-channel change.
///
/// `first` is applied immediately, the other channel `delay` later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Delayed {
    /// Channel applied immediately.
    pub first: Channel,
    /// Delay before the other channel is applied.
    pub delay: DelayMs,
}

impl Delayed {
    /// Creates a delayed clause.
    pub const fn new(first: Channel, delay: DelayMs) -> Self {
        Self { first, delay }
    }
}

/// An operation sent to the controller.
///
/// Each variant maps to exactly one wire frame.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Command {
    /// Request the full pin state (`R`).
    ReadStatus,
    /// Request a heartbeat frequency measurement (`H`).
    ReadHeartbeat,
    /// Write all four mode bits (`M`).
    SetMode {
        /// Mode bit A1.
        a1: bool,
        /// Mode bit A2.
        a2: bool,
        /// Mode bit B1.
        b1: bool,
        /// Mode bit B2.
        b2: bool,
    },
    /// Set emergency stop channels (`E`).
    SetEStop {
        /// Target channel states.
        state: DualChannel,
        /// Optional staggering between channels.
        delayed: Option<Delayed>,
    },
    /// Set interlock channels (`I`).
    SetInterlock {
        /// Target channel states.
        state: DualChannel,
        /// Optional staggering between channels.
        delayed: Option<Delayed>,
    },
    /// Set power on both channels (`P`).
    SetPower(bool),
    /// Show text on the controller display (`S`).
    SetEchoString(EchoText),
}

impl Command {
    /// Build a mode command for a named mode.
    pub const fn mode(mode: Mode) -> Self {
        let [a1, a2, b1, b2] = mode.bits();
        Self::SetMode { a1, a2, b1, b2 }
    }

    /// Wire command letter.
    pub const fn letter(&self) -> u8 {
        match self {
            Self::ReadStatus => b'R',
            Self::ReadHeartbeat => b'H',
            Self::SetMode { .. } => b'M',
            Self::SetEStop { .. } => b'E',
            Self::SetInterlock { .. } => b'I',
            Self::SetPower(_) => b'P',
            Self::SetEchoString(_) => b'S',
        }
    }

    /// True for commands acknowledged with `OK`.
    pub const fn expects_ack(&self) -> bool {
        !matches!(self, Self::ReadStatus | Self::ReadHeartbeat)
    }
}

// ============================================================================
// Operator Vocabulary
// ============================================================================

/// Named operating modes, each a fixed pattern of the four mode bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// A2 and B1 set.
    Automatic,
    /// A1 and B1 set.
    Stop,
    /// A1 and B2 set.
    Manual,
    /// A2 and B2 set.
    Mute,
}

impl Mode {
    /// All modes in menu order.
    pub const ALL: [Mode; 4] = [Mode::Automatic, Mode::Stop, Mode::Manual, Mode::Mute];

    /// Mode bits in wire order (A1, A2, B1, B2).
    pub const fn bits(&self) -> [bool; 4] {
        match self {
            Mode::Automatic => [false, true, true, false],
            Mode::Stop => [true, false, true, false],
            Mode::Manual => [true, false, false, true],
            Mode::Mute => [false, true, false, true],
        }
    }

    /// Display name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Mode::Automatic => "Automatic",
            Mode::Stop => "Stop",
            Mode::Manual => "Manual",
            Mode::Mute => "Mute",
        }
    }

    /// Identify the mode encoded by a pin bank's mode bits, if any.
    ///
    /// ```rust
    /// use safety_io_tester::{Mode, PinBank};
    ///
    /// // Power-on bits A2 + B1
    /// assert_eq!(Mode::from_pins(&PinBank::factory_default()), Some(Mode::Automatic));
    /// assert_eq!(Mode::from_pins(&PinBank::default()), None);
    /// ```
    pub fn from_pins(pins: &PinBank) -> Option<Self> {
        let bits = [
            pins.mode_bit_1.a,
            pins.mode_bit_2.a,
            pins.mode_bit_1.b,
            pins.mode_bit_2.b,
        ];
        Self::ALL.into_iter().find(|m| m.bits() == bits)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "automatic" | "auto" => Ok(Mode::Automatic),
            "stop" => Ok(Mode::Stop),
            "manual" => Ok(Mode::Manual),
            "mute" => Ok(Mode::Mute),
            _ => Err(RequestError::UnknownMode(s.into())),
        }
    }
}

/// One of the four individually addressable mode bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModeBit {
    /// Channel A, bit 1.
    A1,
    /// Channel A, bit 2.
    A2,
    /// Channel B, bit 1.
    B1,
    /// Channel B, bit 2.
    B2,
}

impl ModeBit {
    /// The signal and channel this bit lives on.
    pub const fn location(&self) -> (Signal, Channel) {
        match self {
            ModeBit::A1 => (Signal::ModeBit1, Channel::A),
            ModeBit::A2 => (Signal::ModeBit2, Channel::A),
            ModeBit::B1 => (Signal::ModeBit1, Channel::B),
            ModeBit::B2 => (Signal::ModeBit2, Channel::B),
        }
    }
}

impl FromStr for ModeBit {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A1" => Ok(ModeBit::A1),
            "A2" => Ok(ModeBit::A2),
            "B1" => Ok(ModeBit::B1),
            "B2" => Ok(ModeBit::B2),
            _ => Err(RequestError::UnknownModeBit(s.into())),
        }
    }
}

/// How a dual-channel trigger toggles its two channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TriggerPattern {
    /// Both channels at once.
    AAndB,
    /// A now, B after the delay.
    AThenB,
    /// B now, A after the delay.
    BThenA,
    /// Channel A only.
    AOnly,
    /// Channel B only.
    BOnly,
}

impl TriggerPattern {
    /// All patterns in menu order.
    pub const ALL: [TriggerPattern; 5] = [
        TriggerPattern::AAndB,
        TriggerPattern::AThenB,
        TriggerPattern::BThenA,
        TriggerPattern::AOnly,
        TriggerPattern::BOnly,
    ];

    /// Pattern at a menu index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Which channels the pattern toggles, as (A, B).
    pub const fn toggles(&self) -> (bool, bool) {
        match self {
            TriggerPattern::AAndB | TriggerPattern::AThenB | TriggerPattern::BThenA => {
                (true, true)
            }
            TriggerPattern::AOnly => (true, false),
            TriggerPattern::BOnly => (false, true),
        }
    }

    /// Channel applied first, for staggered patterns.
    pub const fn first_channel(&self) -> Option<Channel> {
        match self {
            TriggerPattern::AThenB => Some(Channel::A),
            TriggerPattern::BThenA => Some(Channel::B),
            _ => None,
        }
    }

    /// Whether the pattern uses the delay.
    pub const fn is_staggered(&self) -> bool {
        self.first_channel().is_some()
    }

    /// Target state and staggering for this pattern, starting from `current`.
    ///
    /// ```rust
    /// use safety_io_tester::{Channel, DelayMs, DualChannel, TriggerPattern};
    ///
    /// let delay = DelayMs::new(250).unwrap();
    /// let (state, delayed) = TriggerPattern::BThenA.resolve(DualChannel::CLEAR, delay);
    /// assert_eq!(state, DualChannel::SET);
    /// assert_eq!(delayed.unwrap().first, Channel::B);
    /// ```
    pub fn resolve(&self, current: DualChannel, delay: DelayMs) -> (DualChannel, Option<Delayed>) {
        let (toggle_a, toggle_b) = self.toggles();
        let state = current.toggled(toggle_a, toggle_b);
        let delayed = self.first_channel().map(|first| Delayed::new(first, delay));
        (state, delayed)
    }

    /// Display name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TriggerPattern::AAndB => "A and B",
            TriggerPattern::AThenB => "A then B",
            TriggerPattern::BThenA => "B then A",
            TriggerPattern::AOnly => "A only",
            TriggerPattern::BOnly => "B only",
        }
    }
}

impl fmt::Display for TriggerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerPattern {
    type Err = RequestError;

    /// Accepts names like `"A and B"`, `"a-then-b"`, `"B_ONLY"` or `"both"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "aandb" | "both" => Ok(TriggerPattern::AAndB),
            "athenb" => Ok(TriggerPattern::AThenB),
            "bthena" => Ok(TriggerPattern::BThenA),
            "aonly" => Ok(TriggerPattern::AOnly),
            "bonly" => Ok(TriggerPattern::BOnly),
            _ => Err(RequestError::UnknownTrigger(s.into())),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Heartbeat frequencies measured on both channels, in Hz.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawHeartbeat"))]
pub struct HeartbeatReading {
    /// Channel A frequency.
    pub hz_a: u32,
    /// Channel B frequency.
    pub hz_b: u32,
}

impl HeartbeatReading {
    /// Validate a reading; both values must fit five digits.
    pub const fn new(hz_a: u32, hz_b: u32) -> Result<Self, RequestError> {
        if hz_a > MAX_HEARTBEAT_HZ {
            return Err(RequestError::HeartbeatOutOfRange(hz_a));
        }
        if hz_b > MAX_HEARTBEAT_HZ {
            return Err(RequestError::HeartbeatOutOfRange(hz_b));
        }
        Ok(Self { hz_a, hz_b })
    }

    /// The reading as a tuple (A, B).
    pub const fn as_tuple(&self) -> (u32, u32) {
        (self.hz_a, self.hz_b)
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawHeartbeat {
    hz_a: u32,
    hz_b: u32,
}

#[cfg(feature = "serde")]
impl TryFrom<RawHeartbeat> for HeartbeatReading {
    type Error = RequestError;

    fn try_from(raw: RawHeartbeat) -> Result<Self, Self::Error> {
        HeartbeatReading::new(raw.hz_a, raw.hz_b)
    }
}

/// A decoded response frame.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Response {
    /// Set-command accepted.
    Ack,
    /// Full pin state.
    Status(PinBank),
    /// Heartbeat measurement.
    Heartbeat(HeartbeatReading),
    /// Anything that failed to decode.
    Malformed,
}

#[cfg(test)]
mod tests {
    use super::*;

    // === DelayMs ===

    #[test]
    fn delay_bounds() {
        assert_eq!(DelayMs::new(0).unwrap().get(), 0);
        assert_eq!(DelayMs::new(99_999).unwrap(), DelayMs::MAX);
        assert_eq!(
            DelayMs::new(100_000),
            Err(RequestError::DelayOutOfRange(100_000))
        );
        assert!(DelayMs::try_from(u32::MAX).is_err());
    }

    #[test]
    fn delay_from_text() {
        assert_eq!(DelayMs::from_text("").unwrap(), DelayMs::ZERO);
        assert_eq!(DelayMs::from_text(" 250 ").unwrap().get(), 250);
        assert_eq!(
            DelayMs::from_text("abc"),
            Err(RequestError::InvalidDelay("abc".into()))
        );
        assert_eq!(
            DelayMs::from_text("123456"),
            Err(RequestError::DelayOutOfRange(123_456))
        );
    }

    // === EchoText ===

    #[test]
    fn echo_text_limits() {
        let max = "x".repeat(MAX_ECHO_LEN);
        assert_eq!(EchoText::new(&max).unwrap().len(), MAX_ECHO_LEN);

        let too_long = "x".repeat(MAX_ECHO_LEN + 1);
        assert_eq!(
            EchoText::new(&too_long),
            Err(RequestError::EchoTooLong {
                len: MAX_ECHO_LEN + 1,
                max: MAX_ECHO_LEN
            })
        );
    }

    #[test]
    fn echo_text_rejects_control_and_unicode() {
        assert_eq!(EchoText::new("tab\there"), Err(RequestError::EchoNotAscii));
        assert_eq!(EchoText::new("café"), Err(RequestError::EchoNotAscii));
        assert!(EchoText::new("").unwrap().is_empty());
    }

    // === Command ===

    #[test]
    fn command_letters() {
        assert_eq!(Command::ReadStatus.letter(), b'R');
        assert_eq!(Command::ReadHeartbeat.letter(), b'H');
        assert_eq!(Command::SetPower(true).letter(), b'P');
        assert_eq!(Command::mode(Mode::Stop).letter(), b'M');
    }

    #[test]
    fn command_expects_ack() {
        assert!(!Command::ReadStatus.expects_ack());
        assert!(!Command::ReadHeartbeat.expects_ack());
        assert!(Command::SetPower(false).expects_ack());
        assert!(Command::SetEchoString(EchoText::default()).expects_ack());
    }

    #[test]
    fn manual_mode_command_bits() {
        assert_eq!(
            Command::mode(Mode::Manual),
            Command::SetMode {
                a1: true,
                a2: false,
                b1: false,
                b2: true
            }
        );
    }

    // === Mode ===

    #[test]
    fn mode_parsing() {
        assert_eq!("Automatic".parse::<Mode>().unwrap(), Mode::Automatic);
        assert_eq!(" stop ".parse::<Mode>().unwrap(), Mode::Stop);
        assert_eq!("MUTE".parse::<Mode>().unwrap(), Mode::Mute);
        assert_eq!(
            "Turbo".parse::<Mode>(),
            Err(RequestError::UnknownMode("Turbo".into()))
        );
    }

    #[test]
    fn every_mode_roundtrips_through_pins() {
        for mode in Mode::ALL {
            let [a1, a2, b1, b2] = mode.bits();
            let mut pins = PinBank::default();
            pins.mode_bit_1 = DualChannel::new(a1, b1);
            pins.mode_bit_2 = DualChannel::new(a2, b2);
            assert_eq!(Mode::from_pins(&pins), Some(mode));
        }
    }

    // === ModeBit ===

    #[test]
    fn mode_bit_parsing_and_location() {
        assert_eq!("a2".parse::<ModeBit>().unwrap(), ModeBit::A2);
        assert_eq!(
            ModeBit::B1.location(),
            (Signal::ModeBit1, Channel::B)
        );
        assert!("C1".parse::<ModeBit>().is_err());
    }

    // === TriggerPattern ===

    #[test]
    fn trigger_pattern_parsing() {
        assert_eq!("A and B".parse::<TriggerPattern>().unwrap(), TriggerPattern::AAndB);
        assert_eq!("a-then-b".parse::<TriggerPattern>().unwrap(), TriggerPattern::AThenB);
        assert_eq!("B then A".parse::<TriggerPattern>().unwrap(), TriggerPattern::BThenA);
        assert_eq!("A_ONLY".parse::<TriggerPattern>().unwrap(), TriggerPattern::AOnly);
        assert_eq!("b only".parse::<TriggerPattern>().unwrap(), TriggerPattern::BOnly);
        assert!("sideways".parse::<TriggerPattern>().is_err());
    }

    #[test]
    fn trigger_pattern_from_index() {
        assert_eq!(TriggerPattern::from_index(0), Some(TriggerPattern::AAndB));
        assert_eq!(TriggerPattern::from_index(4), Some(TriggerPattern::BOnly));
        assert_eq!(TriggerPattern::from_index(5), None);
    }

    #[test]
    fn single_channel_patterns_ignore_delay() {
        let delay = DelayMs::new(500).unwrap();
        let current = DualChannel::new(true, false);

        let (state, delayed) = TriggerPattern::AOnly.resolve(current, delay);
        assert_eq!(state, DualChannel::new(false, false));
        assert!(delayed.is_none());

        let (state, delayed) = TriggerPattern::BOnly.resolve(current, delay);
        assert_eq!(state, DualChannel::new(true, true));
        assert!(delayed.is_none());

        let (state, delayed) = TriggerPattern::AAndB.resolve(current, delay);
        assert_eq!(state, DualChannel::new(false, true));
        assert!(delayed.is_none());
    }

    #[test]
    fn staggered_patterns_carry_delay() {
        let delay = DelayMs::new(100).unwrap();
        let (state, delayed) = TriggerPattern::AThenB.resolve(DualChannel::CLEAR, delay);
        assert_eq!(state, DualChannel::SET);
        assert_eq!(delayed, Some(Delayed::new(Channel::A, delay)));
        assert!(TriggerPattern::AThenB.is_staggered());
        assert!(!TriggerPattern::AOnly.is_staggered());
    }

    // === HeartbeatReading ===

    #[test]
    fn heartbeat_reading_bounds() {
        assert_eq!(HeartbeatReading::new(0, 99_999).unwrap().as_tuple(), (0, 99_999));
        assert_eq!(
            HeartbeatReading::new(100_000, 0),
            Err(RequestError::HeartbeatOutOfRange(100_000))
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn heartbeat_reading_deserialize_checks_range() {
        let ok: HeartbeatReading = serde_json::from_str(r#"{"hz_a":10,"hz_b":12}"#).unwrap();
        assert_eq!(ok.as_tuple(), (10, 12));
        assert!(serde_json::from_str::<HeartbeatReading>(r#"{"hz_a":100000,"hz_b":1}"#).is_err());
        assert!(
            serde_json::from_str::<Response>(r#"{"Heartbeat":{"hz_a":5,"hz_b":123456}}"#).is_err()
        );
    }
}
