//! Wire codec for command and response frames.
//!
//! Every frame is ASCII, starts with its command letter (or response marker),
//! and is terminated by a single `\n`. Decoders accept an optional trailing
//! `\n` or `\r\n` and ignore it.
//!
//! # Commands (host to controller)
//!
//! | Command | Body |
//! |---------|------|
//! | Read status | `R` |
//! | Read heartbeat | `H` |
//! | Set mode | `M` + A1 A2 B1 B2 |
//! | Set E-Stop | `E` + A B, optionally + first channel + 5-digit delay |
//! | Set interlock | `I` + same as E-Stop |
//! | Set power | `P` + state |
//! | Echo string | `S` + text |
//!
//! # Responses (controller to host)
//!
//! | Response | Body | Length |
//! |----------|------|--------|
//! | Ack | `OK` | 2 |
//! | Status | `A` + 8 bits + `B` + 8 bits | 18 |
//! | Heartbeat | `A` + 5 digits + `B` + 5 digits | 12 |
//!
//! # Example
//!
//! ```rust
//! use safety_io_tester::codec::{decode_response, encode};
//! use safety_io_tester::{Command, Mode, Response};
//!
//! assert_eq!(encode(&Command::mode(Mode::Manual)).as_slice(), b"M1001\n");
//! assert_eq!(decode_response(b"OK\n"), Response::Ack);
//! assert_eq!(decode_response(b"garbage"), Response::Malformed);
//! ```

use crate::commands::{
    is_echo_byte, Command, DelayMs, Delayed, EchoText, HeartbeatReading, Response, MAX_ECHO_LEN,
};
use crate::error::CodecError;
use crate::pins::{Channel, DualChannel, PinBank};

/// Frame capacity in bytes, terminator included.
pub const MAX_FRAME_LEN: usize = 64;

/// Frame terminator.
pub const TERMINATOR: u8 = b'\n';

/// A single encoded frame.
pub type Frame = heapless::Vec<u8, MAX_FRAME_LEN>;

const ACK_LEN: usize = 2;
const STATUS_LEN: usize = 18;
const HEARTBEAT_LEN: usize = 12;
const DELAY_DIGITS: usize = 5;

// ============================================================================
// Encoding
// ============================================================================

/// Encode a command into a terminated frame.
///
/// Every representable [`Command`] fits one frame, so this cannot fail.
///
/// ```rust
/// use safety_io_tester::codec::encode;
/// use safety_io_tester::{Channel, Command, DelayMs, Delayed, DualChannel};
///
/// let cmd = Command::SetEStop {
///     state: DualChannel::SET,
///     delayed: Some(Delayed::new(Channel::B, DelayMs::new(250).unwrap())),
/// };
/// assert_eq!(encode(&cmd).as_slice(), b"E11B00250\n");
/// ```
pub fn encode(command: &Command) -> Frame {
    let mut frame = Frame::new();
    put(&mut frame, &[command.letter()]);
    match command {
        Command::ReadStatus | Command::ReadHeartbeat => {}
        Command::SetMode { a1, a2, b1, b2 } => {
            put(&mut frame, &[bit(*a1), bit(*a2), bit(*b1), bit(*b2)]);
        }
        Command::SetEStop { state, delayed } | Command::SetInterlock { state, delayed } => {
            put(&mut frame, &[bit(state.a), bit(state.b)]);
            if let Some(delayed) = delayed {
                put(&mut frame, &[delayed.first.as_byte()]);
                put(&mut frame, &digits(delayed.delay.get()));
            }
        }
        Command::SetPower(on) => put(&mut frame, &[bit(*on)]),
        Command::SetEchoString(text) => put(&mut frame, text.as_bytes()),
    }
    put(&mut frame, &[TERMINATOR]);
    frame
}

/// Encode a response into a terminated frame.
///
/// Returns `None` for [`Response::Malformed`], which has no wire form.
pub fn encode_response(response: &Response) -> Option<Frame> {
    let mut frame = Frame::new();
    match response {
        Response::Ack => put(&mut frame, b"OK"),
        Response::Status(pins) => {
            for channel in [Channel::A, Channel::B] {
                put(&mut frame, &[channel.as_byte()]);
                for value in pins.channel_bits(channel) {
                    put(&mut frame, &[bit(value)]);
                }
            }
        }
        Response::Heartbeat(reading) => {
            put(&mut frame, b"A");
            put(&mut frame, &digits(reading.hz_a));
            put(&mut frame, b"B");
            put(&mut frame, &digits(reading.hz_b));
        }
        Response::Malformed => return None,
    }
    put(&mut frame, &[TERMINATOR]);
    Some(frame)
}

fn put(frame: &mut Frame, bytes: &[u8]) {
    let pushed = frame.extend_from_slice(bytes);
    debug_assert!(pushed.is_ok(), "frame capacity exceeded");
}

#[inline]
fn bit(value: bool) -> u8 {
    if value {
        b'1'
    } else {
        b'0'
    }
}

/// Zero-padded five-digit field. Values are already range-checked.
fn digits(mut value: u32) -> [u8; DELAY_DIGITS] {
    let mut out = [b'0'; DELAY_DIGITS];
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (value % 10) as u8;
        value /= 10;
    }
    out
}

// ============================================================================
// Decoding
// ============================================================================

/// Remove a trailing `\n` or `\r\n`.
pub fn strip_terminator(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

/// Decode a command frame, as the controller does.
///
/// ```rust
/// use safety_io_tester::codec::decode_command;
/// use safety_io_tester::{CodecError, Command};
///
/// assert_eq!(decode_command(b"P1\n"), Ok(Command::SetPower(true)));
/// assert_eq!(decode_command(b"X"), Err(CodecError::UnknownCommand('X')));
/// ```
pub fn decode_command(bytes: &[u8]) -> Result<Command, CodecError> {
    let body = strip_terminator(bytes);
    let (&letter, rest) = body.split_first().ok_or(CodecError::Empty)?;
    let invalid_length = || CodecError::InvalidLength {
        command: letter as char,
        len: body.len(),
    };

    match letter {
        b'R' | b'H' => {
            if !rest.is_empty() {
                return Err(invalid_length());
            }
            Ok(if letter == b'R' {
                Command::ReadStatus
            } else {
                Command::ReadHeartbeat
            })
        }
        b'M' => {
            let [a1, a2, b1, b2] = rest else {
                return Err(invalid_length());
            };
            Ok(Command::SetMode {
                a1: parse_bit(*a1)?,
                a2: parse_bit(*a2)?,
                b1: parse_bit(*b1)?,
                b2: parse_bit(*b2)?,
            })
        }
        b'E' | b'I' => {
            let (state, delayed) = match rest.len() {
                2 => (parse_pair(rest)?, None),
                8 => {
                    let first = Channel::from_byte(rest[2])
                        .ok_or(CodecError::InvalidChannel(rest[2] as char))?;
                    let ms = parse_digits(&rest[3..]).ok_or(CodecError::InvalidDelay)?;
                    let delay = DelayMs::new(ms).map_err(|_| CodecError::InvalidDelay)?;
                    (parse_pair(&rest[..2])?, Some(Delayed::new(first, delay)))
                }
                _ => return Err(invalid_length()),
            };
            Ok(if letter == b'E' {
                Command::SetEStop { state, delayed }
            } else {
                Command::SetInterlock { state, delayed }
            })
        }
        b'P' => {
            let [on] = rest else {
                return Err(invalid_length());
            };
            Ok(Command::SetPower(parse_bit(*on)?))
        }
        b'S' => {
            if rest.len() > MAX_ECHO_LEN {
                return Err(invalid_length());
            }
            if !rest.iter().all(|b| is_echo_byte(*b)) {
                return Err(CodecError::InvalidText);
            }
            let text = core::str::from_utf8(rest).map_err(|_| CodecError::InvalidText)?;
            let text = EchoText::new(text).map_err(|_| CodecError::InvalidText)?;
            Ok(Command::SetEchoString(text))
        }
        other => Err(CodecError::UnknownCommand(other as char)),
    }
}

/// Decode a response frame.
///
/// The response kind is chosen by length. Anything that does not match its
/// kind exactly decodes as [`Response::Malformed`]; no partial data is ever
/// returned.
pub fn decode_response(bytes: &[u8]) -> Response {
    let body = strip_terminator(bytes);
    let decoded = match body.len() {
        ACK_LEN => (body == b"OK").then_some(Response::Ack),
        STATUS_LEN => decode_status(body).map(Response::Status),
        HEARTBEAT_LEN => decode_heartbeat(body).map(Response::Heartbeat),
        _ => None,
    };
    decoded.unwrap_or(Response::Malformed)
}

fn decode_status(body: &[u8]) -> Option<PinBank> {
    if body[0] != b'A' || body[9] != b'B' {
        return None;
    }
    let mut a = [false; 8];
    let mut b = [false; 8];
    for i in 0..8 {
        a[i] = parse_bit(body[1 + i]).ok()?;
        b[i] = parse_bit(body[10 + i]).ok()?;
    }
    Some(PinBank::from_channel_bits(a, b))
}

fn decode_heartbeat(body: &[u8]) -> Option<HeartbeatReading> {
    if body[0] != b'A' || body[6] != b'B' {
        return None;
    }
    let hz_a = parse_digits(&body[1..6])?;
    let hz_b = parse_digits(&body[7..12])?;
    HeartbeatReading::new(hz_a, hz_b).ok()
}

fn parse_bit(byte: u8) -> Result<bool, CodecError> {
    match byte {
        b'0' => Ok(false),
        b'1' => Ok(true),
        other => Err(CodecError::InvalidState(other as char)),
    }
}

fn parse_pair(bytes: &[u8]) -> Result<DualChannel, CodecError> {
    Ok(DualChannel::new(parse_bit(bytes[0])?, parse_bit(bytes[1])?))
}

/// Parse exactly five ASCII digits.
fn parse_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != DELAY_DIGITS {
        return None;
    }
    bytes.iter().try_fold(0u32, |acc, b| {
        b.is_ascii_digit().then(|| acc * 10 + u32::from(b - b'0'))
    })
}

/// Printable rendering of a raw frame for logs and error reports.
pub fn frame_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(strip_terminator(bytes)).into_owned()
}
