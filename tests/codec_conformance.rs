//! Wire-level conformance: raw frames written straight to the simulator

use std::time::Duration;

use safety_io_tester::{
    codec::{decode_response, encode},
    config::SimulatorConfig,
    hal::{MockClock, RecordingSink, Simulator},
    traits::Transport,
    Channel, CodecError, Command, DelayMs, Delayed, DualChannel, Event, HeartbeatReading, Mode,
    Response,
};

const WAIT: Duration = Duration::from_millis(10);

fn open_sim(config: SimulatorConfig) -> (Simulator, MockClock, RecordingSink) {
    let clock = MockClock::new();
    let sink = RecordingSink::new();
    let mut sim = Simulator::new(config.with_seed(5))
        .with_clock(clock.clone())
        .with_sink(sink.clone());
    sim.open("SIM0").unwrap();
    (sim, clock, sink)
}

fn exchange(sim: &mut Simulator, frame: &[u8]) -> Vec<u8> {
    sim.write_frame(frame).unwrap();
    sim.read_frame(WAIT).unwrap().to_vec()
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn factory_status_frame() {
    let (mut sim, _, _) = open_sim(SimulatorConfig::default());
    assert_eq!(exchange(&mut sim, b"R\n"), b"A01111001B10111001\n");
}

#[test]
fn crlf_terminated_request_is_accepted() {
    let (mut sim, _, _) = open_sim(SimulatorConfig::default());
    assert_eq!(exchange(&mut sim, b"P0\r\n"), b"OK\n");
    assert_eq!(exchange(&mut sim, b"R\r\n"), b"A01111000B10111000\n");
}

#[test]
fn heartbeat_frame_is_zero_padded() {
    let (mut sim, _, _) = open_sim(
        SimulatorConfig::default()
            .with_heartbeat_range(7, 7)
            .with_indicator_jitter(false),
    );
    let frame = exchange(&mut sim, b"H\n");
    assert_eq!(frame, b"A00007B00007\n");
    assert_eq!(
        decode_response(&frame),
        Response::Heartbeat(HeartbeatReading::new(7, 7).unwrap())
    );
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn mode_frames_set_mode_bits() {
    let (mut sim, _, _) = open_sim(SimulatorConfig::default());
    for mode in Mode::ALL {
        let frame = encode(&Command::mode(mode));
        assert_eq!(exchange(&mut sim, &frame), b"OK\n");
        assert_eq!(Mode::from_pins(&sim.pins()), Some(mode));
    }
    assert_eq!(exchange(&mut sim, b"M1001\n"), b"OK\n");
    assert_eq!(Mode::from_pins(&sim.pins()), Some(Mode::Manual));
}

#[test]
fn delayed_estop_frame() {
    let (mut sim, clock, _) = open_sim(SimulatorConfig::default());
    let command = Command::SetEStop {
        state: DualChannel::CLEAR,
        delayed: Some(Delayed::new(Channel::A, DelayMs::new(250).unwrap())),
    };
    let frame = encode(&command);
    assert_eq!(frame.as_slice(), b"E00A00250\n");

    assert_eq!(exchange(&mut sim, &frame), b"OK\n");
    assert_eq!(sim.pins().estop, DualChannel::new(false, true));

    clock.advance(250);
    let status = exchange(&mut sim, b"R\n");
    assert_eq!(status, b"A01010001B10010001\n");
}

#[test]
fn interlock_frame_with_zero_delay_applies_at_once() {
    let (mut sim, _, _) = open_sim(SimulatorConfig::default());
    assert_eq!(exchange(&mut sim, b"I00B00000\n"), b"OK\n");
    assert_eq!(sim.pins().interlock, DualChannel::CLEAR);
}

#[test]
fn echo_frame_is_acknowledged() {
    let (mut sim, _, _) = open_sim(SimulatorConfig::default());
    assert_eq!(exchange(&mut sim, b"SBench 2: ready\n"), b"OK\n");
    assert_eq!(sim.echo_text().unwrap().as_str(), "Bench 2: ready");
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn malformed_frames_get_no_response() {
    let (mut sim, _, sink) = open_sim(SimulatorConfig::default());
    let before = sim.pins();

    for frame in [&b"X\n"[..], b"M10\n", b"E1\n", b"P2\n", b"E11C00100\n", b"\n"] {
        sim.write_frame(frame).unwrap();
        assert!(sim.read_frame(WAIT).is_err(), "{:?} was answered", frame);
    }
    assert_eq!(sim.pins(), before);

    let errors: Vec<CodecError> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::UnrecognizedFrame { error, .. } => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 6);
    assert_eq!(errors[0], CodecError::UnknownCommand('X'));
    assert_eq!(errors[5], CodecError::Empty);
}

#[test]
fn closed_simulator_drops_unread_responses() {
    let (mut sim, _, _) = open_sim(SimulatorConfig::default());
    sim.write_frame(b"R\n").unwrap();
    assert_eq!(sim.queued_responses(), 1);

    sim.close();
    sim.open("SIM0").unwrap();
    assert_eq!(sim.queued_responses(), 0);
    assert!(sim.read_frame(WAIT).is_err());
}
