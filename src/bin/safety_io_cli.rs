//! Command-line client for the safety I/O controller.
//!
//! Talks to a controller on a serial port, or to the in-process simulator
//! with `--simulate`. Each invocation connects, refreshes the pin state,
//! runs one operation and disconnects.
//!
//! # Usage
//!
//! ```sh
//! # Against the simulator
//! cargo run --features cli -- --simulate status
//! cargo run --features cli -- --simulate estop a-then-b --delay 250
//!
//! # Against hardware (first matching port unless --port is given)
//! cargo run --features cli,serial -- ports
//! cargo run --features cli,serial -- --port /dev/ttyACM0 mode manual
//!
//! # Follow status changes
//! cargo run --features cli -- --simulate watch --interval-ms 50 --count 10
//! ```
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` for frame traces.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use safety_io_tester::config::Config;
use safety_io_tester::hal::Simulator;
use safety_io_tester::services::{spawn_poller, SharedDriver};
use safety_io_tester::traits::Transport;
use safety_io_tester::{
    DelayMs, EchoText, Mode, ModeBit, PinBank, ProtocolDriver, RequestError, TriggerPattern,
};

/// Port name used for the simulator.
const SIM_PORT: &str = "SIM0";

/// Safety I/O controller test client.
#[derive(Parser, Debug)]
#[command(name = "safety-io-cli", version)]
struct Cli {
    /// Serial port (default: configured port, then first matching controller).
    #[arg(long, short)]
    port: Option<String>,
    /// Use the in-process simulator instead of a serial port.
    #[arg(long)]
    simulate: bool,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List serial ports that may host a controller.
    Ports,
    /// Read and print all pins.
    Status,
    /// Set the operating mode (automatic, stop, manual, mute).
    Mode { mode: Mode },
    /// Flip a single mode bit (A1, A2, B1, B2).
    ToggleBit { bit: ModeBit },
    /// Toggle E-Stop channels.
    Estop {
        /// a-and-b, a-then-b, b-then-a, a-only, b-only
        #[arg(default_value = "a-and-b")]
        pattern: TriggerPattern,
        /// Delay before the second channel, in ms (0..=99999).
        #[arg(long, default_value = "0", value_parser = parse_delay)]
        delay: DelayMs,
    },
    /// Toggle interlock channels.
    Interlock {
        /// a-and-b, a-then-b, b-then-a, a-only, b-only
        #[arg(default_value = "a-and-b")]
        pattern: TriggerPattern,
        /// Delay before the second channel, in ms (0..=99999).
        #[arg(long, default_value = "0", value_parser = parse_delay)]
        delay: DelayMs,
    },
    /// Switch power on, off, or toggle it.
    Power {
        #[arg(value_enum, default_value = "toggle")]
        state: PowerArg,
    },
    /// Measure heartbeat frequencies.
    Heartbeat,
    /// Show text on the controller display.
    Echo { text: String },
    /// Poll status and print every change.
    Watch {
        /// Poll interval in ms (default from config).
        #[arg(long)]
        interval_ms: Option<u32>,
        /// Exit after this many changes.
        #[arg(long)]
        count: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PowerArg {
    On,
    Off,
    Toggle,
}

fn parse_delay(s: &str) -> Result<DelayMs, RequestError> {
    DelayMs::from_text(s)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if let Cmd::Ports = cli.cmd {
        return list_ports(&config);
    }

    let (transport, port) = open_transport(&cli, &config)?;
    let mut driver = ProtocolDriver::new(transport, config.link.clone());
    if !driver.connect(&port) {
        bail!("could not connect to {}", port);
    }

    match cli.cmd {
        Cmd::Watch { interval_ms, count } => {
            let mut poll = config.poll.clone();
            if let Some(ms) = interval_ms {
                poll = poll.with_interval_ms(ms);
            }
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(watch(driver, poll, count))
        }
        cmd => {
            // Toggles act on the last status read
            let pins = driver
                .read_status()
                .context("controller did not answer the status request")?;
            run(&mut driver, cmd, pins)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Config::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn open_transport(cli: &Cli, config: &Config) -> Result<(Box<dyn Transport>, String)> {
    if cli.simulate {
        let mut sim = Simulator::new(config.simulator.clone());
        sim.start_timer().context("failed to start simulator timer")?;
        let port = cli.port.clone().unwrap_or_else(|| SIM_PORT.to_string());
        return Ok((Box::new(sim), port));
    }
    serial_transport(cli, config)
}

#[cfg(feature = "serial")]
fn serial_transport(cli: &Cli, config: &Config) -> Result<(Box<dyn Transport>, String)> {
    use safety_io_tester::hal::{pick_default_port, SerialTransport};

    let port = match cli.port.clone().or_else(|| config.link.port().map(str::to_string)) {
        Some(port) => port,
        None => pick_default_port(&config.device)?
            .context("no controller found; pass --port or --simulate")?,
    };
    Ok((Box::new(SerialTransport::new(config.link.clone())), port))
}

#[cfg(not(feature = "serial"))]
fn serial_transport(_cli: &Cli, _config: &Config) -> Result<(Box<dyn Transport>, String)> {
    bail!("built without the `serial` feature; use --simulate")
}

#[cfg(feature = "serial")]
fn list_ports(config: &Config) -> Result<()> {
    let candidates = safety_io_tester::hal::list_candidate_ports(&config.device)?;
    if candidates.is_empty() {
        println!("No {} ports found", config.device.name);
    }
    for c in candidates {
        match (c.vid, c.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}  {:04x}:{:04x}  {}",
                c.name,
                vid,
                pid,
                c.product.unwrap_or_default()
            ),
            _ => println!("{}", c.name),
        }
    }
    Ok(())
}

#[cfg(not(feature = "serial"))]
fn list_ports(_config: &Config) -> Result<()> {
    bail!("built without the `serial` feature")
}

fn run(driver: &mut ProtocolDriver<Box<dyn Transport>>, cmd: Cmd, pins: PinBank) -> Result<()> {
    let acked = match cmd {
        Cmd::Status => {
            print_pins(&pins);
            return Ok(());
        }
        Cmd::Heartbeat => {
            let (hz_a, hz_b) = driver
                .measure_heartbeat()
                .context("heartbeat measurement failed")?;
            println!("A: {} Hz  B: {} Hz", hz_a, hz_b);
            return Ok(());
        }
        Cmd::Mode { mode } => driver.set_mode(mode),
        Cmd::ToggleBit { bit } => driver.toggle_mode_bit(bit),
        Cmd::Estop { pattern, delay } => driver.set_estop(pattern, delay),
        Cmd::Interlock { pattern, delay } => driver.set_interlock(pattern, delay),
        Cmd::Power { state } => match state {
            PowerArg::On => driver.set_power(true),
            PowerArg::Off => driver.set_power(false),
            PowerArg::Toggle => driver.toggle_power(),
        },
        Cmd::Echo { text } => {
            let text = EchoText::new(&text)?;
            driver.set_echo_string(&text)
        }
        Cmd::Ports | Cmd::Watch { .. } => bail!("not a single-shot command"),
    };
    if !acked {
        bail!("controller did not acknowledge the command");
    }
    if let Some(pins) = driver.read_status() {
        print_pins(&pins);
    }
    Ok(())
}

async fn watch(
    driver: ProtocolDriver<Box<dyn Transport>>,
    poll: safety_io_tester::PollConfig,
    count: Option<u64>,
) -> Result<()> {
    let shared = Arc::new(SharedDriver::new(driver));
    let poller = spawn_poller(Arc::clone(&shared), poll);
    let mut updates = poller.subscribe();
    let mut seen = 0u64;

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        match snapshot.pins {
            Some(pins) if snapshot.connected => print_pins(&pins),
            _ => println!("disconnected"),
        }
        seen += 1;
        if count.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    poller.stop().await;
    Ok(())
}

fn print_pins(pins: &PinBank) {
    let mode = Mode::from_pins(pins).map_or("invalid", |m| m.as_str());
    println!("{}  mode: {}", pins, mode);
}
