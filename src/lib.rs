//! # safety-io-tester
//!
//! Host-side driver and protocol-accurate simulator for a dual-channel (A/B)
//! safety I/O controller attached over a serial link.
//!
//! ## Features
//!
//! - **Typed protocol**: Commands, responses and the dual-channel pin model
//! - **Fail-closed driver**: Any link or protocol fault disconnects
//! - **Staggered triggers**: Delayed second-channel transitions with supersession
//! - **Simulator**: In-process controller that speaks the same wire format
//! - **Polling**: Fixed-cadence status polling with change notification (`poller` feature)
//!
//! ## Architecture
//!
//! The crate is structured so everything can be exercised without hardware:
//!
//! - `pins` - Dual-channel pin model
//! - `commands` - Command, response and parameter types
//! - `codec` - Newline-terminated ASCII wire format
//! - `scheduler` - Pending delayed transitions
//! - `controller` - Controller-side state machine
//! - `driver` - Host-side request/response driver
//! - `traits` - Transport, clock and event-sink abstractions
//! - `hal` - Concrete implementations (simulator, serial port, test doubles)
//! - `services` - Shared driver and status poller
//!
//! ## Example
//!
//! ```rust
//! use safety_io_tester::{
//!     config::{LinkConfig, SimulatorConfig},
//!     hal::Simulator,
//!     DelayMs, DualChannel, Mode, ProtocolDriver, TriggerPattern,
//! };
//!
//! // Driver talking to an in-process simulator
//! let sim = Simulator::new(SimulatorConfig::default().with_seed(1));
//! let mut driver = ProtocolDriver::new(sim.clone(), LinkConfig::default());
//! assert!(driver.connect("SIM0"));
//!
//! // Switch mode and read it back
//! assert!(driver.set_mode(Mode::Manual));
//! let pins = driver.read_status().unwrap();
//! assert_eq!(Mode::from_pins(&pins), Some(Mode::Manual));
//!
//! // Toggle both E-Stop channels at once (they power up set)
//! assert!(driver.set_estop(TriggerPattern::AAndB, DelayMs::ZERO));
//! assert_eq!(sim.pins().estop, DualChannel::CLEAR);
//! assert_eq!(sim.pins().stop, DualChannel::CLEAR);
//! ```

#![warn(missing_docs)]

/// Command, response and parameter types.
pub mod commands;
/// Wire codec for command and response frames.
pub mod codec;
/// Controller-side state machine used by the simulator.
pub mod controller;
/// Host-side protocol driver with fail-closed connection handling.
pub mod driver;
/// Error types for every layer.
pub mod error;
/// Hardware abstraction layer: simulator, serial port and test doubles.
pub mod hal;
/// Dual-channel pin model.
pub mod pins;
/// Delayed transition bookkeeping.
pub mod scheduler;
/// Core traits for transports, clocks and event sinks.
pub mod traits;

/// Shared configuration for the driver, poller, simulator and port discovery.
pub mod config;

/// Shared driver access and status polling.
pub mod services;

// Re-exports for convenience
pub use commands::{
    Command, DelayMs, Delayed, EchoText, HeartbeatReading, Mode, ModeBit, Response,
    TriggerPattern, MAX_ECHO_LEN,
};
pub use driver::ProtocolDriver;
pub use error::{CodecError, DriverError, DriverResult, RequestError, TransportError};
pub use pins::{Channel, DualChannel, PinBank, Signal};
pub use traits::{Clock, Event, EventSink, Transport};

// Config re-exports
pub use config::{Config, DeviceConfig, LinkConfig, PollConfig, SimulatorConfig};
