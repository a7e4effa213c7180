//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Test doubles for the clock, transport and event sink
//! - `simulator`: In-process controller behind the `Transport` trait
//! - `serial`: Real serial port and port discovery (requires `serial` feature)

pub mod mock;
pub mod simulator;

#[cfg(feature = "serial")]
pub mod serial;

pub use mock::*;
pub use simulator::Simulator;

#[cfg(feature = "serial")]
pub use serial::{list_candidate_ports, pick_default_port, PortCandidate, SerialTransport};
