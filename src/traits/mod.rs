//! Trait definitions for the seams between the driver and the outside world.
//!
//! These abstractions let the same driver run against a real serial port, the
//! in-process simulator, or a scripted test double, with time and diagnostics
//! injected rather than global.
//!
//! # Submodules
//!
//! - `transport`: Framed byte-stream link to the controller
//! - `clock`: Millisecond time source
//! - `events`: Diagnostic event sink
//!
//! # Implementations
//!
//! | Trait | Production | Testing |
//! |-------|------------|---------|
//! | [`Transport`] | `hal::serial::SerialTransport` | [`ScriptedTransport`], [`Simulator`] |
//! | [`Clock`] | [`SystemClock`] | [`MockClock`] |
//! | [`EventSink`] | [`LogSink`] | [`RecordingSink`] |
//!
//! [`ScriptedTransport`]: crate::hal::ScriptedTransport
//! [`Simulator`]: crate::hal::Simulator
//! [`MockClock`]: crate::hal::MockClock
//! [`RecordingSink`]: crate::hal::RecordingSink

pub mod clock;
pub mod events;
pub mod transport;

pub use clock::*;
pub use events::*;
pub use transport::*;
