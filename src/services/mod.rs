//! Services layered on top of the protocol driver.
//!
//! - [`SharedDriver`]: one driver behind a mutex, shared by every front end
//! - `poller` feature: tokio task that polls status on a fixed cadence
//!
//! # Shared Driver Pattern
//!
//! The controller answers one request at a time, so everything that talks to
//! it goes through a single `Arc<SharedDriver<T>>`:
//!
//! ```ignore
//! use std::sync::Arc;
//! use safety_io_tester::services::{spawn_poller, SharedDriver};
//!
//! let shared = Arc::new(SharedDriver::new(driver));
//! let poller = spawn_poller(Arc::clone(&shared), config.poll.clone());
//!
//! // Operator commands share the link with the poller
//! shared.with_driver(|d| d.set_mode(Mode::Manual));
//! ```

pub mod shared;

#[cfg(feature = "poller")]
pub mod poller;

pub use shared::*;

#[cfg(feature = "poller")]
pub use poller::*;
