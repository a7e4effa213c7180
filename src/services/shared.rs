//! Shared, thread-safe access to one protocol driver.
//!
//! `SharedDriver` lets a polling task and an operator-facing front end use the
//! same [`ProtocolDriver`] without racing on the serial link: every exchange
//! happens under one mutex, so requests are never pipelined.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use safety_io_tester::config::{LinkConfig, SimulatorConfig};
//! use safety_io_tester::hal::Simulator;
//! use safety_io_tester::services::SharedDriver;
//! use safety_io_tester::{Mode, ProtocolDriver};
//!
//! let sim = Simulator::new(SimulatorConfig::default().with_seed(9));
//! let shared = Arc::new(SharedDriver::new(ProtocolDriver::new(sim, LinkConfig::default())));
//!
//! shared.with_driver(|d| d.connect("SIM0"));
//! shared.with_driver(|d| d.set_mode(Mode::Mute));
//! shared.with_driver(|d| d.poll_status());
//!
//! // Change detection for publishing
//! let changed = shared.check_changes().unwrap();
//! assert_eq!(Mode::from_pins(&changed), Some(Mode::Mute));
//! assert!(shared.check_changes().is_none());
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::commands::Mode;
use crate::driver::ProtocolDriver;
use crate::pins::PinBank;
use crate::traits::Transport;

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of the driver for status displays.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DriverSnapshot {
    /// Whether the link is open.
    pub connected: bool,
    /// Connected port.
    pub port: Option<String>,
    /// Pins from the last successful status read.
    pub pins: PinBank,
    /// Mode encoded by those pins.
    pub mode: Option<Mode>,
}

// ============================================================================
// Shared Driver
// ============================================================================

/// A [`ProtocolDriver`] behind a mutex, with change detection for publishers.
pub struct SharedDriver<T: Transport> {
    driver: Mutex<ProtocolDriver<T>>,
    /// Last pins handed out by `check_changes` (separate lock for less contention)
    last_published: Mutex<Option<PinBank>>,
}

impl<T: Transport> SharedDriver<T> {
    /// Wrap a driver.
    pub fn new(driver: ProtocolDriver<T>) -> Self {
        Self {
            driver: Mutex::new(driver),
            last_published: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProtocolDriver<T>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the driver.
    ///
    /// The closure form keeps the lock from being held across await points.
    pub fn with_driver<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut ProtocolDriver<T>) -> R,
    {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Current driver view.
    pub fn snapshot(&self) -> DriverSnapshot {
        let driver = self.lock();
        DriverSnapshot {
            connected: driver.is_connected(),
            port: driver.port().map(str::to_string),
            pins: driver.last_known(),
            mode: driver.current_mode(),
        }
    }

    /// Pins changed since the last call (heartbeat indicator excluded).
    ///
    /// The first call after a status read always reports.
    pub fn check_changes(&self) -> Option<PinBank> {
        let pins = self.lock().last_known();
        let mut last = self
            .last_published
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let changed = match *last {
            Some(previous) => pins.differs_ignoring_heartbeat(&previous),
            None => true,
        };
        if changed {
            *last = Some(pins);
            Some(pins)
        } else {
            None
        }
    }

    /// Take the current pins as the change-detection baseline without reporting.
    pub fn sync_change_detection(&self) {
        let pins = self.lock().last_known();
        *self
            .last_published
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(pins);
    }
}
