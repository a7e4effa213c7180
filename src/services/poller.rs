//! Fixed-cadence status polling (requires `poller` feature).
//!
//! The poller runs on a tokio task, reads status through a [`SharedDriver`]
//! once per interval and publishes a [`PollSnapshot`] on a watch channel.
//! Subscribers only wake when the pins change (heartbeat indicator excluded)
//! or the connection state flips.
//!
//! Serial exchanges block, so each poll runs on the blocking pool.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use safety_io_tester::config::{LinkConfig, PollConfig, SimulatorConfig};
//! use safety_io_tester::hal::Simulator;
//! use safety_io_tester::services::{spawn_poller, SharedDriver};
//! use safety_io_tester::ProtocolDriver;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sim = Simulator::new(SimulatorConfig::default());
//! let shared = Arc::new(SharedDriver::new(ProtocolDriver::new(sim, LinkConfig::default())));
//! shared.with_driver(|d| d.connect("SIM0"));
//!
//! let poller = spawn_poller(Arc::clone(&shared), PollConfig::default().with_interval_ms(10));
//! let mut updates = poller.subscribe();
//! updates.changed().await.unwrap();
//! assert!(updates.borrow().pins.is_some());
//! poller.stop().await;
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::SharedDriver;
use crate::config::PollConfig;
use crate::pins::PinBank;
use crate::traits::Transport;

/// What the poller last saw.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PollSnapshot {
    /// Whether the driver was connected after the last poll.
    pub connected: bool,
    /// Pins from the most recent successful read.
    pub pins: Option<PinBank>,
    /// Polls completed so far.
    pub polls: u64,
}

impl PollSnapshot {
    /// Fold one poll result in, returning whether subscribers should wake.
    fn record(&mut self, pins: Option<PinBank>, connected: bool) -> bool {
        self.polls += 1;
        let pins_changed = match (self.pins, pins) {
            (Some(old), Some(new)) => new.differs_ignoring_heartbeat(&old),
            (None, Some(_)) => true,
            _ => false,
        };
        let connection_changed = self.connected != connected;
        if pins.is_some() {
            self.pins = pins;
        }
        self.connected = connected;
        pins_changed || connection_changed
    }
}

/// Handle to a running poller.
///
/// Dropping the handle detaches the task; it exits on its next tick once no
/// receivers remain.
pub struct PollerHandle {
    task: JoinHandle<()>,
    updates: watch::Receiver<PollSnapshot>,
    shutdown: Arc<Notify>,
}

impl PollerHandle {
    /// A new receiver for snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.updates.clone()
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> PollSnapshot {
        self.updates.borrow().clone()
    }

    /// Whether the polling task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the task to stop and wait for it.
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            log::error!("Poller task failed: {}", e);
        }
    }
}

/// Start polling `shared` every `config.interval()`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_poller<T>(shared: Arc<SharedDriver<T>>, config: PollConfig) -> PollerHandle
where
    T: Transport + 'static,
{
    let initial = PollSnapshot {
        connected: shared.snapshot().connected,
        ..PollSnapshot::default()
    };
    let (tx, updates) = watch::channel(initial);
    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(poll_loop(shared, config, tx, Arc::clone(&shutdown)));
    PollerHandle {
        task,
        updates,
        shutdown,
    }
}

async fn poll_loop<T>(
    shared: Arc<SharedDriver<T>>,
    config: PollConfig,
    tx: watch::Sender<PollSnapshot>,
    shutdown: Arc<Notify>,
) where
    T: Transport + 'static,
{
    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("Status poller started ({} ms)", config.interval_ms);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.notified() => break,
        }
        if tx.is_closed() {
            log::debug!("No poll subscribers left");
            break;
        }

        let driver = Arc::clone(&shared);
        let polled = tokio::task::spawn_blocking(move || {
            driver.with_driver(|d| (d.poll_status(), d.is_connected()))
        })
        .await;
        let (pins, connected) = match polled {
            Ok(result) => result,
            Err(e) => {
                log::error!("Status poll panicked: {}", e);
                break;
            }
        };

        tx.send_if_modified(|snapshot| snapshot.record(pins, connected));

        if !connected && config.stop_on_disconnect {
            log::info!("Controller disconnected, status poller stopping");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::DualChannel;

    fn bank() -> PinBank {
        PinBank::factory_default()
    }

    #[test]
    fn first_pins_wake_subscribers() {
        let mut snap = PollSnapshot {
            connected: true,
            ..Default::default()
        };
        assert!(snap.record(Some(bank()), true));
        assert_eq!(snap.polls, 1);
        assert!(!snap.record(Some(bank()), true));
        assert_eq!(snap.polls, 2);
    }

    #[test]
    fn heartbeat_flicker_is_quiet_but_recorded() {
        let mut snap = PollSnapshot::default();
        snap.record(Some(bank()), true);

        let mut flicker = bank();
        flicker.heartbeat = DualChannel::new(!flicker.heartbeat.a, flicker.heartbeat.b);
        assert!(!snap.record(Some(flicker), true));
        assert_eq!(snap.pins, Some(flicker));
    }

    #[test]
    fn failed_poll_keeps_last_pins() {
        let mut snap = PollSnapshot::default();
        snap.record(Some(bank()), true);
        assert!(snap.record(None, false));
        assert_eq!(snap.pins, Some(bank()));
        assert!(!snap.connected);
    }
}
