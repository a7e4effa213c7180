//! Status poller tests (requires `poller` feature)

#![cfg(feature = "poller")]

use std::sync::Arc;
use std::time::Duration;

use safety_io_tester::{
    config::{LinkConfig, PollConfig, SimulatorConfig},
    hal::{RecordingSink, Simulator},
    services::{spawn_poller, PollerHandle, SharedDriver},
    DualChannel, PinBank, ProtocolDriver,
};

const LIMIT: Duration = Duration::from_secs(2);

fn shared_sim() -> Arc<SharedDriver<Simulator>> {
    let sim = Simulator::new(SimulatorConfig::default().with_seed(3))
        .with_sink(RecordingSink::new());
    let driver =
        ProtocolDriver::new(sim, LinkConfig::default()).with_sink(RecordingSink::new());
    let shared = Arc::new(SharedDriver::new(driver));
    assert!(shared.with_driver(|d| d.connect("SIM0")));
    shared
}

fn fast() -> PollConfig {
    PollConfig::default().with_interval_ms(5)
}

async fn wait_finished(poller: &PollerHandle) {
    tokio::time::timeout(LIMIT, async {
        while !poller.is_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("poller did not stop");
}

#[tokio::test]
async fn first_poll_publishes_pins() {
    let shared = shared_sim();
    let poller = spawn_poller(Arc::clone(&shared), fast());
    let mut updates = poller.subscribe();

    tokio::time::timeout(LIMIT, updates.changed())
        .await
        .expect("no update")
        .unwrap();
    let snapshot = updates.borrow_and_update().clone();
    assert!(snapshot.connected);
    assert_eq!(snapshot.pins, Some(PinBank::factory_default()));
    assert!(snapshot.polls >= 1);

    poller.stop().await;
}

#[tokio::test]
async fn pin_change_wakes_subscriber() {
    let shared = shared_sim();
    let poller = spawn_poller(Arc::clone(&shared), fast());
    let mut updates = poller.subscribe();
    tokio::time::timeout(LIMIT, updates.changed())
        .await
        .expect("no update")
        .unwrap();
    updates.borrow_and_update();

    assert!(shared.with_driver(|d| d.set_power(false)));

    tokio::time::timeout(LIMIT, updates.changed())
        .await
        .expect("no update after power change")
        .unwrap();
    let pins = updates.borrow_and_update().pins.unwrap();
    assert_eq!(pins.power, DualChannel::CLEAR);

    poller.stop().await;
}

#[tokio::test]
async fn stops_after_disconnect() {
    let shared = shared_sim();
    let poller = spawn_poller(Arc::clone(&shared), fast());

    shared.with_driver(|d| d.disconnect());
    wait_finished(&poller).await;
    assert!(!poller.latest().connected);
}

#[tokio::test]
async fn keeps_polling_when_configured() {
    let shared = shared_sim();
    let poller = spawn_poller(Arc::clone(&shared), fast().with_stop_on_disconnect(false));

    shared.with_driver(|d| d.disconnect());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!poller.is_finished());

    // Reconnecting resumes publishing
    assert!(shared.with_driver(|d| d.connect("SIM0")));
    let mut updates = poller.subscribe();
    tokio::time::timeout(LIMIT, async {
        loop {
            if updates.borrow_and_update().connected {
                break;
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .expect("reconnect not published");
    assert!(poller.latest().connected);

    poller.stop().await;
}

#[tokio::test]
async fn stop_ends_task() {
    let shared = shared_sim();
    let poller = spawn_poller(shared, fast());
    tokio::time::timeout(LIMIT, poller.stop())
        .await
        .expect("stop hung");
}
