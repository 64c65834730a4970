// Controller tests: the worker task, its channels and the tokio alarms,
// run on paused time.
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use roamer_core::{
    Action, BandPreference, Command, CommandResult, ConnectionEvent, Controller, CoreError,
    Drivers, EngineConfig, EngineEvent, ManualClock, NetworkId, NetworkRequest, Notification,
    ScanKind, ScanMode, SecurityType, SelectorConfig,
};
use tokio::sync::broadcast;

use common::{DriverCall, RecordingDriver, association, scan, store};

const T0: u64 = 1_700_000_000_000;

fn controller() -> (Controller, Arc<RecordingDriver>) {
    let driver = RecordingDriver::new();
    let drivers = Drivers {
        scan: driver.clone(),
        station: driver.clone(),
        scorer: None,
    };
    let controller = Controller::with_clock(
        EngineConfig::default(),
        store(),
        drivers,
        Arc::new(ManualClock::new(T0)),
    );
    (controller, driver)
}

async fn save_home(controller: &Controller) -> NetworkId {
    let request = NetworkRequest::new("Home", SecurityType::Psk).with_psk("correct horse");
    match controller
        .execute(Command::SaveNetwork(request))
        .await
        .unwrap()
    {
        CommandResult::Saved(id) => id,
        other => panic!("unexpected result: {other:?}"),
    }
}

fn drain(rx: &mut broadcast::Receiver<Arc<EngineEvent>>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push((*event).clone());
    }
    events
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn commands_fail_until_started_and_after_shutdown() {
    let (controller, _) = controller();
    let err = controller.execute(Command::ForceScan).await.unwrap_err();
    assert!(matches!(err, CoreError::WorkerStopped));

    controller.start().await.unwrap();
    assert!(controller.is_running());
    assert!(controller.start().await.is_err());

    controller.shutdown().await;
    assert!(!controller.is_running());
    let err = controller.execute(Command::ForceScan).await.unwrap_err();
    assert!(matches!(err, CoreError::WorkerStopped));
}

// ── Commands and observation ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn saved_networks_are_published() {
    let (controller, _) = controller();
    controller.start().await.unwrap();
    let mut networks = controller.networks();
    assert!(networks.current().is_empty());

    let id = save_home(&controller).await;

    let snapshot = networks.changed().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, id);
    assert!(snapshot[0].psk.is_some());
    assert_eq!(controller.networks_snapshot().len(), 1);

    controller.execute(Command::ForgetNetwork { id }).await.unwrap();
    assert!(networks.changed().await.unwrap().is_empty());
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn network_stream_yields_current_then_updates() {
    use futures_util::StreamExt;

    let (controller, _) = controller();
    tokio_test::assert_ok!(controller.start().await);
    let mut stream = controller.networks().into_stream();

    let first = stream.next().await.unwrap();
    assert!(first.is_empty());

    let id = save_home(&controller).await;
    let next = stream.next().await.unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].id, id);
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn notifications_apply_before_later_commands() {
    let (controller, driver) = controller();
    controller.start().await.unwrap();
    let id = save_home(&controller).await;
    let mut events = controller.events();

    controller
        .notify(Notification::Connection(ConnectionEvent::Connected {
            association: association(id, "aa:00:00:00:00:01", -80, 2437),
            gateway: None,
            uid: None,
        }))
        .await
        .unwrap();
    let results = vec![
        scan("Home", "aa:00:00:00:00:01", -80, 2437, T0),
        scan("Home", "aa:00:00:00:00:02", -50, 5180, T0),
    ];
    let result = controller
        .execute(Command::EvaluateScan {
            results,
            force: false,
        })
        .await
        .unwrap();

    let CommandResult::Decision(decision) = result else {
        panic!("expected a decision");
    };
    assert_eq!(decision.action, Action::Roam);
    assert_eq!(decision.source, ScanKind::Single);
    assert!(driver.calls().iter().any(|c| matches!(c, DriverCall::Roam(n, _) if *n == id)));

    let seen = drain(&mut events);
    assert!(seen.iter().any(|e| matches!(e, EngineEvent::Decision(d) if d.action == Action::Roam)));
    assert_eq!(controller.metrics().roams, 1);
    assert_eq!(controller.status().current_network, Some(id));
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn band_preference_persists_and_shows_in_status() {
    let (controller, _) = controller();
    controller.start().await.unwrap();
    let mut status = controller.status_updates();

    let result = controller
        .execute(Command::SetBandPreference(BandPreference::FiveGhz))
        .await
        .unwrap();
    assert!(matches!(result, CommandResult::Changed(true)));

    status.changed().await.unwrap();
    assert_eq!(status.borrow().band, BandPreference::FiveGhz);

    let again = controller
        .execute(Command::SetBandPreference(BandPreference::FiveGhz))
        .await
        .unwrap();
    assert!(matches!(again, CommandResult::Changed(false)));
    controller.shutdown().await;
}

// ── Timers ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn periodic_scans_follow_the_interval() {
    let (controller, driver) = controller();
    controller.start().await.unwrap();
    controller
        .notify(Notification::ScreenChanged { on: true })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(controller.status().scan_mode, ScanMode::Periodic);
    let scans = |d: &RecordingDriver| d.count(|c| matches!(c, DriverCall::StartScan(_)));
    assert_eq!(scans(&driver), 1);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(scans(&driver), 2);

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(scans(&driver), 4);
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn refused_scans_give_up_after_retries() {
    let (controller, driver) = controller();
    controller.start().await.unwrap();
    let mut events = controller.events();
    driver.refuse_scans(true);

    controller
        .notify(Notification::ScreenChanged { on: true })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;

    let seen = drain(&mut events);
    assert!(seen.contains(&EngineEvent::ScanGaveUp {
        kind: ScanKind::Periodic
    }));
    assert_eq!(controller.metrics().scan_failures, 6);
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn config_updates_reach_the_worker() {
    let (controller, _) = controller();
    controller.start().await.unwrap();

    let config = EngineConfig {
        selector: SelectorConfig {
            enable_selection_when_associated: false,
            ..SelectorConfig::default()
        },
        ..EngineConfig::default()
    };
    controller.update_config(config.clone()).await.unwrap();
    assert_eq!(*controller.config(), config);

    let id = save_home(&controller).await;
    controller
        .notify(Notification::Connection(ConnectionEvent::Connected {
            association: association(id, "aa:00:00:00:00:01", -84, 2437),
            gateway: None,
            uid: None,
        }))
        .await
        .unwrap();
    let result = controller
        .execute(Command::EvaluateScan {
            results: vec![scan("Home", "aa:00:00:00:00:02", -40, 5180, T0)],
            force: false,
        })
        .await
        .unwrap();
    let CommandResult::Decision(decision) = result else {
        panic!("expected a decision");
    };
    assert!(decision.selection.is_none());
    controller.shutdown().await;
}
