// ── Controller ──
//
// Cheaply cloneable handle around the single-writer engine. The engine
// lives inside one worker task; everything else reaches it through the
// command and notification channels and observes it through watch and
// broadcast channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::alarm::TokioAlarms;
use crate::autojoin::EngineMetrics;
use crate::clock::{Clock, SystemClock};
use crate::command::{Command, CommandEnvelope, CommandResult, EngineEvent, Notification};
use crate::config::EngineConfig;
use crate::engine::{Drivers, Engine, EngineStatus};
use crate::error::CoreError;
use crate::model::{SYSTEM_UID, Uid};
use crate::store::ConfigStore;
use crate::stream::{NetworkSnapshot, NetworkStream};

const COMMAND_CHANNEL_SIZE: usize = 64;
const NOTIFICATION_CHANNEL_SIZE: usize = 256;
const EVENT_CHANNEL_SIZE: usize = 256;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Create it with the
/// loaded store and the drivers, call [`start()`](Self::start), then
/// drive it with commands and notifications.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: Arc<ArcSwap<EngineConfig>>,
    networks: watch::Sender<NetworkSnapshot>,
    status: watch::Sender<EngineStatus>,
    metrics: watch::Sender<EngineMetrics>,
    event_tx: broadcast::Sender<Arc<EngineEvent>>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    notify_tx: mpsc::Sender<Notification>,
    worker: Mutex<Option<Worker>>,
    running: AtomicBool,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Everything the worker task takes ownership of at start.
struct Worker {
    engine: Engine,
    command_rx: mpsc::Receiver<CommandEnvelope>,
    notify_rx: mpsc::Receiver<Notification>,
}

impl Controller {
    /// Create a controller on the system clock. Does NOT start the
    /// worker; call [`start()`](Self::start).
    pub fn new(config: EngineConfig, store: ConfigStore, drivers: Drivers) -> Self {
        Self::with_clock(config, store, drivers, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: EngineConfig,
        store: ConfigStore,
        drivers: Drivers,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_CHANNEL_SIZE);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        let alarms = TokioAlarms::new(notify_tx.clone());
        let engine = Engine::new(config, store, drivers, clock, Box::new(alarms));

        let (networks, _) = watch::channel(Arc::new(engine.network_snapshot()));
        let (status, _) = watch::channel(engine.status());
        let (metrics, _) = watch::channel(engine.metrics());

        Self {
            inner: Arc::new(ControllerInner {
                config: engine.shared_config(),
                networks,
                status,
                metrics,
                event_tx,
                command_tx,
                notify_tx,
                worker: Mutex::new(Some(Worker {
                    engine,
                    command_rx,
                    notify_rx,
                })),
                running: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the worker task. Fails if it was already started.
    pub async fn start(&self) -> Result<(), CoreError> {
        let Some(mut worker) = self.inner.worker.lock().await.take() else {
            return Err(CoreError::Internal("controller already started".into()));
        };
        worker.engine.start();
        publish(&self.inner, &mut worker.engine);

        let inner = Arc::clone(&self.inner);
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(worker_task(inner, worker)));
        self.inner.running.store(true, Ordering::SeqCst);
        info!("selection worker started");
        Ok(())
    }

    /// Cancel the worker and wait for it to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        self.inner.running.store(false, Ordering::SeqCst);
        debug!("controller shut down");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    // ── Command execution ────────────────────────────────────────────

    /// Execute a command as the system user.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        self.execute_as(SYSTEM_UID, command).await
    }

    /// Execute a command on behalf of `uid`, which permission checks use.
    pub async fn execute_as(&self, uid: Uid, command: Command) -> Result<CommandResult, CoreError> {
        if !self.is_running() {
            return Err(CoreError::WorkerStopped);
        }
        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                uid,
                command,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::WorkerStopped)?;
        rx.await.map_err(|_| CoreError::WorkerStopped)?
    }

    /// Hand a driver or platform event to the worker.
    pub async fn notify(&self, notification: Notification) -> Result<(), CoreError> {
        if !self.is_running() {
            return Err(CoreError::WorkerStopped);
        }
        self.inner
            .notify_tx
            .send(notification)
            .await
            .map_err(|_| CoreError::WorkerStopped)
    }

    // ── Configuration ────────────────────────────────────────────────

    pub fn config(&self) -> Arc<EngineConfig> {
        self.inner.config.load_full()
    }

    /// Replace the engine configuration. Takes effect from the next
    /// message the worker handles.
    pub async fn update_config(&self, config: EngineConfig) -> Result<(), CoreError> {
        self.inner.config.store(Arc::new(config));
        self.notify(Notification::ConfigUpdated).await
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn networks(&self) -> NetworkStream {
        NetworkStream::new(self.inner.networks.subscribe())
    }

    pub fn networks_snapshot(&self) -> NetworkSnapshot {
        self.inner.networks.borrow().clone()
    }

    pub fn events(&self) -> broadcast::Receiver<Arc<EngineEvent>> {
        self.inner.event_tx.subscribe()
    }

    pub fn status(&self) -> EngineStatus {
        self.inner.status.borrow().clone()
    }

    pub fn status_updates(&self) -> watch::Receiver<EngineStatus> {
        self.inner.status.subscribe()
    }

    pub fn metrics(&self) -> EngineMetrics {
        *self.inner.metrics.borrow()
    }
}

// ── Worker ───────────────────────────────────────────────────────────

/// Run-to-completion message loop. Notifications are drained before
/// commands so a caller that notifies and then executes sees its
/// notification applied first.
async fn worker_task(inner: Arc<ControllerInner>, mut worker: Worker) {
    let cancel = inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(notification) = worker.notify_rx.recv() => {
                worker.engine.handle_notification(notification);
                publish(&inner, &mut worker.engine);
            }
            Some(envelope) = worker.command_rx.recv() => {
                let result = worker.engine.handle_command(envelope.uid, envelope.command);
                publish(&inner, &mut worker.engine);
                let _ = envelope.response_tx.send(result);
            }
            else => break,
        }
    }
    debug!("selection worker stopped");
}

/// Push the engine's pending events and current views to subscribers.
fn publish(inner: &ControllerInner, engine: &mut Engine) {
    let events = engine.take_events();
    if events.iter().any(|e| matches!(e, EngineEvent::NetworksChanged)) {
        inner
            .networks
            .send_replace(Arc::new(engine.network_snapshot()));
    }
    for event in events {
        let _ = inner.event_tx.send(Arc::new(event));
    }

    let status = engine.status();
    inner.status.send_if_modified(|current| {
        if *current == status {
            false
        } else {
            *current = status;
            true
        }
    });
    let metrics = engine.metrics();
    inner.metrics.send_if_modified(|current| {
        if *current == metrics {
            false
        } else {
            *current = metrics;
            true
        }
    });
}
