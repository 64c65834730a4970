// ── Single-shot alarms ──
//
// One pending alarm per `TimerKind`. Re-arming replaces the pending one.
// Each arm takes a fresh generation number; a firing only counts when its
// generation is still current, so a firing that raced a cancel is
// dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::command::Notification;
use crate::scheduler::TimerKind;

pub trait AlarmService: Send {
    fn arm(&mut self, kind: TimerKind, delay: Duration);
    fn cancel(&mut self, kind: TimerKind);
    /// Consume a firing. False when it belongs to a cancelled or replaced
    /// alarm.
    fn accept(&mut self, kind: TimerKind, generation: u64) -> bool;
}

struct Pending {
    generation: u64,
    cancel: CancellationToken,
}

/// Alarms backed by `tokio::time::sleep`. A firing comes back to the
/// worker as `Notification::TimerFired`.
pub struct TokioAlarms {
    tx: mpsc::Sender<Notification>,
    pending: HashMap<TimerKind, Pending>,
    generation: u64,
}

impl TokioAlarms {
    pub(crate) fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self {
            tx,
            pending: HashMap::new(),
            generation: 0,
        }
    }
}

impl AlarmService for TokioAlarms {
    fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel(kind);
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(Notification::TimerFired { kind, generation }).await;
                }
            }
        });
        trace!(%kind, generation, ?delay, "alarm armed");
        self.pending.insert(kind, Pending { generation, cancel });
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(pending) = self.pending.remove(&kind) {
            pending.cancel.cancel();
            trace!(%kind, generation = pending.generation, "alarm cancelled");
        }
    }

    fn accept(&mut self, kind: TimerKind, generation: u64) -> bool {
        match self.pending.get(&kind) {
            Some(p) if p.generation == generation => {
                self.pending.remove(&kind);
                true
            }
            _ => {
                debug!(%kind, generation, "stale alarm ignored");
                false
            }
        }
    }
}

impl Drop for TokioAlarms {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.cancel.cancel();
        }
    }
}

/// Alarms that never fire on their own. Tests and offline drivers fire
/// them by hand with [`fire`](Self::fire). Clones share the same
/// pending set.
#[derive(Debug, Default, Clone)]
pub struct ManualAlarms {
    inner: Arc<Mutex<ManualInner>>,
}

#[derive(Debug, Default)]
struct ManualInner {
    pending: HashMap<TimerKind, (u64, Duration)>,
    generation: u64,
}

impl ManualAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.lock().pending.contains_key(&kind)
    }

    pub fn delay(&self, kind: TimerKind) -> Option<Duration> {
        self.lock().pending.get(&kind).map(|(_, d)| *d)
    }

    /// The notification the alarm would send, if `kind` is armed.
    pub fn fire(&self, kind: TimerKind) -> Option<Notification> {
        self.lock()
            .pending
            .get(&kind)
            .map(|(generation, _)| Notification::TimerFired {
                kind,
                generation: *generation,
            })
    }
}

impl AlarmService for ManualAlarms {
    fn arm(&mut self, kind: TimerKind, delay: Duration) {
        let mut inner = self.lock();
        inner.generation += 1;
        let generation = inner.generation;
        inner.pending.insert(kind, (generation, delay));
    }

    fn cancel(&mut self, kind: TimerKind) {
        self.lock().pending.remove(&kind);
    }

    fn accept(&mut self, kind: TimerKind, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.pending.get(&kind).is_some_and(|(g, _)| *g == generation) {
            inner.pending.remove(&kind);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rearm_discards_previous_firing() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut alarms = TokioAlarms::new(tx);
        alarms.arm(TimerKind::Watchdog, Duration::from_secs(10));
        alarms.arm(TimerKind::Watchdog, Duration::from_secs(20));

        let Some(Notification::TimerFired { kind, generation }) = rx.recv().await else {
            panic!("expected a timer firing");
        };
        assert_eq!(kind, TimerKind::Watchdog);
        assert!(alarms.accept(kind, generation));
        assert!(!alarms.accept(kind, generation));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_alarm_never_fires() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut alarms = TokioAlarms::new(tx);
        alarms.arm(TimerKind::PeriodicScan, Duration::from_secs(1));
        alarms.cancel(TimerKind::PeriodicScan);
        alarms.arm(TimerKind::Watchdog, Duration::from_secs(5));

        let Some(Notification::TimerFired { kind, .. }) = rx.recv().await else {
            panic!("expected a timer firing");
        };
        assert_eq!(kind, TimerKind::Watchdog);
    }

    #[test]
    fn manual_alarms_track_generation() {
        let mut alarms = ManualAlarms::new();
        alarms.arm(TimerKind::RestartSingleScan, Duration::from_secs(2));
        let stale = alarms.fire(TimerKind::RestartSingleScan).unwrap();
        alarms.arm(TimerKind::RestartSingleScan, Duration::from_secs(2));
        let Notification::TimerFired { generation, .. } = stale else {
            panic!("expected a timer firing");
        };
        assert!(!alarms.accept(TimerKind::RestartSingleScan, generation));
        assert!(alarms.accept(TimerKind::RestartSingleScan, generation + 1));
    }
}
