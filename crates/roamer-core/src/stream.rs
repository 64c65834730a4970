// ── Saved network subscriptions ──
//
// Snapshot access plus change notification for the saved network list
// the worker publishes after every message that touched it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::NetworkConfig;

pub type NetworkSnapshot = Arc<Vec<Arc<NetworkConfig>>>;

/// A subscription to the saved network list.
pub struct NetworkStream {
    current: NetworkSnapshot,
    receiver: watch::Receiver<NetworkSnapshot>,
}

impl NetworkStream {
    pub(crate) fn new(receiver: watch::Receiver<NetworkSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &NetworkSnapshot {
        &self.current
    }

    pub fn latest(&self) -> NetworkSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published list. `None` once the worker is gone.
    pub async fn changed(&mut self) -> Option<NetworkSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> NetworkWatchStream {
        NetworkWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` of saved network snapshots, starting with the current one.
pub struct NetworkWatchStream {
    inner: WatchStream<NetworkSnapshot>,
}

impl Stream for NetworkWatchStream {
    type Item = NetworkSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
