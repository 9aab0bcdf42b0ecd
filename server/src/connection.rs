//! Connection identity and shutdown tracking
//!
//! A [`ConnectionHandle`] is the cloneable identity of one accepted TCP
//! connection. The stream itself stays owned by its handler; the handle only
//! carries enough to identify the connection and to ask its handler to close
//! it. Two handles are equal only if they were cloned from the same original,
//! so a registry entry can be matched against the exact connection that
//! created it.

use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Server-assigned connection number, used for logging and tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: SocketAddr,
    close_tx: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Creates a handle and the signal its handler waits on.
    pub fn new(id: ConnectionId, peer: SocketAddr) -> (Self, CloseSignal) {
        let (close_tx, close_rx) = watch::channel(false);
        let handle = Self {
            id,
            peer,
            close_tx: Arc::new(close_tx),
        };
        (handle, CloseSignal(close_rx))
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Asks the owning handler to drop the connection. Idempotent.
    pub fn close(&self) {
        self.close_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.close_tx.borrow()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.close_tx, &other.close_tx)
    }
}

impl Eq for ConnectionHandle {}

/// Receiving side of [`ConnectionHandle::close`], held by the handler.
#[derive(Debug)]
pub struct CloseSignal(watch::Receiver<bool>);

impl CloseSignal {
    /// Resolves once the connection has been asked to close. Cancel safe.
    pub async fn closed(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Every live connection the listener has accepted, joined or not.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    next_id: AtomicU64,
    live: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns an id to a freshly accepted connection and starts tracking it.
    pub async fn register(&self, peer: SocketAddr) -> (ConnectionHandle, CloseSignal) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (handle, signal) = ConnectionHandle::new(id, peer);
        self.live.lock().await.insert(id, handle.clone());
        (handle, signal)
    }

    pub async fn release(&self, handle: &ConnectionHandle) {
        let mut live = self.live.lock().await;
        if live.get(&handle.id()).is_some_and(|tracked| tracked == handle) {
            live.remove(&handle.id());
        }
    }

    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.live.lock().await.values().cloned().collect()
    }

    /// Closes every tracked connection. Returns how many were signalled.
    pub async fn close_all(&self) -> usize {
        let handles = self.snapshot().await;
        for handle in &handles {
            debug!("Closing connection {} ({})", handle.id(), handle.peer());
            handle.close();
        }
        handles.len()
    }

    pub async fn len(&self) -> usize {
        self.live.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.live.lock().await.is_empty()
    }
}
