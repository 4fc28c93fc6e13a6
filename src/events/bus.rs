//! In-process event bus
//!
//! Fans session events out to bounded subscriber queues:
//! - Global subscribers receive every event
//! - Session subscribers receive events for one session ID
//! - Delivery never blocks; a full queue drops the event for that subscriber

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, trace};

use super::Event;
use crate::session::SessionId;

/// Capacity of each subscriber queue
pub const SUBSCRIBER_CAPACITY: usize = 100;

#[derive(Default)]
struct Subscribers {
    closed: bool,
    global: Vec<mpsc::Sender<Event>>,
    by_session: HashMap<SessionId, Vec<mpsc::Sender<Event>>>,
}

/// Publish/subscribe distribution point for session events
///
/// Cheap to clone; all clones share the same subscriber lists.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<Subscribers>>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one session, or to every session when `session_id` is `None`
    ///
    /// On a closed bus the returned subscription is already closed.
    pub fn subscribe(&self, session_id: Option<SessionId>) -> Subscription {
        let mut subs = self.inner.write();

        if subs.closed {
            return Subscription::closed();
        }

        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        match session_id {
            None => subs.global.push(tx),
            Some(id) => subs.by_session.entry(id).or_default().push(tx),
        }

        Subscription { rx }
    }

    /// Deliver an event to every global subscriber and every subscriber of its session
    pub fn publish(&self, event: Event) {
        let mut saw_disconnected = false;

        {
            let subs = self.inner.read();
            if subs.closed {
                return;
            }

            let session_subs = subs
                .by_session
                .get(&event.session_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for tx in subs.global.iter().chain(session_subs) {
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            "Subscriber queue full, dropping {} event for session {}",
                            event.kind(),
                            event.session_id.short()
                        );
                    }
                    Err(TrySendError::Closed(_)) => saw_disconnected = true,
                }
            }

            trace!(
                "Published {} event for session {}",
                event.kind(),
                event.session_id.short()
            );
        }

        if saw_disconnected {
            self.prune_disconnected();
        }
    }

    /// Close the bus and every subscriber queue. Idempotent.
    pub fn close(&self) {
        let mut subs = self.inner.write();
        if subs.closed {
            return;
        }

        subs.closed = true;
        // Dropping the senders ends every subscription once its backlog is drained
        subs.global.clear();
        subs.by_session.clear();

        debug!("Event bus closed");
    }

    /// Drop every subscriber of one session
    ///
    /// Their queues end once drained. Global subscribers are unaffected.
    pub fn remove_session(&self, session_id: &SessionId) {
        if self.inner.write().by_session.remove(session_id).is_some() {
            debug!("Removed subscribers of session {}", session_id.short());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Number of live subscriber queues
    pub fn subscriber_count(&self) -> usize {
        let subs = self.inner.read();
        subs.global.len() + subs.by_session.values().map(Vec::len).sum::<usize>()
    }

    /// Total events dropped because a subscriber queue was full
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Forget subscribers whose receiving side has been dropped
    fn prune_disconnected(&self) {
        let mut subs = self.inner.write();
        subs.global.retain(|tx| !tx.is_closed());
        subs.by_session.retain(|_, txs| {
            txs.retain(|tx| !tx.is_closed());
            !txs.is_empty()
        });
    }
}

/// Receiving side of a bus subscription
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    fn closed() -> Self {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        Self { rx }
    }

    /// Wait for the next event. `None` once the bus is closed and the backlog is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next event without waiting
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        self.rx.try_recv()
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_recv(cx)
    }
}
