//! Runtime binding of a live session
//!
//! A `SessionWrapper` lives in the manager's registry for as long as the
//! session is live. It is never persisted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{SessionHandle, SessionId, SessionInfo, SessionStatus};
use crate::error::SessionError;

/// The external handle plus the last status published for it
///
/// Both live behind one lock so that explicit operations and the watcher
/// publish `state` events for a session in observation order.
pub struct SessionSlot {
    pub handle: Box<dyn SessionHandle>,
    pub published_status: SessionStatus,
}

pub struct SessionWrapper {
    pub id: SessionId,
    pub title: String,
    /// Held across external handle calls; never taken by readers
    pub slot: Mutex<SessionSlot>,
    /// Last snapshot taken while holding the slot
    snapshot: RwLock<SessionInfo>,
    /// Per-session cancellation scope, child of the manager-wide scope
    pub cancel: CancellationToken,
    /// Set while a pause/resume/kill is in flight
    pending: AtomicBool,
    /// Set once a watcher task has been spawned
    watching: AtomicBool,
}

impl SessionWrapper {
    pub fn new(
        id: SessionId,
        title: impl Into<String>,
        handle: Box<dyn SessionHandle>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let published_status = handle.status();
        let snapshot = SessionInfo::from_data(id, handle.to_instance_data());
        Arc::new(Self {
            id,
            title: title.into(),
            slot: Mutex::new(SessionSlot {
                handle,
                published_status,
            }),
            snapshot: RwLock::new(snapshot),
            cancel,
            pending: AtomicBool::new(false),
            watching: AtomicBool::new(false),
        })
    }

    /// Mark an external operation as in flight until the guard drops
    pub fn begin_operation(&self) -> Result<OperationGuard<'_>, SessionError> {
        self.pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::OperationPending(self.id))?;
        Ok(OperationGuard(&self.pending))
    }

    /// Claim the right to spawn this session's watcher. True at most once.
    pub fn claim_watcher(&self) -> bool {
        !self.watching.swap(true, Ordering::AcqRel)
    }

    /// Snapshot of the session for callers
    ///
    /// Reads the cached copy, so a slow external call on this session
    /// never blocks `list` or `get`.
    pub fn info(&self) -> SessionInfo {
        self.snapshot.read().clone()
    }

    /// Re-read the handle state into the cached snapshot
    pub fn refresh(&self, slot: &SessionSlot) {
        let info = SessionInfo::from_data(self.id, slot.handle.to_instance_data());
        *self.snapshot.write() = info;
    }
}

/// Clears the pending-operation marker on drop
pub struct OperationGuard<'a>(&'a AtomicBool);

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
