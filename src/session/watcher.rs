//! Per-session watcher task
//!
//! Polls a session's external handle on a fixed interval and turns what it
//! sees into events: terminal content changes, diff changes and status
//! drift. Also answers confirmation prompts for auto-yes sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use super::{DiffStats, SessionId, SessionWrapper};
use super::wrapper::SessionSlot;
use crate::events::{Event, EventBus};

/// Spawn the watcher for a session unless it already has one
pub(crate) fn spawn_watcher(
    tracker: &TaskTracker,
    wrapper: Arc<SessionWrapper>,
    events: EventBus,
    period: Duration,
) {
    if !wrapper.claim_watcher() {
        return;
    }

    debug!(
        "Spawning watcher for session {} every {:?}",
        wrapper.id.short(),
        period
    );
    tracker.spawn(watch(wrapper, events, period));
}

async fn watch(wrapper: Arc<SessionWrapper>, events: EventBus, period: Duration) {
    // First tick fires one period after spawn, not immediately
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cache = WatchCache::default();

    loop {
        tokio::select! {
            _ = wrapper.cancel.cancelled() => break,
            _ = ticker.tick() => cache.tick(&wrapper, &events).await,
        }
    }

    debug!("Watcher for session {} stopped", wrapper.id.short());
}

/// Last observed values, local to one watcher task
#[derive(Debug, Default)]
struct WatchCache {
    stdout_hash: Option<u64>,
    diff: Option<DiffStats>,
}

impl WatchCache {
    async fn tick(&mut self, wrapper: &SessionWrapper, events: &EventBus) {
        let mut slot = wrapper.slot.lock().await;

        // Kill may have won the race for the slot
        if wrapper.cancel.is_cancelled() {
            return;
        }

        self.poll(wrapper.id, &mut slot, events).await;
        wrapper.refresh(&slot);
    }

    async fn poll(&mut self, id: SessionId, slot: &mut SessionSlot, events: &EventBus) {
        let status = slot.handle.status();
        if status != slot.published_status {
            events.publish(Event::state(id, slot.published_status, status));
            slot.published_status = status;
        }

        if !status.has_resources() {
            return;
        }

        match slot.handle.preview().await {
            Ok(content) => {
                let hash = xxh3_64(content.as_bytes());
                if self.stdout_hash != Some(hash) {
                    self.stdout_hash = Some(hash);
                    events.publish(Event::stdout(id, content));
                }
            }
            Err(e) => debug!("Preview failed for session {}: {:#}", id.short(), e),
        }

        match slot.handle.update_diff_stats().await {
            Ok(()) => {
                let stats = slot.handle.diff_stats();
                if stats != self.diff {
                    self.diff = stats.clone();
                    events.publish(Event::diff(id, stats));
                }
            }
            Err(e) => debug!("Diff update failed for session {}: {:#}", id.short(), e),
        }

        if slot.handle.auto_yes() && slot.handle.prompt_state().await.needs_confirmation() {
            trace!("Confirming prompt for session {}", id.short());
            if let Err(e) = slot.handle.tap_enter().await {
                debug!("Auto-confirm failed for session {}: {:#}", id.short(), e);
            }
        }
    }
}
