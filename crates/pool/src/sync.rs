//! Background reconciliation of a location
//!
//! Each pass merges the backend index, applies changes queued by other
//! locations and saves the index when anything changed.

use cairn_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::change::{ChangeKind, PendingChange};
use crate::index::LocationIndex;

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Location was unavailable and nothing was attempted
    pub skipped: bool,
    /// Items whose data was copied from their source
    pub copied: usize,
    /// Items whose metadata alone was refreshed
    pub refreshed: usize,
    /// Local copies removed by replicated deletes
    pub deleted: usize,
    /// Changes ignored because the local copy is newer or the source is gone
    pub ignored: usize,
    /// Changes put back because their source is unavailable
    pub deferred: usize,
    /// Changes that failed to apply
    pub failed: usize,
    /// Index was written
    pub saved: bool,
}

impl SyncReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    fn applied(&self) -> usize {
        self.copied + self.refreshed + self.deleted
    }
}

enum Outcome {
    Copied,
    Refreshed,
    Deleted,
    Ignored,
    Deferred(PendingChange),
}

/// Start the periodic sync task of a location
pub(crate) fn spawn_sync_task(
    runtime: &Handle,
    index: Arc<LocationIndex>,
    period: Duration,
) -> JoinHandle<()> {
    let span = cairn_utils::tracing::sync_span(index.name());
    runtime.spawn(
        async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let task_index = Arc::clone(&index);
                match tokio::task::spawn_blocking(move || reconcile(&task_index)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(location = %index.name(), error = %e, "Sync pass failed"),
                    Err(e) => warn!(location = %index.name(), error = %e, "Sync pass aborted"),
                }
            }
        }
        .instrument(span),
    )
}

/// Run one reconciliation pass
pub fn reconcile(index: &LocationIndex) -> Result<SyncReport> {
    if !index.is_available() {
        debug!(location = %index.name(), "Skipping sync of unavailable location");
        return Ok(SyncReport::skipped());
    }

    index.load_index(false)?;

    let mut report = SyncReport::default();
    let mut deferred = Vec::new();
    for change in index.drain_pending() {
        let id = change.item.id.clone();
        match apply_change(index, change) {
            Ok(Outcome::Copied) => report.copied += 1,
            Ok(Outcome::Refreshed) => report.refreshed += 1,
            Ok(Outcome::Deleted) => report.deleted += 1,
            Ok(Outcome::Ignored) => report.ignored += 1,
            Ok(Outcome::Deferred(change)) => deferred.push(change),
            Err(e) => {
                warn!(location = %index.name(), id = %id, error = %e, "Failed to apply change");
                report.failed += 1;
            }
        }
    }
    report.deferred = deferred.len();
    for change in deferred {
        index.enqueue(change);
    }

    report.saved = index.save_index(false)?;
    if report.applied() > 0 || report.failed > 0 {
        info!(
            location = %index.name(),
            copied = report.copied,
            refreshed = report.refreshed,
            deleted = report.deleted,
            deferred = report.deferred,
            failed = report.failed,
            "Sync pass finished"
        );
    }
    Ok(report)
}

fn apply_change(index: &LocationIndex, change: PendingChange) -> Result<Outcome> {
    let local = index.get(&change.item.id);
    let kind = change.kind;

    match kind {
        ChangeKind::Upsert { data_changed } => {
            if local
                .as_ref()
                .is_some_and(|local| !change.item.is_newer_than(local))
            {
                return Ok(Outcome::Ignored);
            }

            if !data_changed && local.is_some() {
                index.attach(change.item);
                return Ok(Outcome::Refreshed);
            }

            let Some(source) = change.source.upgrade() else {
                return Ok(Outcome::Ignored);
            };
            if !source.is_available() {
                return Ok(Outcome::Deferred(change));
            }
            index.import_data(&source, &change.item)?;
            index.attach(change.item);
            Ok(Outcome::Copied)
        }
        ChangeKind::Delete => match local {
            Some(local) if !local.is_newer_than(&change.item) => {
                index.detach(&local.id);
                index.delete_data(&local.id)?;
                Ok(Outcome::Deleted)
            }
            _ => Ok(Outcome::Ignored),
        },
    }
}
