//! Pending remote change queue
//!
//! The queue holds at most one [`PendingChange`] per [`SyncUrl`]. Incoming
//! changes are checked against the existing entry for the same url:
//!
//! 1. Folder entries are never queued.
//! 2. An incoming changestamp not greater than the queued one is stale.
//! 3. Same resource id, same content hash and same deletion flag is a
//!    content repeat, even at a higher changestamp.
//! 4. Anything else replaces the queued entry.
//!
//! Changes are popped lowest changestamp first.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use originsync_core::domain::{Changestamp, Origin, PendingChange, SyncUrl};

/// Outcome of evaluating an incoming change against the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendDecision {
    /// No entry exists for the url
    AcceptNew,
    /// The incoming change replaces the queued entry
    AcceptReplace,
    /// Folder entries are not queued
    RejectedFolder,
    /// The queued entry has an equal or newer changestamp
    RejectedStale,
    /// The queued entry already describes the same remote content
    RejectedDuplicateContent,
}

impl AppendDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AppendDecision::AcceptNew | AppendDecision::AcceptReplace)
    }
}

/// Per-url queue of remote changes waiting to be applied locally
#[derive(Debug, Default)]
pub struct RemoteChangeQueue {
    changes: HashMap<SyncUrl, PendingChange>,
    order: BTreeSet<(Changestamp, SyncUrl)>,
}

impl RemoteChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides what [`append_change`](Self::append_change) would do with `change`
    pub fn evaluate_change(&self, change: &PendingChange) -> AppendDecision {
        if change.file_type().is_folder() {
            return AppendDecision::RejectedFolder;
        }

        match self.changes.get(change.url()) {
            None => AppendDecision::AcceptNew,
            Some(existing) if existing.changestamp() >= change.changestamp() => {
                AppendDecision::RejectedStale
            }
            Some(existing) if existing.has_same_content_as(change) => {
                AppendDecision::RejectedDuplicateContent
            }
            Some(_) => AppendDecision::AcceptReplace,
        }
    }

    /// Offers a change to the queue; returns whether it was accepted
    pub fn append_change(&mut self, change: PendingChange) -> bool {
        let decision = self.evaluate_change(&change);
        if !decision.is_accepted() {
            debug!(
                url = %change.url(),
                changestamp = %change.changestamp(),
                ?decision,
                "Remote change rejected"
            );
            return false;
        }

        if let Some(previous) = self.changes.remove(change.url()) {
            self.order
                .remove(&(previous.changestamp(), previous.url().clone()));
        }

        debug!(
            url = %change.url(),
            changestamp = %change.changestamp(),
            deleted = change.is_deleted(),
            ?decision,
            "Remote change queued"
        );

        self.order
            .insert((change.changestamp(), change.url().clone()));
        self.changes.insert(change.url().clone(), change);
        true
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of queued changes
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Removes and returns the change with the lowest changestamp
    pub fn pop_next_change(&mut self) -> Option<PendingChange> {
        let (_, url) = self.order.pop_first()?;
        self.changes.remove(&url)
    }

    /// The queued change for `url`, if any
    pub fn get_change(&self, url: &SyncUrl) -> Option<&PendingChange> {
        self.changes.get(url)
    }

    /// Drops the queued change for `url` if it is older than `changestamp`
    ///
    /// Used when the remote state at `changestamp` already matches the local
    /// file, which makes any earlier queued change obsolete.
    pub fn remove_superseded_change(
        &mut self,
        url: &SyncUrl,
        changestamp: Changestamp,
    ) -> Option<PendingChange> {
        let queued = self.changes.get(url)?;
        if queued.changestamp() >= changestamp {
            return None;
        }
        let removed = self.changes.remove(url)?;
        self.order.remove(&(removed.changestamp(), url.clone()));
        debug!(
            url = %url,
            changestamp = %removed.changestamp(),
            superseded_by = %changestamp,
            "Queued remote change superseded"
        );
        Some(removed)
    }

    /// Drops every queued change belonging to `origin`; returns how many were dropped
    pub fn remove_changes_for_origin(&mut self, origin: &Origin) -> usize {
        let before = self.changes.len();
        self.changes.retain(|url, _| url.origin() != origin);
        self.order.retain(|(_, url)| url.origin() != origin);
        before - self.changes.len()
    }
}
