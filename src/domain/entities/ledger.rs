use crate::domain::entities::change::RemoteRecord;
use crate::domain::entities::interaction::InteractionRecord;
use crate::domain::value_objects::{InteractionKind, RecordId, TargetRef};
use std::collections::HashSet;

/// Locally rendered list of interaction records for a single target.
///
/// The rendered list is, at any instant, the identity-keyed merge of
/// {confirmed records from fetch/realtime} ∪ {pending records not yet
/// superseded} − {records deleted locally or remotely}. Failed drafts
/// are kept aside for manual resend and never rendered, so a rollback
/// restores the list to exactly its pre-action contents.
#[derive(Debug, Clone)]
pub struct InteractionLedger {
    target: TargetRef,
    kind: InteractionKind,
    records: Vec<InteractionRecord>,
    failed: Vec<InteractionRecord>,
    /// Identities deleted locally or remotely; merges must not
    /// resurrect them.
    deleted: HashSet<RecordId>,
    next_cursor: Option<String>,
    aggregate_count: u32,
}

impl InteractionLedger {
    pub fn new(target: TargetRef, kind: InteractionKind) -> Self {
        Self {
            target,
            kind,
            records: Vec::new(),
            failed: Vec::new(),
            deleted: HashSet::new(),
            next_cursor: None,
            aggregate_count: 0,
        }
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn aggregate_count(&self) -> u32 {
        self.aggregate_count
    }

    /// Initial population: replaces the confirmed set while keeping
    /// local pending records that the fetch cannot know about yet.
    pub fn replace_confirmed(&mut self, items: Vec<RemoteRecord>, next_cursor: Option<String>) {
        self.records.retain(|record| record.id.is_tentative());
        for remote in items {
            if !self.contains(&remote.id) {
                self.records.push(remote.into());
            }
        }
        self.next_cursor = next_cursor;
        self.aggregate_count = self.aggregate_count.max(self.records.len() as u32);
        self.resort();
    }

    /// Follows the pagination cursor; already-known identities are kept
    /// as-is so the merge stays idempotent.
    pub fn append_page(&mut self, items: Vec<RemoteRecord>, next_cursor: Option<String>) {
        for remote in items {
            if !self.contains(&remote.id) {
                self.records.push(remote.into());
            }
        }
        self.next_cursor = next_cursor;
        self.aggregate_count = self.aggregate_count.max(self.records.len() as u32);
        self.resort();
    }

    /// Applies an optimistic insert.
    pub fn insert_pending(&mut self, record: InteractionRecord) {
        self.aggregate_count += 1;
        self.records.push(record);
        self.resort();
    }

    /// Reconciles a pending record against the server response.
    ///
    /// Idempotent against the realtime echo: if the confirmed identity
    /// is already present (echo arrived first), the superseded pending
    /// record is dropped instead of duplicated.
    pub fn confirm(
        &mut self,
        local_id: &RecordId,
        remote: &RemoteRecord,
    ) -> Option<InteractionRecord> {
        if self.deleted.contains(local_id) {
            // The user deleted the record while the insert was in
            // flight; carry the tombstone over to the server identity.
            self.deleted.insert(remote.id.clone());
            return None;
        }

        if self.contains(&remote.id) {
            if let Some(pos) = self.position(local_id) {
                self.records.remove(pos);
                self.aggregate_count = self.aggregate_count.saturating_sub(1);
            }
            return self
                .records
                .iter()
                .find(|record| record.id == remote.id)
                .cloned();
        }

        let pos = self.position(local_id)?;
        self.records[pos].confirm(remote);
        let confirmed = self.records[pos].clone();
        self.resort();
        Some(confirmed)
    }

    /// Rolls back an optimistic insert: the record leaves the rendered
    /// list and is parked as a failed draft for manual resend.
    pub fn rollback_insert(&mut self, local_id: &RecordId) -> Option<InteractionRecord> {
        let pos = self.position(local_id)?;
        let mut record = self.records.remove(pos);
        self.aggregate_count = self.aggregate_count.saturating_sub(1);
        record.mark_failed();
        self.failed.push(record.clone());
        Some(record)
    }

    /// Reclaims a failed draft for a user-triggered resend.
    pub fn take_failed(&mut self, local_id: &RecordId) -> Option<InteractionRecord> {
        let pos = self.failed.iter().position(|record| &record.id == local_id)?;
        Some(self.failed.remove(pos))
    }

    pub fn failed_drafts(&self) -> Vec<InteractionRecord> {
        self.failed.clone()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Optimistic removal; returns the slot and record for rollback.
    pub fn remove(&mut self, id: &RecordId) -> Option<(usize, InteractionRecord)> {
        let pos = self.position(id)?;
        let record = self.records.remove(pos);
        self.aggregate_count = self.aggregate_count.saturating_sub(1);
        self.deleted.insert(id.clone());
        Some((pos, record))
    }

    /// Restores a record removed by an optimistic delete that failed.
    pub fn restore(&mut self, pos: usize, record: InteractionRecord) {
        self.deleted.remove(&record.id);
        let pos = pos.min(self.records.len());
        self.records.insert(pos, record);
        self.aggregate_count += 1;
        self.resort();
    }

    /// Identity-keyed merge of an externally-originated upsert. Returns
    /// true when a new record entered the list.
    pub fn merge_remote(&mut self, remote: RemoteRecord) -> bool {
        if self.deleted.contains(&remote.id) {
            return false;
        }
        if let Some(pos) = self.position(&remote.id) {
            let existing = &mut self.records[pos];
            existing.content = remote.content;
            existing.created_at = remote.created_at;
            existing.like_count = remote.like_count;
            self.resort();
            return false;
        }

        self.aggregate_count += 1;
        self.records.push(remote.into());
        self.resort();
        true
    }

    /// Applies an externally-originated delete. Returns true if a
    /// record was removed.
    pub fn remove_by_id(&mut self, id: &RecordId) -> bool {
        self.deleted.insert(id.clone());
        if let Some(pos) = self.position(id) {
            self.records.remove(pos);
            self.aggregate_count = self.aggregate_count.saturating_sub(1);
            return true;
        }
        false
    }

    pub fn get(&self, id: &RecordId) -> Option<&InteractionRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    pub fn get_mut(&mut self, id: &RecordId) -> Option<&mut InteractionRecord> {
        self.records.iter_mut().find(|record| &record.id == id)
    }

    /// Rendered snapshot, newest first. Ordering is deterministic:
    /// creation time descending, identity as tie-breaker.
    pub fn rendered(&self) -> Vec<InteractionRecord> {
        self.records.clone()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|record| record.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn contains(&self, id: &RecordId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }

    fn resort(&mut self) {
        self.records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.to_string().cmp(&a.id.to_string()))
        });
    }
}
