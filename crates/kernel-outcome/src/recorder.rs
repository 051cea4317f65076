//! Outcome recorder (C14, spec §4.14).

use kernel_storage::{OutcomeStore, StorageError};
use kernel_types::{
    FailureType, InterpretationOutcome, InvalidOutcomeTransition, OutcomeStatus, SourceEventId,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("an outcome already exists for this source event")]
    AlreadyExists,

    #[error(transparent)]
    InvalidTransition(#[from] InvalidOutcomeTransition),

    #[error("creating POSTED requires at least one journal entry id")]
    PostedRequiresEntries,

    #[error("creating FAILED requires a failure_type and failure_message")]
    FailedRequiresFailureContext,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Records and queries interpretation outcomes (spec §4.14, P15).
pub struct OutcomeRecorder<'a> {
    store: &'a dyn OutcomeStore,
}

impl<'a> OutcomeRecorder<'a> {
    pub fn new(store: &'a dyn OutcomeStore) -> Self {
        Self { store }
    }

    /// Create a new outcome row. Fails with `AlreadyExists` if one is
    /// already recorded for this `source_event_id` (P15, enforced by the
    /// store's uniqueness constraint).
    pub async fn create(&self, outcome: InterpretationOutcome) -> Result<(), OutcomeError> {
        validate_creation_invariants(&outcome)?;
        self.store.create(outcome).await.map_err(|err| match err {
            StorageError::Conflict(_) => OutcomeError::AlreadyExists,
            other => OutcomeError::Storage(other),
        })
    }

    pub async fn get_outcome(
        &self,
        source_event_id: &SourceEventId,
    ) -> Result<Option<InterpretationOutcome>, OutcomeError> {
        Ok(self.store.get(source_event_id).await?)
    }

    /// Apply a validated transition and persist the updated row.
    pub async fn transition(
        &self,
        mut outcome: InterpretationOutcome,
        to: OutcomeStatus,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<InterpretationOutcome, OutcomeError> {
        outcome.transition_to(to, now)?;
        if to == OutcomeStatus::Posted && outcome.journal_entry_ids.is_empty() {
            return Err(OutcomeError::PostedRequiresEntries);
        }
        self.store.update(outcome.clone()).await?;
        Ok(outcome)
    }

    pub async fn query_failed(
        &self,
        failure_type: Option<FailureType>,
        profile_id: Option<&str>,
        actor_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InterpretationOutcome>, OutcomeError> {
        Ok(self
            .store
            .query_failed(failure_type, profile_id, actor_id, limit)
            .await?)
    }

    pub async fn query_actionable(
        &self,
        limit: usize,
    ) -> Result<Vec<InterpretationOutcome>, OutcomeError> {
        Ok(self.store.query_actionable(limit).await?)
    }
}

fn validate_creation_invariants(outcome: &InterpretationOutcome) -> Result<(), OutcomeError> {
    match outcome.status {
        OutcomeStatus::Posted if outcome.journal_entry_ids.is_empty() => {
            Err(OutcomeError::PostedRequiresEntries)
        }
        OutcomeStatus::Failed
            if outcome.failure_type.is_none() || outcome.failure_message.is_none() =>
        {
            Err(OutcomeError::FailedRequiresFailureContext)
        }
        _ => Ok(()),
    }
}

/// Build a fresh outcome row in the given terminal-or-not status, ready
/// for `OutcomeRecorder::create`.
pub fn new_outcome(
    source_event_id: SourceEventId,
    status: OutcomeStatus,
    now: chrono::DateTime<chrono::Utc>,
) -> InterpretationOutcome {
    InterpretationOutcome {
        source_event_id,
        status,
        econ_event_id: None,
        journal_entry_ids: Vec::new(),
        profile_id: None,
        profile_version: None,
        profile_hash: None,
        trace_id: None,
        reason_code: None,
        reason_detail: None,
        failure_type: None,
        failure_message: None,
        engine_traces_ref: None,
        payload_fingerprint: None,
        actor_id: None,
        retry_count: 0,
        decision_log: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_storage::memory::InMemoryOutcomeStore;
    use kernel_types::EntryId;

    fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc)
    }

    #[tokio::test]
    async fn posted_without_entries_is_rejected() {
        let store = InMemoryOutcomeStore::new();
        let recorder = OutcomeRecorder::new(&store);
        let outcome = new_outcome(SourceEventId::new("evt-1"), OutcomeStatus::Posted, now());
        let err = recorder.create(outcome).await.unwrap_err();
        assert!(matches!(err, OutcomeError::PostedRequiresEntries));
    }

    #[tokio::test]
    async fn failed_without_failure_context_is_rejected() {
        let store = InMemoryOutcomeStore::new();
        let recorder = OutcomeRecorder::new(&store);
        let outcome = new_outcome(SourceEventId::new("evt-1"), OutcomeStatus::Failed, now());
        let err = recorder.create(outcome).await.unwrap_err();
        assert!(matches!(err, OutcomeError::FailedRequiresFailureContext));
    }

    #[tokio::test]
    async fn second_create_for_same_event_fails() {
        let store = InMemoryOutcomeStore::new();
        let recorder = OutcomeRecorder::new(&store);
        let outcome = new_outcome(
            SourceEventId::new("evt-1"),
            OutcomeStatus::Blocked,
            now(),
        );
        recorder.create(outcome.clone()).await.unwrap();
        let err = recorder.create(outcome).await.unwrap_err();
        assert!(matches!(err, OutcomeError::AlreadyExists));
    }

    #[tokio::test]
    async fn blocked_transitions_to_posted_with_entries() {
        let store = InMemoryOutcomeStore::new();
        let recorder = OutcomeRecorder::new(&store);
        let outcome = new_outcome(SourceEventId::new("evt-1"), OutcomeStatus::Blocked, now());
        recorder.create(outcome.clone()).await.unwrap();

        let mut posted = outcome;
        posted.journal_entry_ids.push(EntryId::generate());
        let result = recorder.transition(posted, OutcomeStatus::Posted, now()).await;
        assert!(result.is_ok());
    }
}
