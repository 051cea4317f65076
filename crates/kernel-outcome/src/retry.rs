//! Retry service (C16, spec §4.16).

use crate::recorder::{OutcomeError, OutcomeRecorder};
use kernel_types::{EconEventId, EntryId, FailureType, InterpretationOutcome, OutcomeStatus};
use thiserror::Error;
use tracing::info;

pub const MAX_RETRIES: i32 = 10;

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("outcome is not FAILED, cannot initiate retry")]
    NotFailed,

    #[error("retry_count {retry_count} has reached MAX_RETRIES {max}")]
    RetryLimitReached { retry_count: i32, max: i32 },

    #[error("outcome is not RETRYING, cannot complete retry")]
    NotRetrying,

    #[error(transparent)]
    Outcome(#[from] OutcomeError),
}

/// Drives FAILED → RETRYING → {POSTED, FAILED} → ABANDONED (spec §4.16).
/// The retry contract forbids mutating the original payload or actor
/// between attempts; callers enforce that at the coordinator layer.
pub struct RetryService<'a> {
    recorder: &'a OutcomeRecorder<'a>,
}

impl<'a> RetryService<'a> {
    pub fn new(recorder: &'a OutcomeRecorder<'a>) -> Self {
        Self { recorder }
    }

    pub async fn initiate_retry(
        &self,
        outcome: InterpretationOutcome,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<InterpretationOutcome, RetryError> {
        if outcome.status != OutcomeStatus::Failed {
            return Err(RetryError::NotFailed);
        }
        if outcome.retry_count >= MAX_RETRIES {
            return Err(RetryError::RetryLimitReached {
                retry_count: outcome.retry_count,
                max: MAX_RETRIES,
            });
        }
        info!(source_event_id = %outcome.source_event_id, retry_count = outcome.retry_count, "retry initiated");
        Ok(self
            .recorder
            .transition(outcome, OutcomeStatus::Retrying, now)
            .await?)
    }

    pub async fn complete_retry_success(
        &self,
        mut outcome: InterpretationOutcome,
        econ_event_id: EconEventId,
        journal_entry_ids: Vec<EntryId>,
        engine_traces_ref: Option<String>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<InterpretationOutcome, RetryError> {
        if outcome.status != OutcomeStatus::Retrying {
            return Err(RetryError::NotRetrying);
        }
        outcome.econ_event_id = Some(econ_event_id);
        outcome.journal_entry_ids = journal_entry_ids;
        outcome.engine_traces_ref = engine_traces_ref;
        Ok(self
            .recorder
            .transition(outcome, OutcomeStatus::Posted, now)
            .await?)
    }

    pub async fn complete_retry_failure(
        &self,
        mut outcome: InterpretationOutcome,
        failure_type: FailureType,
        failure_message: String,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<InterpretationOutcome, RetryError> {
        if outcome.status != OutcomeStatus::Retrying {
            return Err(RetryError::NotRetrying);
        }
        outcome.failure_type = Some(failure_type);
        outcome.failure_message = Some(failure_message);
        Ok(self
            .recorder
            .transition(outcome, OutcomeStatus::Failed, now)
            .await?)
    }

    pub async fn abandon(
        &self,
        outcome: InterpretationOutcome,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<InterpretationOutcome, RetryError> {
        if outcome.status != OutcomeStatus::Failed {
            return Err(RetryError::NotFailed);
        }
        Ok(self
            .recorder
            .transition(outcome, OutcomeStatus::Abandoned, now)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::new_outcome;
    use kernel_storage::memory::InMemoryOutcomeStore;
    use kernel_types::SourceEventId;

    fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc)
    }

    async fn failed_outcome(store: &InMemoryOutcomeStore) -> InterpretationOutcome {
        let recorder = OutcomeRecorder::new(store);
        let mut outcome = new_outcome(SourceEventId::new("evt-1"), OutcomeStatus::Failed, now());
        outcome.failure_type = Some(FailureType::Engine);
        outcome.failure_message = Some("boom".to_string());
        recorder.create(outcome.clone()).await.unwrap();
        outcome
    }

    #[tokio::test]
    async fn retry_limit_blocks_further_attempts() {
        let store = InMemoryOutcomeStore::new();
        let recorder = OutcomeRecorder::new(&store);
        let service = RetryService::new(&recorder);
        let mut outcome = failed_outcome(&store).await;
        outcome.retry_count = MAX_RETRIES;
        let err = service.initiate_retry(outcome, now()).await.unwrap_err();
        assert!(matches!(err, RetryError::RetryLimitReached { .. }));
    }

    #[tokio::test]
    async fn full_success_cycle() {
        let store = InMemoryOutcomeStore::new();
        let recorder = OutcomeRecorder::new(&store);
        let service = RetryService::new(&recorder);
        let outcome = failed_outcome(&store).await;
        let retrying = service.initiate_retry(outcome, now()).await.unwrap();
        assert_eq!(retrying.status, OutcomeStatus::Retrying);
        assert_eq!(retrying.retry_count, 1);

        let posted = service
            .complete_retry_success(
                retrying,
                EconEventId::generate(),
                vec![EntryId::generate()],
                None,
                now(),
            )
            .await
            .unwrap();
        assert_eq!(posted.status, OutcomeStatus::Posted);
    }

    #[tokio::test]
    async fn abandon_requires_failed_status() {
        let store = InMemoryOutcomeStore::new();
        let recorder = OutcomeRecorder::new(&store);
        let service = RetryService::new(&recorder);
        let outcome = failed_outcome(&store).await;
        let retrying = service.initiate_retry(outcome, now()).await.unwrap();
        let err = service.abandon(retrying, now()).await.unwrap_err();
        assert!(matches!(err, RetryError::NotFailed));
    }
}
