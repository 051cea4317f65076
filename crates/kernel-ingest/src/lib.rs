//! Ingestor (C10, spec §4.10): event immutability and idempotent
//! hash-based dedup.

#![deny(unsafe_code)]

use kernel_clock::Clock;
use kernel_storage::{EventInsertOutcome, EventStore, StorageError};
use kernel_types::{Event, EventId};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result of one ingest attempt (spec §4.10).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    Duplicate,
    /// Same `event_id`, different payload hash than the stored event.
    Rejected,
}

pub struct Ingestor<'a> {
    store: &'a dyn EventStore,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn EventStore) -> Self {
        Self { store }
    }

    pub async fn ingest(
        &self,
        event_id: EventId,
        event_type: String,
        occurred_at: chrono::DateTime<chrono::Utc>,
        effective_date: chrono::NaiveDate,
        actor_id: String,
        producer: String,
        payload: Value,
        schema_version: i32,
        clock: &dyn Clock,
    ) -> Result<IngestOutcome, IngestError> {
        let payload_hash = hash_payload(&payload);

        let event = Event {
            event_id: event_id.clone(),
            event_type,
            occurred_at,
            effective_date,
            actor_id,
            producer,
            payload_hash: payload_hash.clone(),
            payload,
            schema_version,
            created_at: clock.now_utc(),
        };

        match self.store.try_insert(event).await? {
            EventInsertOutcome::Inserted(_) => {
                info!(event_id = %event_id, "event ingested");
                Ok(IngestOutcome::Accepted)
            }
            EventInsertOutcome::AlreadyExists(existing) => {
                if existing.payload_hash == payload_hash {
                    info!(event_id = %event_id, "duplicate ingest, identical payload");
                    Ok(IngestOutcome::Duplicate)
                } else {
                    warn!(event_id = %event_id, "ingest rejected: payload hash mismatch on existing event_id");
                    Ok(IngestOutcome::Rejected)
                }
            }
        }
    }
}

/// SHA-256 over the payload's canonical textual form (spec §4.3, §4.10).
fn hash_payload(payload: &Value) -> String {
    let canonical = kernel_canon::canonicalize(payload);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_clock::DeterministicClock;
    use kernel_storage::memory::InMemoryEventStore;
    use serde_json::json;

    #[tokio::test]
    async fn first_ingest_is_accepted() {
        let store = InMemoryEventStore::new();
        let ingestor = Ingestor::new(&store);
        let clock = DeterministicClock::new(chrono::Utc::now());
        let outcome = ingestor
            .ingest(
                EventId::new("evt-1"),
                "sale.cash".to_string(),
                chrono::Utc::now(),
                chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "actor-1".to_string(),
                "pos".to_string(),
                json!({"amount": 10}),
                1,
                &clock,
            )
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Accepted);
    }

    #[tokio::test]
    async fn identical_resubmission_is_duplicate() {
        let store = InMemoryEventStore::new();
        let ingestor = Ingestor::new(&store);
        let clock = DeterministicClock::new(chrono::Utc::now());
        let payload = json!({"amount": 10});
        for _ in 0..2 {
            ingestor
                .ingest(
                    EventId::new("evt-1"),
                    "sale.cash".to_string(),
                    chrono::Utc::now(),
                    chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                    "actor-1".to_string(),
                    "pos".to_string(),
                    payload.clone(),
                    1,
                    &clock,
                )
                .await
                .unwrap();
        }
        let outcome = ingestor
            .ingest(
                EventId::new("evt-1"),
                "sale.cash".to_string(),
                chrono::Utc::now(),
                chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "actor-1".to_string(),
                "pos".to_string(),
                payload,
                1,
                &clock,
            )
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn mismatched_payload_on_same_event_id_is_rejected() {
        let store = InMemoryEventStore::new();
        let ingestor = Ingestor::new(&store);
        let clock = DeterministicClock::new(chrono::Utc::now());
        ingestor
            .ingest(
                EventId::new("evt-1"),
                "sale.cash".to_string(),
                chrono::Utc::now(),
                chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "actor-1".to_string(),
                "pos".to_string(),
                json!({"amount": 10}),
                1,
                &clock,
            )
            .await
            .unwrap();
        let outcome = ingestor
            .ingest(
                EventId::new("evt-1"),
                "sale.cash".to_string(),
                chrono::Utc::now(),
                chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "actor-1".to_string(),
                "pos".to_string(),
                json!({"amount": 999}),
                1,
                &clock,
            )
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Rejected);
    }
}
