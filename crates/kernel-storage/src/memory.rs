//! In-memory reference implementation, deterministic and test-friendly.
//! Production deployments use the `postgres` feature's adapter instead.

use crate::traits::{EconomicEventStore, EventInsertOutcome, EventStore, JournalStore, OutcomeStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use kernel_types::{
    EconEventId, EconomicEventData, EntryId, Event, EventId, FailureType, InterpretationOutcome,
    JournalEntry, LedgerId, OutcomeStatus, SourceEventId,
};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<String, Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn try_insert(&self, event: Event) -> StorageResult<EventInsertOutcome> {
        let mut guard = self
            .events
            .write()
            .map_err(|_| StorageError::Backend("event store lock poisoned".to_string()))?;
        if let Some(existing) = guard.get(event.event_id.as_str()) {
            return Ok(EventInsertOutcome::AlreadyExists(existing.clone()));
        }
        guard.insert(event.event_id.as_str().to_string(), event.clone());
        Ok(EventInsertOutcome::Inserted(event))
    }

    async fn get(&self, event_id: &EventId) -> StorageResult<Option<Event>> {
        let guard = self
            .events
            .read()
            .map_err(|_| StorageError::Backend("event store lock poisoned".to_string()))?;
        Ok(guard.get(event_id.as_str()).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryEconomicEventStore {
    events: RwLock<HashMap<String, EconomicEventData>>,
}

impl InMemoryEconomicEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EconomicEventStore for InMemoryEconomicEventStore {
    async fn create(
        &self,
        event: EconomicEventData,
        _created_at: chrono::DateTime<chrono::Utc>,
    ) -> StorageResult<()> {
        let mut guard = self
            .events
            .write()
            .map_err(|_| StorageError::Backend("economic event store lock poisoned".to_string()))?;
        let key = event.econ_event_id.as_str().to_string();
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "economic event already exists for econ_event_id {key}"
            )));
        }
        guard.insert(key, event);
        Ok(())
    }

    async fn get(&self, econ_event_id: &EconEventId) -> StorageResult<Option<EconomicEventData>> {
        let guard = self
            .events
            .read()
            .map_err(|_| StorageError::Backend("economic event store lock poisoned".to_string()))?;
        Ok(guard.get(econ_event_id.as_str()).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryJournalStore {
    entries: RwLock<HashMap<(String, String), JournalEntry>>,
    by_idempotency_key: RwLock<HashMap<(String, String), String>>,
    sequences: RwLock<HashMap<String, i64>>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn find_by_idempotency_key(
        &self,
        ledger_id: &LedgerId,
        idempotency_key: &str,
    ) -> StorageResult<Option<JournalEntry>> {
        let key = (ledger_id.as_str().to_string(), idempotency_key.to_string());
        let index = self
            .by_idempotency_key
            .read()
            .map_err(|_| StorageError::Backend("journal index lock poisoned".to_string()))?;
        let Some(entry_id) = index.get(&key) else {
            return Ok(None);
        };
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::Backend("journal store lock poisoned".to_string()))?;
        Ok(entries
            .get(&(ledger_id.as_str().to_string(), entry_id.clone()))
            .cloned())
    }

    async fn next_seq(&self, ledger_id: &LedgerId) -> StorageResult<i64> {
        let mut sequences = self
            .sequences
            .write()
            .map_err(|_| StorageError::Backend("sequence lock poisoned".to_string()))?;
        let next = sequences.entry(ledger_id.as_str().to_string()).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    async fn insert_entry(&self, entry: JournalEntry) -> StorageResult<()> {
        let ledger_key = entry.ledger_id.as_str().to_string();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::Backend("journal store lock poisoned".to_string()))?;
        let mut index = self
            .by_idempotency_key
            .write()
            .map_err(|_| StorageError::Backend("journal index lock poisoned".to_string()))?;
        index.insert(
            (ledger_key.clone(), entry.idempotency_key.clone()),
            entry.id.as_str().to_string(),
        );
        entries.insert((ledger_key, entry.id.as_str().to_string()), entry);
        Ok(())
    }

    async fn get_entry(
        &self,
        ledger_id: &LedgerId,
        entry_id: &EntryId,
    ) -> StorageResult<Option<JournalEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::Backend("journal store lock poisoned".to_string()))?;
        Ok(entries
            .get(&(ledger_id.as_str().to_string(), entry_id.as_str().to_string()))
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryOutcomeStore {
    outcomes: RwLock<HashMap<String, InterpretationOutcome>>,
}

impl InMemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutcomeStore for InMemoryOutcomeStore {
    async fn get(
        &self,
        source_event_id: &SourceEventId,
    ) -> StorageResult<Option<InterpretationOutcome>> {
        let guard = self
            .outcomes
            .read()
            .map_err(|_| StorageError::Backend("outcome store lock poisoned".to_string()))?;
        Ok(guard.get(source_event_id.as_str()).cloned())
    }

    async fn create(&self, outcome: InterpretationOutcome) -> StorageResult<()> {
        let mut guard = self
            .outcomes
            .write()
            .map_err(|_| StorageError::Backend("outcome store lock poisoned".to_string()))?;
        let key = outcome.source_event_id.as_str().to_string();
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "outcome already exists for source_event_id {key}"
            )));
        }
        guard.insert(key, outcome);
        Ok(())
    }

    async fn update(&self, outcome: InterpretationOutcome) -> StorageResult<()> {
        let mut guard = self
            .outcomes
            .write()
            .map_err(|_| StorageError::Backend("outcome store lock poisoned".to_string()))?;
        let key = outcome.source_event_id.as_str().to_string();
        if !guard.contains_key(&key) {
            return Err(StorageError::NotFound(format!(
                "no outcome for source_event_id {key}"
            )));
        }
        guard.insert(key, outcome);
        Ok(())
    }

    async fn query_failed(
        &self,
        failure_type: Option<FailureType>,
        profile_id: Option<&str>,
        actor_id: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<InterpretationOutcome>> {
        let guard = self
            .outcomes
            .read()
            .map_err(|_| StorageError::Backend("outcome store lock poisoned".to_string()))?;
        let mut matches: Vec<InterpretationOutcome> = guard
            .values()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .filter(|o| failure_type.map_or(true, |ft| o.failure_type == Some(ft)))
            .filter(|o| profile_id.map_or(true, |p| o.profile_id.as_deref() == Some(p)))
            .filter(|o| actor_id.map_or(true, |a| o.actor_id.as_deref() == Some(a)))
            .cloned()
            .collect();
        matches.sort_by_key(|o| o.created_at);
        matches.truncate(if limit == 0 { matches.len() } else { limit });
        Ok(matches)
    }

    async fn query_actionable(&self, limit: usize) -> StorageResult<Vec<InterpretationOutcome>> {
        let guard = self
            .outcomes
            .read()
            .map_err(|_| StorageError::Backend("outcome store lock poisoned".to_string()))?;
        let mut matches: Vec<InterpretationOutcome> = guard
            .values()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed | OutcomeStatus::Blocked))
            .cloned()
            .collect();
        matches.sort_by_key(|o| o.created_at);
        matches.truncate(if limit == 0 { matches.len() } else { limit });
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_event(event_id: &str) -> Event {
        Event {
            event_id: EventId::new(event_id),
            event_type: "sale.cash".to_string(),
            occurred_at: Utc::now(),
            effective_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            actor_id: "actor-1".to_string(),
            producer: "pos-terminal".to_string(),
            payload_hash: "abc123".to_string(),
            payload: json!({"amount": 10}),
            schema_version: 1,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_insert_returns_existing() {
        let store = InMemoryEventStore::new();
        store.try_insert(sample_event("evt-1")).await.unwrap();
        let result = store.try_insert(sample_event("evt-1")).await.unwrap();
        assert!(matches!(result, EventInsertOutcome::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn economic_event_create_twice_conflicts() {
        let store = InMemoryEconomicEventStore::new();
        let event = EconomicEventData {
            econ_event_id: kernel_types::EconEventId::new("econ-1"),
            source_event_id: SourceEventId::new("evt-1"),
            economic_type: "sale".to_string(),
            effective_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            profile_id: "SalesCash".to_string(),
            profile_version: 1,
            profile_hash: None,
            quantity: None,
            dimensions: std::collections::HashMap::new(),
            coa_version: 1,
            dimension_schema_version: 1,
            currency_registry_version: 1,
            fx_policy_version: 1,
        };
        store.create(event.clone(), Utc::now()).await.unwrap();
        let err = store.create(event, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn sequence_allocation_is_gapless_and_increasing() {
        let store = InMemoryJournalStore::new();
        let ledger = LedgerId::new("GL");
        let first = store.next_seq(&ledger).await.unwrap();
        let second = store.next_seq(&ledger).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn outcome_create_twice_conflicts() {
        let store = InMemoryOutcomeStore::new();
        let outcome = InterpretationOutcome {
            source_event_id: SourceEventId::new("evt-1"),
            status: OutcomeStatus::Blocked,
            econ_event_id: None,
            journal_entry_ids: vec![],
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
            decision_log: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.create(outcome.clone()).await.unwrap();
        let err = store.create(outcome).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }
}
