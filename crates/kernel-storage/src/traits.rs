use crate::StorageResult;
use async_trait::async_trait;
use kernel_types::{
    EconEventId, EconomicEventData, Event, EventId, FailureType, InterpretationOutcome,
    JournalEntry, LedgerId, SourceEventId,
};

/// Result of an idempotent event insert (spec §4.10).
pub enum EventInsertOutcome {
    Inserted(Event),
    AlreadyExists(Event),
}

/// Persistence for immutable ingested events (spec §3 R1). Implementations
/// must never expose a way to update or delete a stored row.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn try_insert(&self, event: Event) -> StorageResult<EventInsertOutcome>;
    async fn get(&self, event_id: &EventId) -> StorageResult<Option<Event>>;
}

/// Persistence for the `EconomicEvent` row created at spec §4.15 step 11,
/// one per `econ_event_id`.
#[async_trait]
pub trait EconomicEventStore: Send + Sync {
    async fn create(
        &self,
        event: EconomicEventData,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> StorageResult<()>;

    async fn get(&self, econ_event_id: &EconEventId) -> StorageResult<Option<EconomicEventData>>;
}

/// Persistence for journal entries, including the per-ledger gapless
/// sequence allocator (spec §4.12, §5).
#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn find_by_idempotency_key(
        &self,
        ledger_id: &LedgerId,
        idempotency_key: &str,
    ) -> StorageResult<Option<JournalEntry>>;

    /// Allocate the next sequence number for `ledger_id`, under a
    /// per-ledger lock held for the duration of the call (spec §5).
    async fn next_seq(&self, ledger_id: &LedgerId) -> StorageResult<i64>;

    async fn insert_entry(&self, entry: JournalEntry) -> StorageResult<()>;

    async fn get_entry(&self, ledger_id: &LedgerId, entry_id: &kernel_types::EntryId) -> StorageResult<Option<JournalEntry>>;
}

/// Persistence for interpretation outcomes, one per `source_event_id`
/// (spec §4.14, P15).
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn get(&self, source_event_id: &SourceEventId) -> StorageResult<Option<InterpretationOutcome>>;

    /// Fails with `StorageError::Conflict` if an outcome already exists
    /// for this `source_event_id` (P15 — enforced at the storage layer so
    /// concurrent creators race safely).
    async fn create(&self, outcome: InterpretationOutcome) -> StorageResult<()>;

    async fn update(&self, outcome: InterpretationOutcome) -> StorageResult<()>;

    async fn query_failed(
        &self,
        failure_type: Option<FailureType>,
        profile_id: Option<&str>,
        actor_id: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<InterpretationOutcome>>;

    /// FAILED union BLOCKED, ordered by creation time (spec §4.14).
    async fn query_actionable(&self, limit: usize) -> StorageResult<Vec<InterpretationOutcome>>;
}
