//! PostgreSQL adapter (feature `postgres`). Transactional source of truth;
//! the in-memory adapter in `memory.rs` exists for tests only.

use crate::traits::{EconomicEventStore, EventInsertOutcome, EventStore, JournalStore, OutcomeStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use kernel_types::{
    EconEventId, EconomicEventData, EntryId, Event, EventId, FailureType, InterpretationOutcome,
    JournalEntry, JournalLine, LedgerId, SourceEventId,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS kernel_events (
                event_id TEXT PRIMARY KEY,
                event_type TEXT NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                effective_date DATE NOT NULL,
                actor_id TEXT NOT NULL,
                producer TEXT NOT NULL,
                payload_hash TEXT NOT NULL,
                payload JSONB NOT NULL,
                schema_version INT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS kernel_economic_events (
                econ_event_id TEXT PRIMARY KEY,
                source_event_id TEXT NOT NULL,
                economic_type TEXT NOT NULL,
                effective_date DATE NOT NULL,
                profile_id TEXT NOT NULL,
                profile_version INT NOT NULL,
                profile_hash TEXT,
                quantity JSONB,
                dimensions JSONB NOT NULL,
                coa_version INT NOT NULL,
                dimension_schema_version INT NOT NULL,
                currency_registry_version INT NOT NULL,
                fx_policy_version INT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS kernel_journal_entries (
                id TEXT PRIMARY KEY,
                ledger_id TEXT NOT NULL,
                seq BIGINT NOT NULL,
                source_event_id TEXT NOT NULL,
                effective_date DATE NOT NULL,
                status TEXT NOT NULL,
                idempotency_key TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                lines JSONB NOT NULL,
                UNIQUE (ledger_id, idempotency_key),
                UNIQUE (ledger_id, seq)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS kernel_ledger_sequences (
                ledger_id TEXT PRIMARY KEY,
                last_seq BIGINT NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS kernel_outcomes (
                source_event_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        ];
        for statement in ddl {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresStorage {
    async fn try_insert(&self, event: Event) -> StorageResult<EventInsertOutcome> {
        let existing = self.get(&event.event_id).await?;
        if let Some(existing) = existing {
            return Ok(EventInsertOutcome::AlreadyExists(existing));
        }
        sqlx::query(
            r#"INSERT INTO kernel_events
               (event_id, event_type, occurred_at, effective_date, actor_id, producer,
                payload_hash, payload, schema_version, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               ON CONFLICT (event_id) DO NOTHING"#,
        )
        .bind(event.event_id.as_str())
        .bind(&event.event_type)
        .bind(event.occurred_at)
        .bind(event.effective_date)
        .bind(&event.actor_id)
        .bind(&event.producer)
        .bind(&event.payload_hash)
        .bind(&event.payload)
        .bind(event.schema_version)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("event insert failed: {e}")))?;
        Ok(EventInsertOutcome::Inserted(event))
    }

    async fn get(&self, event_id: &EventId) -> StorageResult<Option<Event>> {
        let row = sqlx::query(
            r#"SELECT event_id, event_type, occurred_at, effective_date, actor_id, producer,
                      payload_hash, payload, schema_version, created_at
               FROM kernel_events WHERE event_id = $1"#,
        )
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("event lookup failed: {e}")))?;

        Ok(row.map(|row| Event {
            event_id: EventId::new(row.get::<String, _>("event_id")),
            event_type: row.get("event_type"),
            occurred_at: row.get("occurred_at"),
            effective_date: row.get("effective_date"),
            actor_id: row.get("actor_id"),
            producer: row.get("producer"),
            payload_hash: row.get("payload_hash"),
            payload: row.get("payload"),
            schema_version: row.get("schema_version"),
            created_at: row.get("created_at"),
        }))
    }
}

#[async_trait]
impl EconomicEventStore for PostgresStorage {
    async fn create(
        &self,
        event: EconomicEventData,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> StorageResult<()> {
        let quantity = event
            .quantity
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StorageError::Backend(format!("quantity serialization failed: {e}")))?;
        let dimensions = serde_json::to_value(&event.dimensions)
            .map_err(|e| StorageError::Backend(format!("dimensions serialization failed: {e}")))?;
        let result = sqlx::query(
            r#"INSERT INTO kernel_economic_events
               (econ_event_id, source_event_id, economic_type, effective_date, profile_id,
                profile_version, profile_hash, quantity, dimensions, coa_version,
                dimension_schema_version, currency_registry_version, fx_policy_version, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
               ON CONFLICT (econ_event_id) DO NOTHING"#,
        )
        .bind(event.econ_event_id.as_str())
        .bind(event.source_event_id.as_str())
        .bind(&event.economic_type)
        .bind(event.effective_date)
        .bind(&event.profile_id)
        .bind(event.profile_version)
        .bind(&event.profile_hash)
        .bind(quantity)
        .bind(dimensions)
        .bind(event.coa_version)
        .bind(event.dimension_schema_version)
        .bind(event.currency_registry_version)
        .bind(event.fx_policy_version)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("economic event insert failed: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "economic event already exists for econ_event_id {}",
                event.econ_event_id
            )));
        }
        Ok(())
    }

    async fn get(&self, econ_event_id: &EconEventId) -> StorageResult<Option<EconomicEventData>> {
        let row = sqlx::query(
            r#"SELECT econ_event_id, source_event_id, economic_type, effective_date, profile_id,
                      profile_version, profile_hash, quantity, dimensions, coa_version,
                      dimension_schema_version, currency_registry_version, fx_policy_version
               FROM kernel_economic_events WHERE econ_event_id = $1"#,
        )
        .bind(econ_event_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("economic event lookup failed: {e}")))?;

        row.map(|row| {
            let quantity: Option<serde_json::Value> = row.get("quantity");
            let quantity = quantity
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| StorageError::Backend(format!("quantity deserialization failed: {e}")))?;
            let dimensions = serde_json::from_value(row.get("dimensions"))
                .map_err(|e| StorageError::Backend(format!("dimensions deserialization failed: {e}")))?;
            Ok(EconomicEventData {
                econ_event_id: EconEventId::new(row.get::<String, _>("econ_event_id")),
                source_event_id: SourceEventId::new(row.get::<String, _>("source_event_id")),
                economic_type: row.get("economic_type"),
                effective_date: row.get("effective_date"),
                profile_id: row.get("profile_id"),
                profile_version: row.get("profile_version"),
                profile_hash: row.get("profile_hash"),
                quantity,
                dimensions,
                coa_version: row.get("coa_version"),
                dimension_schema_version: row.get("dimension_schema_version"),
                currency_registry_version: row.get("currency_registry_version"),
                fx_policy_version: row.get("fx_policy_version"),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl JournalStore for PostgresStorage {
    async fn find_by_idempotency_key(
        &self,
        ledger_id: &LedgerId,
        idempotency_key: &str,
    ) -> StorageResult<Option<JournalEntry>> {
        let row = sqlx::query(
            r#"SELECT id, ledger_id, seq, source_event_id, effective_date, status,
                      idempotency_key, actor_id, created_at, lines
               FROM kernel_journal_entries WHERE ledger_id = $1 AND idempotency_key = $2"#,
        )
        .bind(ledger_id.as_str())
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("journal lookup failed: {e}")))?;
        row.map(row_to_entry).transpose()
    }

    async fn next_seq(&self, ledger_id: &LedgerId) -> StorageResult<i64> {
        let row = sqlx::query(
            r#"INSERT INTO kernel_ledger_sequences (ledger_id, last_seq) VALUES ($1, 1)
               ON CONFLICT (ledger_id) DO UPDATE SET last_seq = kernel_ledger_sequences.last_seq + 1
               RETURNING last_seq"#,
        )
        .bind(ledger_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("sequence allocation failed: {e}")))?;
        Ok(row.get("last_seq"))
    }

    async fn insert_entry(&self, entry: JournalEntry) -> StorageResult<()> {
        let lines = serde_json::to_value(&entry.lines)
            .map_err(|e| StorageError::Backend(format!("line serialization failed: {e}")))?;
        sqlx::query(
            r#"INSERT INTO kernel_journal_entries
               (id, ledger_id, seq, source_event_id, effective_date, status,
                idempotency_key, actor_id, created_at, lines)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(entry.id.as_str())
        .bind(entry.ledger_id.as_str())
        .bind(entry.seq)
        .bind(entry.source_event_id.as_str())
        .bind(entry.effective_date)
        .bind(format!("{:?}", entry.status))
        .bind(&entry.idempotency_key)
        .bind(&entry.actor_id)
        .bind(entry.created_at)
        .bind(lines)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("journal entry insert failed: {e}")))?;
        Ok(())
    }

    async fn get_entry(
        &self,
        ledger_id: &LedgerId,
        entry_id: &EntryId,
    ) -> StorageResult<Option<JournalEntry>> {
        let row = sqlx::query(
            r#"SELECT id, ledger_id, seq, source_event_id, effective_date, status,
                      idempotency_key, actor_id, created_at, lines
               FROM kernel_journal_entries WHERE ledger_id = $1 AND id = $2"#,
        )
        .bind(ledger_id.as_str())
        .bind(entry_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("journal lookup failed: {e}")))?;
        row.map(row_to_entry).transpose()
    }
}

fn row_to_entry(row: sqlx::postgres::PgRow) -> StorageResult<JournalEntry> {
    let lines: Vec<JournalLine> = serde_json::from_value(row.get("lines"))
        .map_err(|e| StorageError::Backend(format!("line deserialization failed: {e}")))?;
    let status_str: String = row.get("status");
    let status = if status_str == "Reversed" {
        kernel_types::JournalStatus::Reversed
    } else {
        kernel_types::JournalStatus::Posted
    };
    Ok(JournalEntry {
        id: EntryId::new(row.get::<String, _>("id")),
        ledger_id: LedgerId::new(row.get::<String, _>("ledger_id")),
        seq: row.get("seq"),
        source_event_id: SourceEventId::new(row.get::<String, _>("source_event_id")),
        effective_date: row.get("effective_date"),
        status,
        idempotency_key: row.get("idempotency_key"),
        actor_id: row.get("actor_id"),
        created_at: row.get("created_at"),
        lines,
    })
}

#[async_trait]
impl OutcomeStore for PostgresStorage {
    async fn get(
        &self,
        source_event_id: &SourceEventId,
    ) -> StorageResult<Option<InterpretationOutcome>> {
        let row = sqlx::query("SELECT body FROM kernel_outcomes WHERE source_event_id = $1")
            .bind(source_event_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("outcome lookup failed: {e}")))?;
        row.map(|row| {
            serde_json::from_value(row.get("body"))
                .map_err(|e| StorageError::Backend(format!("outcome deserialization failed: {e}")))
        })
        .transpose()
    }

    async fn create(&self, outcome: InterpretationOutcome) -> StorageResult<()> {
        let body = serde_json::to_value(&outcome)
            .map_err(|e| StorageError::Backend(format!("outcome serialization failed: {e}")))?;
        let result = sqlx::query(
            r#"INSERT INTO kernel_outcomes (source_event_id, status, body, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (source_event_id) DO NOTHING"#,
        )
        .bind(outcome.source_event_id.as_str())
        .bind(format!("{:?}", outcome.status))
        .bind(body)
        .bind(outcome.created_at)
        .bind(outcome.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("outcome insert failed: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "outcome already exists for source_event_id {}",
                outcome.source_event_id
            )));
        }
        Ok(())
    }

    async fn update(&self, outcome: InterpretationOutcome) -> StorageResult<()> {
        let body = serde_json::to_value(&outcome)
            .map_err(|e| StorageError::Backend(format!("outcome serialization failed: {e}")))?;
        let result = sqlx::query(
            r#"UPDATE kernel_outcomes SET status = $2, body = $3, updated_at = $4
               WHERE source_event_id = $1"#,
        )
        .bind(outcome.source_event_id.as_str())
        .bind(format!("{:?}", outcome.status))
        .bind(body)
        .bind(outcome.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("outcome update failed: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "no outcome for source_event_id {}",
                outcome.source_event_id
            )));
        }
        Ok(())
    }

    async fn query_failed(
        &self,
        failure_type: Option<FailureType>,
        profile_id: Option<&str>,
        actor_id: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<InterpretationOutcome>> {
        // JSONB filtering is done in Rust after fetch: the decision log and
        // body are small per row and this keeps the query portable across
        // the handful of optional filters without building dynamic SQL.
        let rows = sqlx::query(
            r#"SELECT body FROM kernel_outcomes WHERE status = 'Failed' ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("query_failed failed: {e}")))?;

        let mut matches = Vec::new();
        for row in rows {
            let outcome: InterpretationOutcome = serde_json::from_value(row.get("body"))
                .map_err(|e| StorageError::Backend(format!("outcome deserialization failed: {e}")))?;
            if failure_type.map_or(false, |ft| outcome.failure_type != Some(ft)) {
                continue;
            }
            if profile_id.map_or(false, |p| outcome.profile_id.as_deref() != Some(p)) {
                continue;
            }
            if actor_id.map_or(false, |a| outcome.actor_id.as_deref() != Some(a)) {
                continue;
            }
            matches.push(outcome);
        }
        matches.truncate(if limit == 0 { matches.len() } else { limit });
        Ok(matches)
    }

    async fn query_actionable(&self, limit: usize) -> StorageResult<Vec<InterpretationOutcome>> {
        let rows = sqlx::query(
            r#"SELECT body FROM kernel_outcomes WHERE status IN ('Failed', 'Blocked')
               ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("query_actionable failed: {e}")))?;

        let mut matches = Vec::new();
        for row in rows {
            matches.push(
                serde_json::from_value::<InterpretationOutcome>(row.get("body"))
                    .map_err(|e| StorageError::Backend(format!("outcome deserialization failed: {e}")))?,
            );
        }
        matches.truncate(if limit == 0 { matches.len() } else { limit });
        Ok(matches)
    }
}

