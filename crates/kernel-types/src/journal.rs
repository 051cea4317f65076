use crate::ids::{AccountId, EntryId, LedgerId, SourceEventId};
use kernel_value::Money;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalStatus {
    Posted,
    Reversed,
}

/// A single, immutable journal line within an entry (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_id: AccountId,
    pub side: Side,
    pub money: Money,
    pub dimensions: HashMap<String, String>,
    pub line_seq: i32,
}

/// An immutable, balanced journal entry (spec §3, invariants R4/R10).
///
/// `seq` is gapless per ledger, allocated under the sequence allocator's
/// per-ledger lock (spec §5). After first commit no line may be mutated;
/// a reversal is always a new entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub ledger_id: LedgerId,
    pub seq: i64,
    pub source_event_id: SourceEventId,
    pub effective_date: chrono::NaiveDate,
    pub status: JournalStatus,
    pub idempotency_key: String,
    pub actor_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// The idempotency key scheme from spec §4.12:
    /// `(econ_event_id, ledger_id, profile_version)`.
    pub fn idempotency_key(
        econ_event_id: &str,
        ledger_id: &str,
        profile_version: i32,
    ) -> String {
        format!("{econ_event_id}:{ledger_id}:{profile_version}")
    }
}
