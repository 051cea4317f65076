use crate::ids::{EconEventId, EventId, SourceEventId};
use kernel_value::Quantity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An ingested, immutable business event (spec §3, invariant R1). Once
/// written, no field may be modified or deleted; `kernel-ingest` is the
/// only component permitted to create one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub event_type: String,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub effective_date: chrono::NaiveDate,
    pub actor_id: String,
    pub producer: String,
    pub payload_hash: String,
    pub payload: Value,
    pub schema_version: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The accounting-recognized fact derived from a source event under a
/// specific policy version (spec §3). Owns the journal entries it causes
/// to be posted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EconomicEventData {
    pub econ_event_id: EconEventId,
    pub source_event_id: SourceEventId,
    pub economic_type: String,
    pub effective_date: chrono::NaiveDate,
    pub profile_id: String,
    pub profile_version: i32,
    pub profile_hash: Option<String>,
    pub quantity: Option<Quantity>,
    pub dimensions: HashMap<String, String>,
    pub coa_version: i32,
    pub dimension_schema_version: i32,
    pub currency_registry_version: i32,
    pub fx_policy_version: i32,
}
