//! Request/result shapes for the coordinator's single entry point
//! (spec §6).

use kernel_types::{AccountId, EntryId, LedgerId, Role};
use serde_json::Value;

/// Inputs from a caller-side module service (spec §6).
pub struct InterpretationRequest<'a> {
    pub event_type: String,
    pub payload: Value,
    pub effective_date: chrono::NaiveDate,
    pub actor_id: String,
    pub amount: rust_decimal::Decimal,
    pub currency: String,
    pub producer: String,
    pub event_id: Option<kernel_types::EventId>,
    pub occurred_at: Option<chrono::DateTime<chrono::Utc>>,
    pub schema_version: i32,
    pub is_adjustment: bool,
    pub description: Option<String>,
    pub coa_version: i32,
    pub dimension_schema_version: i32,
    pub currency_registry_version: i32,
    pub fx_policy_version: i32,
    pub preamble_log: Vec<Value>,
    pub scope_value: String,
    pub account_key_to_role: Option<&'a dyn Fn(&str) -> Option<Role>>,
}

/// Outcome status surfaced to the caller (spec §6). Only the kernel may
/// produce `Posted`/`Rejected`; service-layer callers report governance
/// transitions only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpretationStatus {
    Posted,
    AlreadyPosted,
    Rejected,
    PeriodClosed,
    AdjustmentsNotAllowed,
    InvalidActor,
    ActorFrozen,
    IngestionFailed,
    ProfileNotFound,
    MeaningFailed,
    GuardRejected,
    GuardBlocked,
    IntentFailed,
    PostingFailed,
}

#[derive(Clone, Debug)]
pub struct InterpretationResult {
    pub status: InterpretationStatus,
    pub journal_entry_ids: Vec<EntryId>,
    pub ledger_ids: Vec<LedgerId>,
    pub profile_name: Option<String>,
    pub message: String,
    pub reason_code: Option<String>,
    pub reason_detail: Option<Value>,
    pub input_hash: Option<String>,
    pub output_hash: Option<String>,
}

impl InterpretationResult {
    pub(crate) fn new(status: InterpretationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            journal_entry_ids: Vec::new(),
            ledger_ids: Vec::new(),
            profile_name: None,
            message: message.into(),
            reason_code: None,
            reason_detail: None,
            input_hash: None,
            output_hash: None,
        }
    }

    pub(crate) fn with_reason(mut self, reason_code: impl Into<String>) -> Self {
        self.reason_code = Some(reason_code.into());
        self
    }

    pub(crate) fn with_detail(mut self, detail: Value) -> Self {
        self.reason_detail = Some(detail);
        self
    }
}

/// Result of validating the acting principal (spec §4.15 step 3,
/// mandatory G14). A caller-side concern; this crate only defines the
/// contract so the coordinator stays free of an identity backend.
pub enum ActorStatus {
    Valid,
    Missing,
    Frozen,
}

pub trait ActorValidator: Send + Sync {
    fn validate(&self, actor_id: &str) -> ActorStatus;
}

/// Verdict from an optional config-control evaluation (spec §4.15 step 6).
pub struct ControlVerdict {
    pub reason_code: String,
    pub message: String,
}

pub trait ControlEvaluator: Send + Sync {
    fn evaluate(&self, event_type: &str, payload: &Value) -> Option<ControlVerdict>;
}

/// Optional caller-supplied subledger posting hook invoked within the
/// same transaction as the journal write (spec §4.15 step 13).
pub trait SubledgerPoster: Send + Sync {
    fn post(&self, account_ids: &[AccountId], entry_ids: &[EntryId]) -> Result<(), String>;
}
