//! Shared data model (spec §3): `AccountingPolicy`, `CompiledPolicyPack`,
//! `EconomicEventData`, `AccountingIntent`, `Event`, `JournalEntry` /
//! `JournalLine`, `InterpretationOutcome`, `EngineTraceRecord`.

#![deny(unsafe_code)]

mod event;
mod ids;
mod intent;
mod journal;
mod outcome;
mod policy;
mod trace;

pub use event::{EconomicEventData, Event};
pub use ids::{AccountId, EconEventId, EntryId, EventId, LedgerId, Role, SourceEventId};
pub use intent::{AccountingIntent, IntentSide, LedgerIntent, LineIntent};
pub use journal::{JournalEntry, JournalLine, JournalStatus, Side};
pub use outcome::{
    allowed_next, is_valid_transition, FailureType, InterpretationOutcome,
    InvalidOutcomeTransition, OutcomeStatus, VALID_TRANSITIONS,
};
pub use policy::{
    AccountingPolicy, CompiledPolicyPack, DimensionRoleBinding, GuardCondition, GuardKind,
    IntentSourceMode, LedgerEffect, PolicyScope, Precedence, PrecedenceMode, SubledgerContract,
    Trigger, WhereClause,
};
pub use trace::EngineTraceRecord;
