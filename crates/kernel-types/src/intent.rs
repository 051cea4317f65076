use crate::ids::{EconEventId, LedgerId, Role, SourceEventId};
use kernel_value::Money;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentSide {
    Debit,
    Credit,
}

impl IntentSide {
    pub fn to_journal_side(self) -> crate::journal::Side {
        match self {
            IntentSide::Debit => crate::journal::Side::Debit,
            IntentSide::Credit => crate::journal::Side::Credit,
        }
    }
}

/// One proposed journal line, prior to role resolution: a role rather than
/// a concrete account id (spec §4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineIntent {
    pub side: IntentSide,
    pub role: Role,
    pub money: Money,
    pub dimensions: HashMap<String, String>,
}

/// Proposed lines for a single ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerIntent {
    pub ledger_id: LedgerId,
    pub lines: Vec<LineIntent>,
}

/// A proposal for a set of balanced journal lines, derived from a policy
/// and an amount, prior to role resolution and persistence (spec §3,
/// glossary). Invariant: for each ledger and each currency, sum of debits
/// equals sum of credits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountingIntent {
    pub econ_event_id: EconEventId,
    pub source_event_id: SourceEventId,
    pub profile_id: String,
    pub profile_version: i32,
    pub effective_date: chrono::NaiveDate,
    pub ledger_intents: Vec<LedgerIntent>,
    pub coa_version: i32,
    pub dimension_schema_version: i32,
}
