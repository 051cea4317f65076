use crate::ids::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A versioned, scoped rule binding an event type to ledger effects, guards,
/// and optional engines (spec §3).
///
/// `(name, version)` is unique; the effective window must be non-empty;
/// every role referenced in `ledger_effects` must appear in the active
/// role-bindings set at dispatch time (enforced by the policy bridge, not
/// by this type).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountingPolicy {
    pub name: String,
    pub version: i32,
    pub trigger: Trigger,
    pub economic_type: String,
    pub ledger_effects: Vec<LedgerEffect>,
    pub guards: Vec<GuardCondition>,
    pub effective_from: chrono::NaiveDate,
    pub effective_to: Option<chrono::NaiveDate>,
    pub scope: PolicyScope,
    pub precedence: Precedence,
    pub required_engines: Vec<String>,
    pub engine_parameters_ref: Option<String>,
    pub variance_disposition: Option<String>,
    pub valuation_model: Option<String>,
    pub intent_source: IntentSourceMode,
}

impl AccountingPolicy {
    pub fn is_effective_on(&self, date: chrono::NaiveDate) -> bool {
        date >= self.effective_from && self.effective_to.map_or(true, |to| date <= to)
    }
}

/// A guard or control condition, expressed in the restricted expression
/// language evaluated by `kernel-policy`'s guard evaluator (spec §4.5).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuardCondition {
    pub expression: String,
    pub kind: GuardKind,
    pub reason_code: String,
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardKind {
    Reject,
    Block,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trigger {
    pub event_type: String,
    pub r#where: Vec<WhereClause>,
}

/// One where-clause: a dotted field path compared against an expected
/// literal, or an arithmetic comparison (spec §4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WhereClause {
    pub field_path: String,
    pub expected: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEffect {
    pub ledger_id: String,
    pub debit_role: Role,
    pub credit_role: Role,
}

/// Policy applicability scope: `"*"` (wildcard), `"prefix:*"`, or an exact
/// string match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyScope(pub String);

impl PolicyScope {
    pub fn wildcard() -> Self {
        Self("*".to_string())
    }

    pub fn matches(&self, candidate: &str) -> bool {
        if self.0 == "*" {
            return true;
        }
        if let Some(prefix) = self.0.strip_suffix(":*") {
            return candidate.starts_with(&format!("{prefix}:"));
        }
        self.0 == candidate
    }

    /// Specificity used by precedence resolution: exact match outranks any
    /// prefix match, and among prefixes the longer non-wildcard prefix
    /// wins (spec §4.4).
    pub fn specificity(&self) -> usize {
        if self.0 == "*" {
            0
        } else if let Some(prefix) = self.0.strip_suffix(":*") {
            prefix.len() + 1
        } else {
            // Exact scopes always outrank prefixes regardless of length.
            usize::MAX / 2 + self.0.len()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecedenceMode {
    Normal,
    Override,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Precedence {
    pub mode: PrecedenceMode,
    pub priority: i32,
    /// `(name, version)` pairs this policy overrides, when `mode` is
    /// `Override`.
    pub overrides: Vec<(String, i32)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentSourceMode {
    Derived,
    PayloadLines,
}

/// Control-account contract for one subledger (spec §4.13).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubledgerContract {
    pub subledger_name: String,
    pub control_role: Role,
    pub required_side: crate::journal::Side,
}

/// A dimension-aware role binding override: resolves `role` to
/// `account_id` only when the context's `dimension_key` dimension equals
/// `dimension_value` (spec §4.9, "dimension-aware bindings").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DimensionRoleBinding {
    pub role: Role,
    pub dimension_key: String,
    pub dimension_value: String,
    pub account_id: crate::ids::AccountId,
}

/// The immutable runtime bundle produced by the (external) config
/// compiler: policies, role bindings, engine contracts/parameters,
/// subledger contracts, and a canonical fingerprint (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompiledPolicyPack {
    pub legal_entity: String,
    pub as_of_date: chrono::NaiveDate,
    pub policies: Vec<AccountingPolicy>,
    pub role_bindings: HashMap<Role, crate::ids::AccountId>,
    pub dimension_role_bindings: Vec<DimensionRoleBinding>,
    pub engine_parameters: HashMap<String, Value>,
    pub engine_contracts: HashMap<String, String>,
    pub subledger_contracts: Vec<SubledgerContract>,
    pub canonical_fingerprint: String,
}

impl CompiledPolicyPack {
    /// Resolve a role to an account id using only the base binding table,
    /// ignoring any dimension-aware overrides.
    pub fn resolve_role(&self, role: &Role) -> Option<&crate::ids::AccountId> {
        self.role_bindings.get(role)
    }

    /// Resolve a role, preferring a dimension-aware override whose
    /// `dimension_key`/`dimension_value` matches an entry in `dimensions`,
    /// falling back to the base binding (spec §4.9).
    pub fn resolve_role_with_dimensions(
        &self,
        role: &Role,
        dimensions: &HashMap<String, String>,
    ) -> Option<&crate::ids::AccountId> {
        for binding in &self.dimension_role_bindings {
            if &binding.role != role {
                continue;
            }
            if dimensions.get(&binding.dimension_key) == Some(&binding.dimension_value) {
                return Some(&binding.account_id);
            }
        }
        self.role_bindings.get(role)
    }
}
