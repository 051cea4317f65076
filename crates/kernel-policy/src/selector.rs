//! Policy registry and dispatch selector (spec §4.4).
//!
//! Pure, zero-I/O registry keyed by `(name, version)` with a secondary
//! `event_type` index. `find_for_event` always returns exactly one policy
//! or a typed error — silent ambiguity is not a possible outcome (P1 /
//! P-policy-exactness, spec §8).

use kernel_types::{AccountingPolicy, PolicyScope, WhereClause};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Proof that a policy passed the external config compiler before
/// entering the registry (spec SPEC_FULL.md §3).
#[derive(Clone, Debug)]
pub struct CompilationReceipt {
    pub policy_name: String,
    pub policy_version: i32,
    pub compiled_hash: String,
    pub config_fingerprint: String,
}

impl CompilationReceipt {
    pub fn matches(&self, policy: &AccountingPolicy) -> bool {
        self.policy_name == policy.name && self.policy_version == policy.version
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy already registered: {name} v{version}")]
    PolicyAlreadyRegistered { name: String, version: i32 },

    #[error("policy '{name}' v{version} has no valid compilation receipt")]
    UncompiledPolicy { name: String, version: i32 },

    #[error("no policy found for event type '{event_type}'")]
    PolicyNotFound { event_type: String },

    #[error("multiple policies match event type '{event_type}': {candidates:?}")]
    MultiplePoliciesMatch {
        event_type: String,
        candidates: Vec<String>,
    },
}

/// The reason a single policy was selected, surfaced to the
/// `PolicyDispatchTrace` for audit reconstruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionReason {
    SingleMatch,
    OverrideResolved,
    ScopeSpecificity,
    PriorityResolved,
    StableNameTiebreak,
}

/// Structured trace of one dispatch decision (spec §4.4, "every dispatch
/// emits...").
#[derive(Clone, Debug)]
pub struct PolicyDispatchTrace {
    pub event_type: String,
    pub effective_date: chrono::NaiveDate,
    pub admissible: Vec<(String, i32)>,
    pub selected: (String, i32),
    pub reason: SelectionReason,
}

#[derive(Default)]
pub struct PolicyRegistry {
    by_name_version: HashMap<(String, i32), AccountingPolicy>,
    by_event_type: HashMap<String, Vec<(String, i32)>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        policy: AccountingPolicy,
        receipt: Option<&CompilationReceipt>,
    ) -> Result<(), PolicyError> {
        let key = (policy.name.clone(), policy.version);
        if self.by_name_version.contains_key(&key) {
            return Err(PolicyError::PolicyAlreadyRegistered {
                name: policy.name,
                version: policy.version,
            });
        }
        if let Some(receipt) = receipt {
            if !receipt.matches(&policy) {
                return Err(PolicyError::UncompiledPolicy {
                    name: policy.name,
                    version: policy.version,
                });
            }
        }
        self.by_event_type
            .entry(policy.trigger.event_type.clone())
            .or_default()
            .push(key.clone());
        self.by_name_version.insert(key, policy);
        Ok(())
    }

    pub fn get(&self, name: &str, version: i32) -> Option<&AccountingPolicy> {
        self.by_name_version
            .get(&(name.to_string(), version))
    }

    /// Find the single matching policy for an event (spec §4.4 steps 1-5).
    pub fn find_for_event(
        &self,
        event_type: &str,
        effective_date: chrono::NaiveDate,
        scope_value: &str,
        payload: Option<&Value>,
    ) -> Result<(&AccountingPolicy, PolicyDispatchTrace), PolicyError> {
        debug!(event_type, %effective_date, scope_value, "policy dispatch started");

        let candidates = self
            .by_event_type
            .get(event_type)
            .map(|keys| keys.iter().filter_map(|k| self.by_name_version.get(k)))
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        if candidates.is_empty() {
            warn!(event_type, "policy_not_found: no candidates for event type");
            return Err(PolicyError::PolicyNotFound {
                event_type: event_type.to_string(),
            });
        }

        let effective: Vec<&AccountingPolicy> = candidates
            .into_iter()
            .filter(|p| p.is_effective_on(effective_date))
            .collect();
        if effective.is_empty() {
            warn!(event_type, "policy_not_found: no effective candidates");
            return Err(PolicyError::PolicyNotFound {
                event_type: event_type.to_string(),
            });
        }

        let scoped: Vec<&AccountingPolicy> = effective
            .into_iter()
            .filter(|p| p.scope.matches(scope_value))
            .collect();
        if scoped.is_empty() {
            warn!(event_type, "policy_not_found: no scope match");
            return Err(PolicyError::PolicyNotFound {
                event_type: event_type.to_string(),
            });
        }

        let matching = filter_by_where(scoped, payload);
        if matching.is_empty() {
            warn!(event_type, "policy_not_found: no where-clause match");
            return Err(PolicyError::PolicyNotFound {
                event_type: event_type.to_string(),
            });
        }

        let admissible: Vec<(String, i32)> = matching
            .iter()
            .map(|p| (p.name.clone(), p.version))
            .collect();

        if matching.len() == 1 {
            let selected = matching[0];
            return Ok((
                selected,
                PolicyDispatchTrace {
                    event_type: event_type.to_string(),
                    effective_date,
                    admissible,
                    selected: (selected.name.clone(), selected.version),
                    reason: SelectionReason::SingleMatch,
                },
            ));
        }

        resolve_precedence(matching, event_type, effective_date, admissible)
    }
}

fn filter_by_where<'a>(
    scoped: Vec<&'a AccountingPolicy>,
    payload: Option<&Value>,
) -> Vec<&'a AccountingPolicy> {
    match payload {
        Some(payload) => {
            let (with_where, without_where): (Vec<_>, Vec<_>) = scoped
                .into_iter()
                .partition(|p| !p.trigger.r#where.is_empty());
            let specific: Vec<&AccountingPolicy> = with_where
                .into_iter()
                .filter(|p| where_clauses_match(&p.trigger.r#where, payload))
                .collect();
            if !specific.is_empty() {
                specific
            } else {
                without_where
            }
        }
        None => scoped
            .into_iter()
            .filter(|p| p.trigger.r#where.is_empty())
            .collect(),
    }
}

fn where_clauses_match(clauses: &[WhereClause], payload: &Value) -> bool {
    clauses
        .iter()
        .all(|clause| where_clause_matches(clause, payload))
}

fn where_clause_matches(clause: &WhereClause, payload: &Value) -> bool {
    if clause.field_path.contains('<') || clause.field_path.contains('>') {
        let expected_bool = clause.expected.as_bool().unwrap_or(false);
        let holds = crate::guard::evaluate_expression(&clause.field_path, payload);
        return holds == expected_bool;
    }

    let resolved = crate::guard::resolve_field(payload, &clause.field_path);
    if clause.expected.is_null() {
        return matches!(resolved, None | Some(Value::Null));
    }
    match resolved {
        Some(value) => value_equals_canonically(value, &clause.expected),
        None => false,
    }
}

fn value_equals_canonically(lhs: &Value, rhs: &Value) -> bool {
    kernel_canon::canonicalize(lhs) == kernel_canon::canonicalize(rhs)
}

fn resolve_precedence<'a>(
    matching: Vec<&'a AccountingPolicy>,
    event_type: &str,
    effective_date: chrono::NaiveDate,
    admissible: Vec<(String, i32)>,
) -> Result<(&'a AccountingPolicy, PolicyDispatchTrace), PolicyError> {
    use kernel_types::PrecedenceMode;

    // Step 1: if any override-mode policy is present, normal-mode policies
    // are discarded outright — `overrides` only disambiguates among the
    // override-mode candidates themselves.
    let (overrides, normal): (Vec<&AccountingPolicy>, Vec<&AccountingPolicy>) = matching
        .into_iter()
        .partition(|p| p.precedence.mode == PrecedenceMode::Override);

    let remaining: Vec<&AccountingPolicy> = if !overrides.is_empty() {
        let overridden: std::collections::HashSet<(String, i32)> = overrides
            .iter()
            .flat_map(|p| p.precedence.overrides.iter().cloned())
            .collect();
        overrides
            .into_iter()
            .filter(|p| !overridden.contains(&(p.name.clone(), p.version)))
            .collect()
    } else {
        normal
    };

    if remaining.len() == 1 {
        let selected = remaining[0];
        return Ok((
            selected,
            PolicyDispatchTrace {
                event_type: event_type.to_string(),
                effective_date,
                admissible,
                selected: (selected.name.clone(), selected.version),
                reason: SelectionReason::OverrideResolved,
            },
        ));
    }

    // Step 2: rank by scope specificity, then priority, then name.
    let max_specificity = remaining
        .iter()
        .map(|p| p.scope.specificity())
        .max()
        .unwrap_or(0);
    let most_specific: Vec<&AccountingPolicy> = remaining
        .into_iter()
        .filter(|p| p.scope.specificity() == max_specificity)
        .collect();

    if most_specific.len() == 1 {
        let selected = most_specific[0];
        return Ok((
            selected,
            PolicyDispatchTrace {
                event_type: event_type.to_string(),
                effective_date,
                admissible,
                selected: (selected.name.clone(), selected.version),
                reason: SelectionReason::ScopeSpecificity,
            },
        ));
    }

    let max_priority = most_specific
        .iter()
        .map(|p| p.precedence.priority)
        .max()
        .unwrap_or(i32::MIN);
    let highest_priority: Vec<&AccountingPolicy> = most_specific
        .into_iter()
        .filter(|p| p.precedence.priority == max_priority)
        .collect();

    if highest_priority.len() == 1 {
        let selected = highest_priority[0];
        return Ok((
            selected,
            PolicyDispatchTrace {
                event_type: event_type.to_string(),
                effective_date,
                admissible,
                selected: (selected.name.clone(), selected.version),
                reason: SelectionReason::PriorityResolved,
            },
        ));
    }

    // Step 3: stable sort by name as final tiebreaker. If the
    // lexicographically-first name is shared by more than one candidate
    // (e.g. two versions of the same policy both matching), the name sort
    // does not actually disambiguate them and the ambiguity is genuine.
    let mut by_name = highest_priority;
    by_name.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
    let first_name = &by_name[0].name;
    let tied_on_name: Vec<&AccountingPolicy> = by_name
        .iter()
        .filter(|p| &p.name == first_name)
        .copied()
        .collect();

    if tied_on_name.len() == 1 {
        let selected = tied_on_name[0];
        return Ok((
            selected,
            PolicyDispatchTrace {
                event_type: event_type.to_string(),
                effective_date,
                admissible,
                selected: (selected.name.clone(), selected.version),
                reason: SelectionReason::StableNameTiebreak,
            },
        ));
    }

    warn!(
        event_type,
        candidates = ?by_name.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
        "multiple policies match and cannot be resolved"
    );
    Err(PolicyError::MultiplePoliciesMatch {
        event_type: event_type.to_string(),
        candidates: by_name.iter().map(|p| p.name.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kernel_types::{
        GuardCondition, IntentSourceMode, LedgerEffect, Precedence, PrecedenceMode, Role, Trigger,
    };

    fn base_policy(name: &str, version: i32, event_type: &str) -> AccountingPolicy {
        AccountingPolicy {
            name: name.to_string(),
            version,
            trigger: Trigger {
                event_type: event_type.to_string(),
                r#where: vec![],
            },
            economic_type: "generic".to_string(),
            ledger_effects: vec![LedgerEffect {
                ledger_id: "GL".to_string(),
                debit_role: Role::new("CASH"),
                credit_role: Role::new("REVENUE"),
            }],
            guards: Vec::<GuardCondition>::new(),
            effective_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            effective_to: None,
            scope: PolicyScope::wildcard(),
            precedence: Precedence {
                mode: PrecedenceMode::Normal,
                priority: 0,
                overrides: vec![],
            },
            required_engines: vec![],
            engine_parameters_ref: None,
            variance_disposition: None,
            valuation_model: None,
            intent_source: IntentSourceMode::Derived,
        }
    }

    #[test]
    fn single_match_resolves() {
        let mut registry = PolicyRegistry::new();
        registry
            .register(base_policy("SalesCash", 1, "sale.cash"), None)
            .unwrap();
        let (policy, trace) = registry
            .find_for_event(
                "sale.cash",
                NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
                "*",
                None,
            )
            .unwrap();
        assert_eq!(policy.name, "SalesCash");
        assert_eq!(trace.reason, SelectionReason::SingleMatch);
    }

    #[test]
    fn no_candidates_is_policy_not_found() {
        let registry = PolicyRegistry::new();
        let err = registry
            .find_for_event(
                "unknown.event",
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "*",
                None,
            )
            .unwrap_err();
        assert!(matches!(err, PolicyError::PolicyNotFound { .. }));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = PolicyRegistry::new();
        registry
            .register(base_policy("SalesCash", 1, "sale.cash"), None)
            .unwrap();
        let err = registry
            .register(base_policy("SalesCash", 1, "sale.cash"), None)
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::PolicyAlreadyRegistered { .. }
        ));
    }

    #[test]
    fn priority_breaks_ties_among_equally_specific_scopes() {
        let mut registry = PolicyRegistry::new();
        let mut low = base_policy("Low", 1, "sale.cash");
        low.precedence.priority = 1;
        let mut high = base_policy("High", 1, "sale.cash");
        high.precedence.priority = 10;
        registry.register(low, None).unwrap();
        registry.register(high, None).unwrap();

        let (policy, trace) = registry
            .find_for_event(
                "sale.cash",
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "*",
                None,
            )
            .unwrap();
        assert_eq!(policy.name, "High");
        assert_eq!(trace.reason, SelectionReason::PriorityResolved);
    }

    #[test]
    fn override_strips_named_policy() {
        let mut registry = PolicyRegistry::new();
        let base = base_policy("Base", 1, "sale.cash");
        let mut overriding = base_policy("Override", 1, "sale.cash");
        overriding.precedence.mode = PrecedenceMode::Override;
        overriding.precedence.overrides = vec![("Base".to_string(), 1)];
        registry.register(base, None).unwrap();
        registry.register(overriding, None).unwrap();

        let (policy, trace) = registry
            .find_for_event(
                "sale.cash",
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "*",
                None,
            )
            .unwrap();
        assert_eq!(policy.name, "Override");
        assert_eq!(trace.reason, SelectionReason::OverrideResolved);
    }

    #[test]
    fn override_mode_beats_normal_even_without_naming_it() {
        let mut registry = PolicyRegistry::new();
        let mut base = base_policy("Base", 1, "sale.cash");
        base.precedence.priority = 100;
        let mut over = base_policy("Over", 1, "sale.cash");
        over.precedence.mode = PrecedenceMode::Override;
        over.precedence.priority = 0;
        over.precedence.overrides = vec![];
        registry.register(base, None).unwrap();
        registry.register(over, None).unwrap();

        let (policy, trace) = registry
            .find_for_event(
                "sale.cash",
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "*",
                None,
            )
            .unwrap();
        assert_eq!(policy.name, "Over");
        assert_eq!(trace.reason, SelectionReason::OverrideResolved);
    }

    #[test]
    fn true_ambiguity_fails_explicitly() {
        let mut registry = PolicyRegistry::new();
        registry
            .register(base_policy("Alpha", 1, "sale.cash"), None)
            .unwrap();
        registry
            .register(base_policy("Alpha", 2, "sale.cash"), None)
            .unwrap();
        let err = registry
            .find_for_event(
                "sale.cash",
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                "*",
                None,
            )
            .unwrap_err();
        assert!(matches!(err, PolicyError::MultiplePoliciesMatch { .. }));
    }
}
