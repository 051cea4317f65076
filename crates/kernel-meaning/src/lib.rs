//! Meaning builder (C6, spec §4.6).
//!
//! Converts `(event_id, event_type, payload, effective_date, policy)` into
//! `EconomicEventData`, gated by the policy's own guards. Pure: no I/O, no
//! clock — the coordinator supplies everything this needs.

#![deny(unsafe_code)]

use kernel_policy::{evaluate_guards, GuardVerdict};
use kernel_types::{AccountingPolicy, EconEventId, EconomicEventData, SourceEventId};
use kernel_value::Quantity;
use serde_json::Value;
use std::collections::HashMap;

/// Result of one meaning-building attempt. Exactly one of `economic_event`
/// or `guard_result` is meaningful depending on `success`.
pub struct MeaningBuilderResult {
    pub success: bool,
    pub economic_event: Option<EconomicEventData>,
    pub guard_result: Option<GuardVerdict>,
}

pub struct MeaningBuilder;

impl MeaningBuilder {
    /// Build meaning from a source event and its resolved policy.
    ///
    /// Guards run first (spec §4.6, SPEC_FULL.md §4.6): if any triggers,
    /// `EconomicEventData` is never constructed and `guard_result` carries
    /// the verdict.
    pub fn build(
        source_event_id: &SourceEventId,
        payload: &Value,
        effective_date: chrono::NaiveDate,
        policy: &AccountingPolicy,
        coa_version: i32,
        dimension_schema_version: i32,
        currency_registry_version: i32,
        fx_policy_version: i32,
    ) -> MeaningBuilderResult {
        if let Some(verdict) = evaluate_guards(&policy.guards, payload) {
            return MeaningBuilderResult {
                success: false,
                economic_event: None,
                guard_result: Some(verdict),
            };
        }

        let quantity = payload.get("quantity").and_then(value_to_quantity);
        let dimensions = payload
            .get("dimensions")
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_else(HashMap::new);

        let economic_event = EconomicEventData {
            econ_event_id: EconEventId::generate(),
            source_event_id: source_event_id.clone(),
            economic_type: policy.economic_type.clone(),
            effective_date,
            profile_id: policy.name.clone(),
            profile_version: policy.version,
            profile_hash: None,
            quantity,
            dimensions,
            coa_version,
            dimension_schema_version,
            currency_registry_version,
            fx_policy_version,
        };

        MeaningBuilderResult {
            success: true,
            economic_event: Some(economic_event),
            guard_result: None,
        }
    }
}

fn value_to_quantity(value: &Value) -> Option<Quantity> {
    let obj = value.as_object()?;
    let amount = obj.get("amount")?.as_str().and_then(|s| s.parse().ok())?;
    let unit = obj.get("unit")?.as_str()?.to_string();
    Some(Quantity::new(amount, unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::{
        GuardCondition, GuardKind, IntentSourceMode, LedgerEffect, Precedence, PrecedenceMode,
        PolicyScope, Role, Trigger,
    };
    use serde_json::json;

    fn policy_with_guards(guards: Vec<GuardCondition>) -> AccountingPolicy {
        AccountingPolicy {
            name: "SalesCash".to_string(),
            version: 1,
            trigger: Trigger {
                event_type: "sale.cash".to_string(),
                r#where: vec![],
            },
            economic_type: "sale".to_string(),
            ledger_effects: vec![LedgerEffect {
                ledger_id: "GL".to_string(),
                debit_role: Role::new("CASH"),
                credit_role: Role::new("REVENUE"),
            }],
            guards,
            effective_from: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
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
    fn guard_rejects_before_building_economic_event() {
        let policy = policy_with_guards(vec![GuardCondition {
            expression: "amount > 100".to_string(),
            kind: GuardKind::Reject,
            reason_code: "TOO_LARGE".to_string(),
            message: None,
        }]);
        let payload = json!({"amount": 500});
        let result = MeaningBuilder::build(
            &SourceEventId::new("evt-1"),
            &payload,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            &policy,
            1,
            1,
            1,
            1,
        );
        assert!(!result.success);
        assert!(result.economic_event.is_none());
        assert_eq!(result.guard_result.unwrap().reason_code, "TOO_LARGE");
    }

    #[test]
    fn no_guard_trigger_builds_economic_event() {
        let policy = policy_with_guards(vec![]);
        let payload = json!({"amount": 10});
        let result = MeaningBuilder::build(
            &SourceEventId::new("evt-1"),
            &payload,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            &policy,
            1,
            1,
            1,
            1,
        );
        assert!(result.success);
        let econ = result.economic_event.unwrap();
        assert_eq!(econ.profile_id, "SalesCash");
        assert_eq!(econ.economic_type, "sale");
    }
}
