//! Policy bridge / intent builder (C7, spec §4.7).
//!
//! Given a policy, amount, currency, and payload, synthesizes a balanced
//! `AccountingIntent` either by deriving debit/credit pairs from the
//! policy's `ledger_effects` (the common case) or by reading explicit
//! `payload.lines` for historical imports.

use kernel_types::{
    AccountingIntent, AccountingPolicy, EconEventId, IntentSide, IntentSourceMode, LedgerEffect,
    LedgerId, LedgerIntent, LineIntent, Role, SourceEventId,
};
use kernel_value::Money;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("policy declares intent_source payload_lines but payload.lines is absent or empty")]
    MissingPayloadLines,

    #[error("payload line {index} is missing required field '{field}'")]
    MalformedPayloadLine { index: usize, field: String },

    #[error("payload line {index} references unknown account key '{account_key}'")]
    UnresolvedAccountKey { index: usize, account_key: String },

    #[error("ledger {ledger_id} imbalanced in {currency}: debits {debits} vs credits {credits}")]
    Imbalanced {
        ledger_id: String,
        currency: String,
        debits: Decimal,
        credits: Decimal,
    },
}

/// Above this magnitude a debit/credit remainder is a real imbalance, not
/// rounding noise to absorb with a housekeeping line.
const ROUNDING_TOLERANCE: &str = "0.01";

pub struct IntentBuilder;

impl IntentBuilder {
    /// Dispatch to the mode declared by the policy (spec §4.7).
    pub fn build(
        policy: &AccountingPolicy,
        econ_event_id: &EconEventId,
        source_event_id: &SourceEventId,
        amount: &Money,
        payload: &Value,
        effective_date: chrono::NaiveDate,
        coa_version: i32,
        dimension_schema_version: i32,
        account_key_to_role: Option<&dyn Fn(&str) -> Option<Role>>,
    ) -> Result<AccountingIntent, IntentError> {
        match policy.intent_source {
            IntentSourceMode::Derived => Self::build_derived(
                policy,
                econ_event_id,
                source_event_id,
                amount,
                effective_date,
                coa_version,
                dimension_schema_version,
            ),
            IntentSourceMode::PayloadLines => Self::build_payload_lines(
                policy,
                econ_event_id,
                source_event_id,
                payload,
                effective_date,
                coa_version,
                dimension_schema_version,
                account_key_to_role.ok_or(IntentError::MissingPayloadLines)?,
            ),
        }
    }

    fn build_derived(
        policy: &AccountingPolicy,
        econ_event_id: &EconEventId,
        source_event_id: &SourceEventId,
        amount: &Money,
        effective_date: chrono::NaiveDate,
        coa_version: i32,
        dimension_schema_version: i32,
    ) -> Result<AccountingIntent, IntentError> {
        let mut ledger_intents: HashMap<String, Vec<LineIntent>> = HashMap::new();

        for effect @ LedgerEffect { ledger_id, .. } in &policy.ledger_effects {
            let lines = ledger_intents.entry(ledger_id.clone()).or_default();
            lines.push(LineIntent {
                side: IntentSide::Debit,
                role: effect.debit_role.clone(),
                money: amount.clone(),
                dimensions: HashMap::new(),
            });
            lines.push(LineIntent {
                side: IntentSide::Credit,
                role: effect.credit_role.clone(),
                money: amount.clone(),
                dimensions: HashMap::new(),
            });
        }

        let mut intents = Vec::new();
        for (ledger_id, lines) in ledger_intents {
            let balanced = balance_lines(&ledger_id, lines)?;
            intents.push(LedgerIntent {
                ledger_id: LedgerId::new(ledger_id),
                lines: balanced,
            });
        }
        intents.sort_by(|a, b| a.ledger_id.as_str().cmp(b.ledger_id.as_str()));

        Ok(AccountingIntent {
            econ_event_id: econ_event_id.clone(),
            source_event_id: source_event_id.clone(),
            profile_id: policy.name.clone(),
            profile_version: policy.version,
            effective_date,
            ledger_intents: intents,
            coa_version,
            dimension_schema_version,
        })
    }

    fn build_payload_lines(
        policy: &AccountingPolicy,
        econ_event_id: &EconEventId,
        source_event_id: &SourceEventId,
        payload: &Value,
        effective_date: chrono::NaiveDate,
        coa_version: i32,
        dimension_schema_version: i32,
        account_key_to_role: &dyn Fn(&str) -> Option<Role>,
    ) -> Result<AccountingIntent, IntentError> {
        let lines = payload
            .get("lines")
            .and_then(Value::as_array)
            .filter(|lines| !lines.is_empty())
            .ok_or(IntentError::MissingPayloadLines)?;

        let default_ledger = policy
            .ledger_effects
            .first()
            .map(|e| e.ledger_id.clone())
            .unwrap_or_else(|| "GL".to_string());

        let mut per_ledger: HashMap<String, Vec<LineIntent>> = HashMap::new();

        for (index, raw_line) in lines.iter().enumerate() {
            let account_key = raw_line
                .get("account")
                .and_then(Value::as_str)
                .ok_or_else(|| IntentError::MalformedPayloadLine {
                    index,
                    field: "account".to_string(),
                })?;
            let side_str = raw_line
                .get("side")
                .and_then(Value::as_str)
                .ok_or_else(|| IntentError::MalformedPayloadLine {
                    index,
                    field: "side".to_string(),
                })?;
            let amount_str = raw_line
                .get("amount")
                .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_f64().map(|f| f.to_string())))
                .ok_or_else(|| IntentError::MalformedPayloadLine {
                    index,
                    field: "amount".to_string(),
                })?;
            let currency = raw_line
                .get("currency")
                .and_then(Value::as_str)
                .ok_or_else(|| IntentError::MalformedPayloadLine {
                    index,
                    field: "currency".to_string(),
                })?;
            let ledger_id = raw_line
                .get("ledger_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| default_ledger.clone());

            let side = match side_str {
                "debit" => IntentSide::Debit,
                "credit" => IntentSide::Credit,
                _ => {
                    return Err(IntentError::MalformedPayloadLine {
                        index,
                        field: "side".to_string(),
                    })
                }
            };
            let role = account_key_to_role(account_key).ok_or_else(|| {
                IntentError::UnresolvedAccountKey {
                    index,
                    account_key: account_key.to_string(),
                }
            })?;
            let amount = Decimal::from_str(&amount_str).map_err(|_| {
                IntentError::MalformedPayloadLine {
                    index,
                    field: "amount".to_string(),
                }
            })?;

            per_ledger
                .entry(ledger_id)
                .or_default()
                .push(LineIntent {
                    side,
                    role,
                    money: Money::new(amount, currency),
                    dimensions: HashMap::new(),
                });
        }

        let mut intents = Vec::new();
        for (ledger_id, lines) in per_ledger {
            let balanced = balance_lines(&ledger_id, lines)?;
            intents.push(LedgerIntent {
                ledger_id: LedgerId::new(ledger_id),
                lines: balanced,
            });
        }
        intents.sort_by(|a, b| a.ledger_id.as_str().cmp(b.ledger_id.as_str()));

        Ok(AccountingIntent {
            econ_event_id: econ_event_id.clone(),
            source_event_id: source_event_id.clone(),
            profile_id: policy.name.clone(),
            profile_version: policy.version,
            effective_date,
            ledger_intents: intents,
            coa_version,
            dimension_schema_version,
        })
    }
}

/// Verify per-currency balance for one ledger's lines; if a small
/// remainder exists (rounding noise from an upstream conversion), absorb
/// it with a housekeeping `ROUNDING` line on the short side rather than
/// failing outright (spec §4.7). A material imbalance still fails.
fn balance_lines(ledger_id: &str, mut lines: Vec<LineIntent>) -> Result<Vec<LineIntent>, IntentError> {
    let tolerance = Decimal::from_str(ROUNDING_TOLERANCE).expect("valid decimal literal");

    let mut by_currency: HashMap<String, (Decimal, Decimal)> = HashMap::new();
    for line in &lines {
        let entry = by_currency
            .entry(line.money.currency().code().to_string())
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        match line.side {
            IntentSide::Debit => entry.0 += line.money.amount(),
            IntentSide::Credit => entry.1 += line.money.amount(),
        }
    }

    for (currency, (debits, credits)) in by_currency {
        let remainder = debits - credits;
        if remainder.is_zero() {
            continue;
        }
        if remainder.abs() > tolerance {
            return Err(IntentError::Imbalanced {
                ledger_id: ledger_id.to_string(),
                currency,
                debits,
                credits,
            });
        }
        // Debits exceed credits -> add a credit rounding line, and vice
        // versa, so the ledger balances exactly.
        let (side, rounding_amount) = if remainder.is_sign_positive() {
            (IntentSide::Credit, remainder)
        } else {
            (IntentSide::Debit, -remainder)
        };
        lines.push(LineIntent {
            side,
            role: Role::new("ROUNDING"),
            money: Money::new(rounding_amount, currency.as_str()),
            dimensions: HashMap::new(),
        });
    }

    Ok(lines)
}
