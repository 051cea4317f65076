//! Restricted guard/control expression language (spec §4.5, §9).
//!
//! Deliberately small: one comparison or a bare truthiness test over a
//! dotted field path. Implemented as a hand-written recursive-descent
//! parser rather than embedding a general expression engine, per spec §9.
//! Pure and deterministic: no I/O, no clock, no allocation beyond the
//! parsed tokens.

use kernel_types::{GuardCondition, GuardKind};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn parse(token: &str) -> Option<Op> {
        match token {
            "=" | "==" => Some(Op::Eq),
            "!=" => Some(Op::Ne),
            "<" => Some(Op::Lt),
            "<=" => Some(Op::Le),
            ">" => Some(Op::Gt),
            ">=" => Some(Op::Ge),
            _ => None,
        }
    }
}

/// A parsed expression: either a bare truthiness test or a binary
/// comparison against a literal right-hand side.
enum Expr {
    Truthy { field_path: String },
    Compare { field_path: String, op: Op, rhs: String },
}

fn parse(expression: &str) -> Expr {
    let trimmed = expression.trim();
    // Look for one of the recognized operators surrounded by spaces, in
    // order from longest to shortest so `!=`/`<=`/`>=` are not mistaken
    // for `=`/`<`/`>`.
    for candidate in [" != ", " == ", " <= ", " >= ", " = ", " < ", " > "] {
        if let Some(idx) = trimmed.find(candidate) {
            let field_path = trimmed[..idx].trim().to_string();
            let rhs = trimmed[idx + candidate.len()..].trim().to_string();
            let op = Op::parse(candidate.trim()).expect("candidate is a recognized operator");
            return Expr::Compare {
                field_path,
                op,
                rhs,
            };
        }
    }
    Expr::Truthy {
        field_path: trimmed.to_string(),
    }
}

/// Resolve a dotted field path (optionally prefixed with `payload.`)
/// against a JSON payload. Returns `None` when any segment is absent.
pub fn resolve_field<'a>(payload: &'a Value, field_path: &str) -> Option<&'a Value> {
    let path = field_path.strip_prefix("payload.").unwrap_or(field_path);
    let mut current = payload;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Evaluate whether `expression` holds against `payload`.
pub fn evaluate_expression(expression: &str, payload: &Value) -> bool {
    match parse(expression) {
        Expr::Truthy { field_path } => match resolve_field(payload, &field_path) {
            Some(value) => is_truthy(value),
            None => false,
        },
        Expr::Compare {
            field_path,
            op,
            rhs,
        } => {
            let resolved = resolve_field(payload, &field_path);
            if rhs == "null" {
                let is_absent_or_null = matches!(resolved, None | Some(Value::Null));
                return match op {
                    Op::Eq => is_absent_or_null,
                    Op::Ne => !is_absent_or_null,
                    _ => false,
                };
            }
            let Some(lhs) = resolved else {
                return false;
            };
            compare(lhs, op, &rhs)
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare(lhs: &Value, op: Op, rhs: &str) -> bool {
    if rhs == "true" || rhs == "false" {
        let rhs_bool = rhs == "true";
        let lhs_bool = match lhs {
            Value::Bool(b) => *b,
            _ => return false,
        };
        return match op {
            Op::Eq => lhs_bool == rhs_bool,
            Op::Ne => lhs_bool != rhs_bool,
            _ => false,
        };
    }

    if let Ok(rhs_decimal) = Decimal::from_str(rhs) {
        if let Some(lhs_decimal) = as_decimal(lhs) {
            return match op {
                Op::Eq => lhs_decimal == rhs_decimal,
                Op::Ne => lhs_decimal != rhs_decimal,
                Op::Lt => lhs_decimal < rhs_decimal,
                Op::Le => lhs_decimal <= rhs_decimal,
                Op::Gt => lhs_decimal > rhs_decimal,
                Op::Ge => lhs_decimal >= rhs_decimal,
            };
        }
    }

    // Fall back to literal string equality (rhs may come quoted).
    let rhs_unquoted = rhs.trim_matches('"');
    let lhs_str = match lhs {
        Value::String(s) => s.as_str(),
        _ => return false,
    };
    match op {
        Op::Eq => lhs_str == rhs_unquoted,
        Op::Ne => lhs_str != rhs_unquoted,
        _ => false,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

/// The verdict from evaluating one guard that triggered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardVerdict {
    pub kind: GuardKind,
    pub reason_code: String,
    pub message: Option<String>,
}

/// Evaluate a guard list against a payload, returning the first triggered
/// guard's verdict. Unsatisfied guards proceed; an empty or
/// all-unsatisfied list returns `None` (spec §4.5).
pub fn evaluate_guards(guards: &[GuardCondition], payload: &Value) -> Option<GuardVerdict> {
    guards
        .iter()
        .find(|guard| evaluate_expression(&guard.expression, payload))
        .map(|guard| GuardVerdict {
            kind: guard.kind,
            reason_code: guard.reason_code.clone(),
            message: guard.message.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_field_truthiness() {
        let payload = json!({"flag": true, "empty": ""});
        assert!(evaluate_expression("flag", &payload));
        assert!(!evaluate_expression("empty", &payload));
        assert!(!evaluate_expression("missing", &payload));
    }

    #[test]
    fn equality_on_string() {
        let payload = json!({"status": "draft"});
        assert!(evaluate_expression("status = draft", &payload));
        assert!(!evaluate_expression("status = final", &payload));
    }

    #[test]
    fn numeric_comparison() {
        let payload = json!({"amount": 150});
        assert!(evaluate_expression("amount > 100", &payload));
        assert!(!evaluate_expression("amount > 1000", &payload));
        assert!(evaluate_expression("amount >= 150", &payload));
    }

    #[test]
    fn null_equality_succeeds_on_missing_field() {
        let payload = json!({});
        assert!(evaluate_expression("discount = null", &payload));
        assert!(!evaluate_expression("discount != null", &payload));
    }

    #[test]
    fn missing_field_in_comparison_is_false() {
        let payload = json!({});
        assert!(!evaluate_expression("amount > 100", &payload));
    }

    #[test]
    fn dotted_path_with_payload_prefix() {
        let payload = json!({"lines": {"count": 3}});
        assert!(evaluate_expression("payload.lines.count = 3", &payload));
    }

    #[test]
    fn evaluate_guards_returns_first_trigger() {
        let payload = json!({"amount": 500});
        let guards = vec![
            GuardCondition {
                expression: "amount > 10000".to_string(),
                kind: GuardKind::Reject,
                reason_code: "TOO_LARGE".to_string(),
                message: None,
            },
            GuardCondition {
                expression: "amount > 100".to_string(),
                kind: GuardKind::Block,
                reason_code: "NEEDS_REVIEW".to_string(),
                message: Some("over threshold".to_string()),
            },
        ];
        let verdict = evaluate_guards(&guards, &payload).unwrap();
        assert_eq!(verdict.reason_code, "NEEDS_REVIEW");
        assert_eq!(verdict.kind, GuardKind::Block);
    }

    #[test]
    fn evaluate_guards_none_when_unsatisfied() {
        let payload = json!({"amount": 5});
        let guards = vec![GuardCondition {
            expression: "amount > 100".to_string(),
            kind: GuardKind::Reject,
            reason_code: "TOO_LARGE".to_string(),
            message: None,
        }];
        assert!(evaluate_guards(&guards, &payload).is_none());
    }
}
