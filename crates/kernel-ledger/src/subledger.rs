//! Subledger control registry (C13, spec §4.13).

use kernel_types::{AccountId, CompiledPolicyPack, JournalLine, Side, SubledgerContract};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("subledger '{subledger_name}' control account {account_id} posted on the wrong side: expected {expected:?}, got {actual:?}")]
pub struct SubledgerReconciliationError {
    pub subledger_name: String,
    pub account_id: String,
    pub expected: Side,
    pub actual: Side,
}

/// Enforces declared control-account posting sides for configured
/// subledgers (spec §4.13). Invoked by the writer after balance
/// validation and before persistence.
pub struct SubledgerRegistry<'a> {
    contracts: &'a [SubledgerContract],
    pack: &'a CompiledPolicyPack,
}

impl<'a> SubledgerRegistry<'a> {
    pub fn new(contracts: &'a [SubledgerContract], pack: &'a CompiledPolicyPack) -> Self {
        Self { contracts, pack }
    }

    pub fn enforce_on_post(&self, lines: &[JournalLine]) -> Result<(), SubledgerReconciliationError> {
        for contract in self.contracts {
            let Some(control_account) = self.pack.resolve_role(&contract.control_role) else {
                // No binding for this contract's control role; nothing to
                // enforce against until the role resolves.
                continue;
            };
            for line in lines {
                if &line.account_id != control_account {
                    continue;
                }
                if line.side != contract.required_side {
                    return Err(SubledgerReconciliationError {
                        subledger_name: contract.subledger_name.clone(),
                        account_id: control_account_string(control_account),
                        expected: contract.required_side,
                        actual: line.side,
                    });
                }
            }
        }
        Ok(())
    }
}

fn control_account_string(account_id: &AccountId) -> String {
    account_id.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::{DimensionRoleBinding, Role};
    use kernel_value::Money;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn pack_with_binding(control_role: &str, account_id: &str) -> CompiledPolicyPack {
        let mut role_bindings = HashMap::new();
        role_bindings.insert(Role::new(control_role), AccountId::new(account_id));
        CompiledPolicyPack {
            legal_entity: "ACME".to_string(),
            as_of_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            policies: vec![],
            role_bindings,
            dimension_role_bindings: Vec::<DimensionRoleBinding>::new(),
            engine_parameters: HashMap::new(),
            engine_contracts: HashMap::new(),
            subledger_contracts: vec![],
            canonical_fingerprint: "abc".to_string(),
        }
    }

    fn line(account_id: &str, side: Side) -> JournalLine {
        JournalLine {
            account_id: AccountId::new(account_id),
            side,
            money: Money::new(Decimal::new(1000, 2), "USD"),
            dimensions: HashMap::new(),
            line_seq: 1,
        }
    }

    #[test]
    fn wrong_side_on_control_account_fails() {
        let pack = pack_with_binding("AP_CONTROL", "2000");
        let contracts = vec![SubledgerContract {
            subledger_name: "AP".to_string(),
            control_role: Role::new("AP_CONTROL"),
            required_side: Side::Credit,
        }];
        let registry = SubledgerRegistry::new(&contracts, &pack);
        let err = registry
            .enforce_on_post(&[line("2000", Side::Debit)])
            .unwrap_err();
        assert_eq!(err.subledger_name, "AP");
    }

    #[test]
    fn correct_side_passes() {
        let pack = pack_with_binding("AP_CONTROL", "2000");
        let contracts = vec![SubledgerContract {
            subledger_name: "AP".to_string(),
            control_role: Role::new("AP_CONTROL"),
            required_side: Side::Credit,
        }];
        let registry = SubledgerRegistry::new(&contracts, &pack);
        assert!(registry
            .enforce_on_post(&[line("2000", Side::Credit)])
            .is_ok());
    }

    #[test]
    fn lines_touching_other_accounts_are_ignored() {
        let pack = pack_with_binding("AP_CONTROL", "2000");
        let contracts = vec![SubledgerContract {
            subledger_name: "AP".to_string(),
            control_role: Role::new("AP_CONTROL"),
            required_side: Side::Credit,
        }];
        let registry = SubledgerRegistry::new(&contracts, &pack);
        assert!(registry
            .enforce_on_post(&[line("1000", Side::Debit)])
            .is_ok());
    }
}
