//! Journal writer (C12, spec §4.12).

use crate::subledger::{SubledgerRegistry, SubledgerReconciliationError};
use kernel_clock::Clock;
use kernel_intent::RoleResolver;
use kernel_storage::{JournalStore, StorageError};
use kernel_types::{
    AccountingIntent, CompiledPolicyPack, EntryId, JournalEntry, JournalLine, JournalStatus, Role,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger {ledger_id} imbalanced in {currency}")]
    Imbalanced { ledger_id: String, currency: String },
}

/// One ledger intent's outcome within a single `write` call (spec §4.12).
#[derive(Clone, Debug)]
pub enum WriteResult {
    AlreadyExists { entry_ids: Vec<EntryId> },
    Success { entry_ids: Vec<EntryId> },
    RoleResolutionFailed { unresolved_roles: Vec<Role> },
    SubledgerReconciliationFailed(SubledgerReconciliationError),
}

pub struct JournalWriter<'a> {
    store: &'a dyn JournalStore,
}

impl<'a> JournalWriter<'a> {
    pub fn new(store: &'a dyn JournalStore) -> Self {
        Self { store }
    }

    /// Spec §4.12 steps 1-7.
    pub async fn write(
        &self,
        intent: &AccountingIntent,
        actor_id: &str,
        pack: &CompiledPolicyPack,
        clock: &dyn Clock,
    ) -> Result<WriteResult, JournalError> {
        let resolver = RoleResolver::new(pack);
        let subledger_registry = SubledgerRegistry::new(&pack.subledger_contracts, pack);

        let mut existing_ids = Vec::new();
        let mut pending = Vec::new();

        for ledger_intent in &intent.ledger_intents {
            let idempotency_key = JournalEntry::idempotency_key(
                intent.econ_event_id.as_str(),
                ledger_intent.ledger_id.as_str(),
                intent.profile_version,
            );
            match self
                .store
                .find_by_idempotency_key(&ledger_intent.ledger_id, &idempotency_key)
                .await?
            {
                Some(existing) => existing_ids.push(existing.id),
                None => pending.push((ledger_intent, idempotency_key)),
            }
        }

        if pending.is_empty() {
            info!(econ_event_id = %intent.econ_event_id, "journal write is a no-op, all ledgers already posted");
            return Ok(WriteResult::AlreadyExists {
                entry_ids: existing_ids,
            });
        }

        let mut unresolved_roles = Vec::new();
        let mut resolved_lines: Vec<(&kernel_types::LedgerIntent, String, Vec<JournalLine>)> =
            Vec::new();

        for (ledger_intent, idempotency_key) in &pending {
            let mut lines = Vec::new();
            for line in &ledger_intent.lines {
                match resolver.resolve(&line.role, "", &line.dimensions) {
                    Some(account_id) => lines.push(JournalLine {
                        account_id: account_id.clone(),
                        side: line.side.to_journal_side(),
                        money: line.money.clone(),
                        dimensions: line.dimensions.clone(),
                        line_seq: (lines.len() + 1) as i32,
                    }),
                    None => unresolved_roles.push(line.role.clone()),
                }
            }
            resolved_lines.push((ledger_intent, idempotency_key.clone(), lines));
        }

        if !unresolved_roles.is_empty() {
            warn!(
                econ_event_id = %intent.econ_event_id,
                unresolved = ?unresolved_roles,
                "journal write blocked: unresolved roles"
            );
            return Ok(WriteResult::RoleResolutionFailed { unresolved_roles });
        }

        for (ledger_intent, _, lines) in &resolved_lines {
            verify_balance(ledger_intent.ledger_id.as_str(), lines)?;
        }

        for (_, _, lines) in &resolved_lines {
            if let Err(err) = subledger_registry.enforce_on_post(lines) {
                warn!(econ_event_id = %intent.econ_event_id, "subledger reconciliation failed: {err}");
                return Ok(WriteResult::SubledgerReconciliationFailed(err));
            }
        }

        let mut new_ids = Vec::new();
        for (ledger_intent, idempotency_key, lines) in resolved_lines {
            let seq = self.store.next_seq(&ledger_intent.ledger_id).await?;
            let entry = JournalEntry {
                id: EntryId::generate(),
                ledger_id: ledger_intent.ledger_id.clone(),
                seq,
                source_event_id: intent.source_event_id.clone(),
                effective_date: intent.effective_date,
                status: JournalStatus::Posted,
                idempotency_key,
                actor_id: actor_id.to_string(),
                created_at: clock.now_utc(),
                lines,
            };
            self.store.insert_entry(entry.clone()).await?;
            new_ids.push(entry.id);
        }

        info!(econ_event_id = %intent.econ_event_id, entries = new_ids.len(), "journal entries posted");
        existing_ids.extend(new_ids);
        Ok(WriteResult::Success {
            entry_ids: existing_ids,
        })
    }
}

/// Verify per-currency balance for one ledger's resolved lines (spec
/// §4.12 step 4). The intent builder already inserted rounding lines, so
/// any remainder here is a real defect, not rounding noise.
fn verify_balance(ledger_id: &str, lines: &[JournalLine]) -> Result<(), JournalError> {
    let mut totals: HashMap<String, (rust_decimal::Decimal, rust_decimal::Decimal)> =
        HashMap::new();
    for line in lines {
        let entry = totals
            .entry(line.money.currency().code().to_string())
            .or_insert((rust_decimal::Decimal::ZERO, rust_decimal::Decimal::ZERO));
        match line.side {
            kernel_types::Side::Debit => entry.0 += line.money.amount(),
            kernel_types::Side::Credit => entry.1 += line.money.amount(),
        }
    }
    for (currency, (debits, credits)) in totals {
        if debits != credits {
            return Err(JournalError::Imbalanced {
                ledger_id: ledger_id.to_string(),
                currency,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_storage::memory::InMemoryJournalStore;
    use kernel_types::{
        AccountId, DimensionRoleBinding, IntentSide, LedgerId, LineIntent,
    };
    use kernel_value::Money;
    use rust_decimal::Decimal;

    fn pack_with_bindings() -> CompiledPolicyPack {
        let mut role_bindings = HashMap::new();
        role_bindings.insert(Role::new("CASH"), AccountId::new("1000"));
        role_bindings.insert(Role::new("REVENUE"), AccountId::new("4000"));
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

    fn simple_intent() -> AccountingIntent {
        AccountingIntent {
            econ_event_id: kernel_types::EconEventId::generate(),
            source_event_id: kernel_types::SourceEventId::new("evt-1"),
            profile_id: "SalesCash".to_string(),
            profile_version: 1,
            effective_date: chrono::NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
            ledger_intents: vec![kernel_types::LedgerIntent {
                ledger_id: LedgerId::new("GL"),
                lines: vec![
                    LineIntent {
                        side: IntentSide::Debit,
                        role: Role::new("CASH"),
                        money: Money::new(Decimal::new(10000, 2), "USD"),
                        dimensions: HashMap::new(),
                    },
                    LineIntent {
                        side: IntentSide::Credit,
                        role: Role::new("REVENUE"),
                        money: Money::new(Decimal::new(10000, 2), "USD"),
                        dimensions: HashMap::new(),
                    },
                ],
            }],
            coa_version: 1,
            dimension_schema_version: 1,
        }
    }

    #[tokio::test]
    async fn first_write_succeeds_and_second_is_idempotent() {
        let store = InMemoryJournalStore::new();
        let writer = JournalWriter::new(&store);
        let pack = pack_with_bindings();
        let clock = kernel_clock::DeterministicClock::new(chrono::Utc::now());
        let intent = simple_intent();

        let first = writer.write(&intent, "actor-1", &pack, &clock).await.unwrap();
        assert!(matches!(first, WriteResult::Success { .. }));

        let second = writer.write(&intent, "actor-1", &pack, &clock).await.unwrap();
        assert!(matches!(second, WriteResult::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn unresolved_role_blocks_write() {
        let store = InMemoryJournalStore::new();
        let writer = JournalWriter::new(&store);
        let pack = CompiledPolicyPack {
            legal_entity: "ACME".to_string(),
            as_of_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            policies: vec![],
            role_bindings: HashMap::new(),
            dimension_role_bindings: vec![],
            engine_parameters: HashMap::new(),
            engine_contracts: HashMap::new(),
            subledger_contracts: vec![],
            canonical_fingerprint: "abc".to_string(),
        };
        let clock = kernel_clock::DeterministicClock::new(chrono::Utc::now());
        let result = writer
            .write(&simple_intent(), "actor-1", &pack, &clock)
            .await
            .unwrap();
        assert!(matches!(result, WriteResult::RoleResolutionFailed { .. }));
    }
}
