//! Interpretation coordinator (C15, spec §4.15).
//!
//! The single orchestrator callable from caller-side module services.
//! Wires C4 (policy) through C14 (outcome) into the exact 16-step
//! sequence: ingest, select a policy, build meaning, dispatch engines,
//! build an intent, write the journal, and record an outcome, emitting
//! `FINANCE_KERNEL_TRACE` at the end regardless of outcome.

#![deny(unsafe_code)]

mod types;

pub use types::{
    ActorStatus, ActorValidator, ControlEvaluator, ControlVerdict, InterpretationRequest,
    InterpretationResult, InterpretationStatus, SubledgerPoster,
};

use kernel_clock::Clock;
use kernel_engine::EngineRegistry;
use kernel_ingest::{IngestOutcome, Ingestor};
use kernel_intent::IntentBuilder;
use kernel_ledger::{JournalWriter, WriteResult};
use kernel_meaning::MeaningBuilder;
use kernel_outcome::{new_outcome, OutcomeRecorder};
use kernel_period::PeriodService;
use kernel_policy::{GuardVerdict, PolicyRegistry};
use kernel_storage::{EconomicEventStore, EventStore, JournalStore, OutcomeStore};
use kernel_types::{AccountId, CompiledPolicyPack, EventId, FailureType, GuardKind, OutcomeStatus};
use kernel_value::Money;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// The immutable collaborators a coordinator needs for one interpretation
/// (spec §5, "process-global, loaded once, immutable thereafter").
pub struct CoordinatorDeps<'a> {
    pub pack: &'a CompiledPolicyPack,
    pub policy_registry: &'a PolicyRegistry,
    pub engine_registry: &'a EngineRegistry,
    pub event_store: &'a dyn EventStore,
    pub economic_event_store: &'a dyn EconomicEventStore,
    pub journal_store: &'a dyn JournalStore,
    pub outcome_store: &'a dyn OutcomeStore,
    pub period_service: &'a PeriodService,
    pub actor_validator: &'a dyn ActorValidator,
    pub control_evaluator: Option<&'a dyn ControlEvaluator>,
    pub subledger_poster: Option<&'a dyn SubledgerPoster>,
    pub clock: &'a dyn Clock,
}

pub struct InterpretationCoordinator<'a> {
    deps: CoordinatorDeps<'a>,
}

impl<'a> InterpretationCoordinator<'a> {
    pub fn new(deps: CoordinatorDeps<'a>) -> Self {
        Self { deps }
    }

    /// Run the full 16-step sequence for one event (spec §4.15).
    pub async fn interpret(
        &self,
        request: InterpretationRequest<'a>,
    ) -> Result<InterpretationResult, CoordinatorError> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let mut decision_log: Vec<Value> = request.preamble_log.clone();
        let now = self.deps.clock.now_utc();
        let event_id = request.event_id.clone().unwrap_or_else(EventId::generate);
        let source_event_id = kernel_types::SourceEventId::new(event_id.as_str());

        info!(
            correlation_id = %correlation_id,
            event_type = %request.event_type,
            "interpretation started"
        );

        // Step 3: actor validation (mandatory G14). Spec §4.15 step 3
        // requires both failure modes to produce a durable outcome, even
        // though no event has been ingested yet.
        match self.deps.actor_validator.validate(&request.actor_id) {
            ActorStatus::Missing => {
                return self
                    .abort_with_outcome(
                        &source_event_id,
                        &request.actor_id,
                        OutcomeStatus::Rejected,
                        InterpretationResult::new(
                            InterpretationStatus::InvalidActor,
                            "actor not found",
                        )
                        .with_reason("INVALID_ACTOR"),
                        &mut decision_log,
                        now,
                    )
                    .await;
            }
            ActorStatus::Frozen => {
                return self
                    .abort_with_outcome(
                        &source_event_id,
                        &request.actor_id,
                        OutcomeStatus::Rejected,
                        InterpretationResult::new(InterpretationStatus::ActorFrozen, "actor is frozen")
                            .with_reason("ACTOR_FROZEN"),
                        &mut decision_log,
                        now,
                    )
                    .await;
            }
            ActorStatus::Valid => {}
        }

        // Step 4: period validation.
        if let Err(err) = self
            .deps
            .period_service
            .validate_adjustment_allowed(request.effective_date, request.is_adjustment)
        {
            let (status, reason) = match err {
                kernel_period::PeriodError::ClosedPeriodError { .. } => {
                    (InterpretationStatus::PeriodClosed, "PERIOD_CLOSED")
                }
                kernel_period::PeriodError::AdjustmentsNotAllowedError { .. } => (
                    InterpretationStatus::AdjustmentsNotAllowed,
                    "ADJUSTMENTS_NOT_ALLOWED",
                ),
                kernel_period::PeriodError::PeriodNotFound(_) => {
                    (InterpretationStatus::PeriodClosed, "PERIOD_CLOSED")
                }
            };
            return Ok(self.finish(
                InterpretationResult::new(status, err.to_string()).with_reason(reason),
                &mut decision_log,
                now,
            ));
        }

        // Step 5: ingest.
        let ingestor = Ingestor::new(self.deps.event_store);
        let ingest_outcome = ingestor
            .ingest(
                event_id.clone(),
                request.event_type.clone(),
                request.occurred_at.unwrap_or(now),
                request.effective_date,
                request.actor_id.clone(),
                request.producer.clone(),
                request.payload.clone(),
                request.schema_version,
                self.deps.clock,
            )
            .await?;

        match ingest_outcome {
            IngestOutcome::Duplicate => {
                return Ok(self.finish(
                    InterpretationResult::new(
                        InterpretationStatus::AlreadyPosted,
                        "event already ingested with an identical payload",
                    ),
                    &mut decision_log,
                    now,
                ));
            }
            IngestOutcome::Rejected => {
                return Ok(self.finish(
                    InterpretationResult::new(
                        InterpretationStatus::IngestionFailed,
                        "payload mismatch for an existing event_id",
                    )
                    .with_reason("INGESTION_FAILED"),
                    &mut decision_log,
                    now,
                ));
            }
            IngestOutcome::Accepted => {}
        }

        // Step 6: config controls (optional caller hook).
        if let Some(evaluator) = self.deps.control_evaluator {
            if let Some(verdict) = evaluator.evaluate(&request.event_type, &request.payload) {
                return self
                    .abort_with_outcome(
                        &source_event_id,
                        &request.actor_id,
                        OutcomeStatus::Rejected,
                        InterpretationResult::new(InterpretationStatus::Rejected, verdict.message)
                            .with_reason(verdict.reason_code),
                        &mut decision_log,
                        now,
                    )
                    .await;
            }
        }

        // Step 7: policy selection.
        let (policy, dispatch_trace) = match self.deps.policy_registry.find_for_event(
            &request.event_type,
            request.effective_date,
            &request.scope_value,
            Some(&request.payload),
        ) {
            Ok(found) => found,
            Err(err) => {
                warn!(correlation_id = %correlation_id, "policy dispatch failed: {err}");
                return Ok(self.finish(
                    InterpretationResult::new(InterpretationStatus::ProfileNotFound, err.to_string())
                        .with_reason("PROFILE_NOT_FOUND"),
                    &mut decision_log,
                    now,
                ));
            }
        };
        decision_log.push(json!({
            "event": "FINANCE_POLICY_TRACE",
            "policy_name": dispatch_trace.selected.0,
            "policy_version": dispatch_trace.selected.1,
            "reason": format!("{:?}", dispatch_trace.reason),
        }));

        // Step 8: engine dispatch (strict trace-count invariant).
        if !policy.required_engines.is_empty() {
            let dispatch = self.deps.engine_registry.dispatch(
                policy,
                &self.deps.pack.engine_parameters,
                &request.payload,
                self.deps.clock,
            );
            decision_log.push(json!({
                "event": "FINANCE_ENGINE_TRACE",
                "required_engines": policy.required_engines,
                "all_succeeded": dispatch.all_succeeded,
                "trace_count": dispatch.traces.len(),
            }));
            if !dispatch.success_count_matches(&policy.required_engines) {
                return Ok(self.finish(
                    InterpretationResult::new(
                        InterpretationStatus::Rejected,
                        "engine dispatch did not produce a success trace for every required engine",
                    )
                    .with_reason("ENGINE_DISPATCH_FAILED")
                    .with_detail(json!({ "errors": dispatch.errors })),
                    &mut decision_log,
                    now,
                ));
            }
        }

        // Step 9: meaning + guards.
        let meaning = MeaningBuilder::build(
            &source_event_id,
            &request.payload,
            request.effective_date,
            policy,
            request.coa_version,
            request.dimension_schema_version,
            request.currency_registry_version,
            request.fx_policy_version,
        );
        if !meaning.success {
            let verdict: GuardVerdict = meaning.guard_result.expect("guard result on failure");
            let (status, outcome_status) = match verdict.kind {
                GuardKind::Reject => (InterpretationStatus::GuardRejected, OutcomeStatus::Rejected),
                GuardKind::Block => (InterpretationStatus::GuardBlocked, OutcomeStatus::Blocked),
            };
            return self
                .abort_with_outcome(
                    &source_event_id,
                    &request.actor_id,
                    outcome_status,
                    InterpretationResult::new(
                        status,
                        verdict.message.clone().unwrap_or_else(|| verdict.reason_code.clone()),
                    )
                    .with_reason(verdict.reason_code),
                    &mut decision_log,
                    now,
                )
                .await;
        }
        let economic_event = meaning.economic_event.expect("economic event on success");

        // Step 10: intent construction.
        let amount = Money::new(request.amount, request.currency.as_str());
        let intent = match IntentBuilder::build(
            policy,
            &economic_event.econ_event_id,
            &source_event_id,
            &amount,
            &request.payload,
            request.effective_date,
            request.coa_version,
            request.dimension_schema_version,
            request.account_key_to_role,
        ) {
            Ok(intent) => intent,
            Err(err) => {
                return Ok(self.finish(
                    InterpretationResult::new(InterpretationStatus::IntentFailed, err.to_string())
                        .with_reason("INTENT_FAILED"),
                    &mut decision_log,
                    now,
                ));
            }
        };

        // Step 11: persist the EconomicEvent row.
        self.deps
            .economic_event_store
            .create(economic_event.clone(), now)
            .await?;

        // Step 12: journal write.
        let writer = JournalWriter::new(self.deps.journal_store);
        let write_result = writer
            .write(&intent, &request.actor_id, self.deps.pack, self.deps.clock)
            .await?;

        let (status, entry_ids, outcome_status, reason_code, reason_detail) = match write_result {
            WriteResult::AlreadyExists { entry_ids } => (
                InterpretationStatus::Posted,
                entry_ids,
                OutcomeStatus::Posted,
                None,
                None,
            ),
            WriteResult::Success { entry_ids } => {
                // Step 13: optional subledger posting hook, same transaction.
                if let Some(poster) = self.deps.subledger_poster {
                    let account_ids: Vec<AccountId> = Vec::new();
                    if let Err(err) = poster.post(&account_ids, &entry_ids) {
                        return Ok(self.finish(
                            InterpretationResult::new(InterpretationStatus::PostingFailed, err)
                                .with_reason("SUBLEDGER_POSTING_FAILED"),
                            &mut decision_log,
                            now,
                        ));
                    }
                }
                (
                    InterpretationStatus::Posted,
                    entry_ids,
                    OutcomeStatus::Posted,
                    None,
                    None,
                )
            }
            WriteResult::RoleResolutionFailed { unresolved_roles } => (
                InterpretationStatus::PostingFailed,
                Vec::new(),
                OutcomeStatus::Blocked,
                Some("ROLE_RESOLUTION_BLOCKED".to_string()),
                Some(json!({ "unresolved_roles": unresolved_roles.iter().map(|r| r.as_str().to_string()).collect::<Vec<_>>() })),
            ),
            WriteResult::SubledgerReconciliationFailed(err) => (
                InterpretationStatus::PostingFailed,
                Vec::new(),
                OutcomeStatus::Rejected,
                Some("SUBLEDGER_RECONCILIATION_FAILED".to_string()),
                Some(json!({ "detail": err.to_string() })),
            ),
        };

        // Steps 14-15: reproducibility hashes + kernel trace.
        let input_hash = hash_value(&json!({
            "source_event_id": source_event_id.as_str(),
            "profile_id": policy.name,
            "profile_version": policy.version,
            "effective_date": request.effective_date.to_string(),
            "ledger_intents_summary": intent.ledger_intents.len(),
        }));
        let output_hash = hash_value(&json!({
            "entry_ids": entry_ids.iter().map(|id| id.as_str().to_string()).collect::<Vec<_>>(),
            "outcome_status": format!("{outcome_status:?}"),
        }));
        decision_log.push(json!({
            "event": "FINANCE_KERNEL_TRACE",
            "policy_name": policy.name,
            "policy_version": policy.version,
            "outcome_status": format!("{outcome_status:?}"),
            "input_hash": input_hash,
            "output_hash": output_hash,
        }));

        // Step 16: record the outcome with the accumulated decision log.
        let recorder = OutcomeRecorder::new(self.deps.outcome_store);
        let mut outcome = new_outcome(source_event_id.clone(), outcome_status, now);
        outcome.econ_event_id = Some(economic_event.econ_event_id.clone());
        outcome.journal_entry_ids = entry_ids.clone();
        outcome.profile_id = Some(policy.name.clone());
        outcome.profile_version = Some(policy.version);
        outcome.trace_id = Some(correlation_id.clone());
        outcome.reason_code = reason_code.clone();
        outcome.reason_detail = reason_detail.clone();
        outcome.actor_id = Some(request.actor_id.clone());
        if outcome_status == OutcomeStatus::Rejected {
            outcome.failure_type = Some(FailureType::Write);
            outcome.failure_message = reason_detail.as_ref().map(|d| d.to_string());
        }
        outcome.decision_log = decision_log.clone();
        recorder.create(outcome).await?;

        let mut result = InterpretationResult::new(status, "interpretation complete");
        result.journal_entry_ids = entry_ids;
        result.ledger_ids = intent
            .ledger_intents
            .iter()
            .map(|li| li.ledger_id.clone())
            .collect();
        result.profile_name = Some(policy.name.clone());
        result.reason_code = reason_code;
        result.reason_detail = reason_detail;
        result.input_hash = Some(input_hash);
        result.output_hash = Some(output_hash);

        info!(correlation_id = %correlation_id, status = ?result.status, "interpretation complete");
        Ok(result)
    }

    /// Attach the decision log accumulated so far to an early-abort
    /// result; the recorder itself only persists full attempts that
    /// reach an outcome row (spec §4.15 step 2/16).
    fn finish(
        &self,
        result: InterpretationResult,
        decision_log: &mut Vec<Value>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> InterpretationResult {
        decision_log.push(json!({
            "event": "FINANCE_KERNEL_TRACE",
            "outcome_status": format!("{:?}", result.status),
            "aborted_at": now.to_rfc3339(),
        }));
        result
    }

    /// Abort paths the spec explicitly calls out as producing a durable
    /// outcome (actor validation step 3, config controls step 6, guard
    /// evaluation step 9) — unlike period/ingest/policy-dispatch aborts,
    /// which the scenario table (spec §8) describes as leaving no outcome
    /// row behind.
    async fn abort_with_outcome(
        &self,
        source_event_id: &kernel_types::SourceEventId,
        actor_id: &str,
        outcome_status: OutcomeStatus,
        result: InterpretationResult,
        decision_log: &mut Vec<Value>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<InterpretationResult, CoordinatorError> {
        let result = self.finish(result, decision_log, now);
        let mut outcome = new_outcome(source_event_id.clone(), outcome_status, now);
        outcome.actor_id = Some(actor_id.to_string());
        outcome.reason_code = result.reason_code.clone();
        outcome.reason_detail = result.reason_detail.clone();
        outcome.decision_log = decision_log.clone();
        let recorder = OutcomeRecorder::new(self.deps.outcome_store);
        recorder.create(outcome).await?;
        Ok(result)
    }
}

fn hash_value(value: &Value) -> String {
    let canonical = kernel_canon::canonicalize(value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("ingest error: {0}")]
    Ingest(#[from] kernel_ingest::IngestError),

    #[error("economic event storage error: {0}")]
    EconomicEvent(#[from] kernel_storage::StorageError),

    #[error("journal error: {0}")]
    Journal(#[from] kernel_ledger::JournalError),

    #[error("outcome error: {0}")]
    Outcome(#[from] kernel_outcome::OutcomeError),
}
