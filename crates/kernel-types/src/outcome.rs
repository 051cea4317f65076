use crate::ids::{EconEventId, EntryId, SourceEventId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sum type for an interpretation's outcome status (spec §4.14).
/// Terminal statuses have no outgoing transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Blocked,
    Provisional,
    Failed,
    Retrying,
    Posted,
    Rejected,
    NonPosting,
    Abandoned,
}

impl OutcomeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OutcomeStatus::Posted
                | OutcomeStatus::Rejected
                | OutcomeStatus::NonPosting
                | OutcomeStatus::Abandoned
        )
    }
}

/// The valid-transition table (spec §4.14), expressed as a compile-time
/// constant rather than the source's duck-typed status strings (spec §9,
/// "Dynamic typing → sum types and contracts").
pub const VALID_TRANSITIONS: &[(OutcomeStatus, &[OutcomeStatus])] = &[
    (
        OutcomeStatus::Blocked,
        &[
            OutcomeStatus::Posted,
            OutcomeStatus::Rejected,
            OutcomeStatus::Failed,
        ],
    ),
    (
        OutcomeStatus::Provisional,
        &[OutcomeStatus::Posted, OutcomeStatus::Rejected],
    ),
    (
        OutcomeStatus::Failed,
        &[OutcomeStatus::Retrying, OutcomeStatus::Abandoned],
    ),
    (
        OutcomeStatus::Retrying,
        &[OutcomeStatus::Posted, OutcomeStatus::Failed],
    ),
    (OutcomeStatus::Posted, &[]),
    (OutcomeStatus::Rejected, &[]),
    (OutcomeStatus::NonPosting, &[]),
    (OutcomeStatus::Abandoned, &[]),
];

/// Look up the allowed next statuses for `from`.
pub fn allowed_next(from: OutcomeStatus) -> &'static [OutcomeStatus] {
    VALID_TRANSITIONS
        .iter()
        .find(|(status, _)| *status == from)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

pub fn is_valid_transition(from: OutcomeStatus, to: OutcomeStatus) -> bool {
    allowed_next(from).contains(&to)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    Guard,
    Engine,
    RoleResolution,
    Write,
    Snapshot,
}

/// One per `source_event_id` (spec §3, P15). Owns the decision log, the
/// longest-lived trace attached to an interpretation attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InterpretationOutcome {
    pub source_event_id: SourceEventId,
    pub status: OutcomeStatus,
    pub econ_event_id: Option<EconEventId>,
    pub journal_entry_ids: Vec<EntryId>,
    pub profile_id: Option<String>,
    pub profile_version: Option<i32>,
    pub profile_hash: Option<String>,
    pub trace_id: Option<String>,
    pub reason_code: Option<String>,
    pub reason_detail: Option<Value>,
    pub failure_type: Option<FailureType>,
    pub failure_message: Option<String>,
    pub engine_traces_ref: Option<String>,
    pub payload_fingerprint: Option<String>,
    pub actor_id: Option<String>,
    pub retry_count: i32,
    /// Newline-delimited JSON-safe records (spec §3, §8
    /// P-serialization-firewall).
    pub decision_log: Vec<Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl InterpretationOutcome {
    /// Attempt to move to `to`, validating against `VALID_TRANSITIONS`.
    pub fn transition_to(
        &mut self,
        to: OutcomeStatus,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), InvalidOutcomeTransition> {
        if !is_valid_transition(self.status, to) {
            return Err(InvalidOutcomeTransition {
                from: self.status,
                to,
            });
        }
        if to == OutcomeStatus::Retrying {
            self.retry_count += 1;
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid outcome transition: {from:?} -> {to:?}")]
pub struct InvalidOutcomeTransition {
    pub from: OutcomeStatus,
    pub to: OutcomeStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_outgoing_transitions() {
        for status in [
            OutcomeStatus::Posted,
            OutcomeStatus::Rejected,
            OutcomeStatus::NonPosting,
            OutcomeStatus::Abandoned,
        ] {
            assert!(allowed_next(status).is_empty());
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn blocked_can_reach_posted_rejected_or_failed() {
        assert!(is_valid_transition(OutcomeStatus::Blocked, OutcomeStatus::Posted));
        assert!(is_valid_transition(OutcomeStatus::Blocked, OutcomeStatus::Rejected));
        assert!(is_valid_transition(OutcomeStatus::Blocked, OutcomeStatus::Failed));
        assert!(!is_valid_transition(OutcomeStatus::Blocked, OutcomeStatus::Retrying));
    }

    #[test]
    fn retrying_increments_retry_count() {
        let mut outcome = InterpretationOutcome {
            source_event_id: SourceEventId::new("evt-1"),
            status: OutcomeStatus::Failed,
            econ_event_id: None,
            journal_entry_ids: vec![],
            profile_id: None,
            profile_version: None,
            profile_hash: None,
            trace_id: None,
            reason_code: None,
            reason_detail: None,
            failure_type: None,
            failure_message: None,
            engine_traces_ref: None,
            payload_fingerprint: None,
            actor_id: None,
            retry_count: 0,
            decision_log: vec![],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        outcome
            .transition_to(OutcomeStatus::Retrying, chrono::Utc::now())
            .unwrap();
        assert_eq!(outcome.retry_count, 1);
        assert_eq!(outcome.status, OutcomeStatus::Retrying);
    }
}
