//! Injectable time source. No component in this workspace calls
//! `Utc::now()` directly; every time-dependent component takes a `&dyn
//! Clock` so tests can pin or replay time (spec §4.2).

#![deny(unsafe_code)]

use chrono::{DateTime, Local, Utc};
use std::sync::Mutex;

/// Abstract time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Production clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock holding one fixed time plus a manual advance offset.
pub struct DeterministicClock {
    state: Mutex<DeterministicState>,
}

struct DeterministicState {
    fixed: DateTime<Utc>,
    advanced_secs: i64,
}

impl DeterministicClock {
    pub fn new(fixed: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(DeterministicState {
                fixed,
                advanced_secs: 0,
            }),
        }
    }

    pub fn set_time(&self, time: DateTime<Utc>) {
        let mut state = self.state.lock().expect("clock lock poisoned");
        state.fixed = time;
        state.advanced_secs = 0;
    }

    pub fn advance(&self, seconds: i64) {
        let mut state = self.state.lock().expect("clock lock poisoned");
        state.advanced_secs += seconds;
    }

    /// Advance by one second and return the new time, mirroring the
    /// original `DeterministicClock.tick()`.
    pub fn tick(&self) -> DateTime<Utc> {
        self.advance(1);
        self.now_utc()
    }
}

impl Clock for DeterministicClock {
    fn now(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let state = self.state.lock().expect("clock lock poisoned");
        state.fixed + chrono::Duration::seconds(state.advanced_secs)
    }
}

/// Clock that dispenses a predetermined sequence of times, one per call.
///
/// Once the sequence is exhausted, `now()`/`now_utc()` keep returning the
/// last dispensed value rather than panicking — this mirrors the original
/// Python `SequentialClock`, whose exhaustion behavior was confirmed
/// intentional by reading its source rather than guessed (see
/// SPEC_FULL.md §9, open question (a)). Constructing one with an empty
/// sequence panics immediately, same as the original raising on first use.
pub struct SequentialClock {
    state: Mutex<SequentialState>,
}

struct SequentialState {
    remaining: std::vec::IntoIter<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
}

impl SequentialClock {
    pub fn new(times: Vec<DateTime<Utc>>) -> Self {
        assert!(
            !times.is_empty(),
            "SequentialClock requires at least one time"
        );
        Self {
            state: Mutex::new(SequentialState {
                remaining: times.into_iter(),
                last: None,
            }),
        }
    }
}

impl Clock for SequentialClock {
    fn now(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let mut state = self.state.lock().expect("clock lock poisoned");
        match state.remaining.next() {
            Some(next) => {
                state.last = Some(next);
                next
            }
            None => state
                .last
                .expect("SequentialClock exhausted with no times ever dispensed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn deterministic_clock_advances() {
        let clock = DeterministicClock::new(t(0));
        assert_eq!(clock.now_utc(), t(0));
        clock.advance(5);
        assert_eq!(clock.now_utc(), t(5));
        assert_eq!(clock.tick(), t(6));
    }

    #[test]
    fn sequential_clock_returns_last_value_once_exhausted() {
        let clock = SequentialClock::new(vec![t(0), t(1), t(2)]);
        assert_eq!(clock.now_utc(), t(0));
        assert_eq!(clock.now_utc(), t(1));
        assert_eq!(clock.now_utc(), t(2));
        // Exhausted: keeps returning the last value, never panics.
        assert_eq!(clock.now_utc(), t(2));
        assert_eq!(clock.now_utc(), t(2));
    }

    #[test]
    #[should_panic(expected = "at least one time")]
    fn sequential_clock_rejects_empty_sequence() {
        let _ = SequentialClock::new(vec![]);
    }
}
