//! Fiscal period service (C11, spec §4.11). Query-only; holds a static
//! calendar snapshot, never mutates it.

#![deny(unsafe_code)]

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeriodStatus {
    Open,
    ClosedToRegular,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FiscalPeriod {
    pub period_code: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub status: PeriodStatus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("no fiscal period covers date {0}")]
    PeriodNotFound(chrono::NaiveDate),

    #[error("period {period_code} is closed to all postings")]
    ClosedPeriodError { period_code: String },

    #[error("period {period_code} only accepts adjustments")]
    AdjustmentsNotAllowedError { period_code: String },
}

/// An immutable fiscal calendar snapshot, loaded once at startup.
pub struct PeriodService {
    periods: Vec<FiscalPeriod>,
}

impl PeriodService {
    pub fn new(periods: Vec<FiscalPeriod>) -> Self {
        Self { periods }
    }

    pub fn find_period(&self, effective_date: chrono::NaiveDate) -> Result<&FiscalPeriod, PeriodError> {
        self.periods
            .iter()
            .find(|p| effective_date >= p.start_date && effective_date <= p.end_date)
            .ok_or(PeriodError::PeriodNotFound(effective_date))
    }

    /// Spec §4.11: `ClosedPeriodError` when the period forbids all
    /// postings; `AdjustmentsNotAllowedError` when the period is closed to
    /// regular postings and the caller is attempting a non-adjustment.
    pub fn validate_adjustment_allowed(
        &self,
        effective_date: chrono::NaiveDate,
        is_adjustment: bool,
    ) -> Result<(), PeriodError> {
        let period = self.find_period(effective_date)?;
        match period.status {
            PeriodStatus::Open => Ok(()),
            PeriodStatus::Closed => Err(PeriodError::ClosedPeriodError {
                period_code: period.period_code.clone(),
            }),
            PeriodStatus::ClosedToRegular if !is_adjustment => {
                Err(PeriodError::AdjustmentsNotAllowedError {
                    period_code: period.period_code.clone(),
                })
            }
            PeriodStatus::ClosedToRegular => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn service() -> PeriodService {
        PeriodService::new(vec![
            FiscalPeriod {
                period_code: "2026-01".to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
                status: PeriodStatus::Closed,
            },
            FiscalPeriod {
                period_code: "2026-02".to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
                status: PeriodStatus::ClosedToRegular,
            },
            FiscalPeriod {
                period_code: "2026-03".to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
                status: PeriodStatus::Open,
            },
        ])
    }

    #[test]
    fn date_outside_any_period_is_not_found() {
        let err = service()
            .find_period(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, PeriodError::PeriodNotFound(_)));
    }

    #[test]
    fn closed_period_rejects_everything() {
        let err = service()
            .validate_adjustment_allowed(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(), true)
            .unwrap_err();
        assert!(matches!(err, PeriodError::ClosedPeriodError { .. }));
    }

    #[test]
    fn closed_to_regular_rejects_non_adjustment_but_allows_adjustment() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 15).unwrap();
        let err = service()
            .validate_adjustment_allowed(date, false)
            .unwrap_err();
        assert!(matches!(err, PeriodError::AdjustmentsNotAllowedError { .. }));
        assert!(service().validate_adjustment_allowed(date, true).is_ok());
    }

    #[test]
    fn open_period_allows_everything() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert!(service().validate_adjustment_allowed(date, false).is_ok());
    }
}
