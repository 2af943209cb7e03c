/// Common types and utilities shared across handlers and services
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::ServiceError;

/// Source of "now" for every time-based rule (hold expiry, cancellation
/// cut-off, occupancy snapshots, reminders).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = instant;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        ServiceError::ValidationError(format!("Invalid {} format (expected YYYY-MM-DD): {}", field, e))
    })
}

/// First instant of a day (UTC).
pub fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>, ServiceError> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ServiceError::ValidationError("Invalid start date time".to_string()))
}

/// Last whole second of a day (UTC).
pub fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>, ServiceError> {
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ServiceError::ValidationError("Invalid end date time".to_string()))
}

/// Date range parameters for filtering queries
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeParams {
    /// First day, `YYYY-MM-DD`
    pub start_date: String,
    /// Last day (inclusive), `YYYY-MM-DD`
    pub end_date: String,
}

impl DateRangeParams {
    /// Expands the dates to the closed interval `[start 00:00:00, end 23:59:59]`.
    pub fn to_datetime_range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
        let start = start_of_day(parse_date(&self.start_date, "start date")?)?;
        let end = end_of_day(parse_date(&self.end_date, "end date")?)?;
        if end < start {
            return Err(ServiceError::ValidationError(
                "end_date must not be before start_date".to_string(),
            ));
        }
        Ok((start, end))
    }
}

/// Upper-cases a licence plate and strips spaces and dashes.
pub fn normalize_plate(plate: &str) -> String {
    plate
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_range_is_closed_over_whole_days() {
        let params = DateRangeParams {
            start_date: "2024-06-01".into(),
            end_date: "2024-06-03".into(),
        };
        let (start, end) = params.to_datetime_range().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 6, 3, 23, 59, 59).unwrap());
    }

    #[test]
    fn malformed_dates_are_validation_errors() {
        let params = DateRangeParams {
            start_date: "06/01/2024".into(),
            end_date: "2024-06-03".into(),
        };
        assert!(matches!(
            params.to_datetime_range(),
            Err(ServiceError::ValidationError(_))
        ));

        let reversed = DateRangeParams {
            start_date: "2024-06-05".into(),
            end_date: "2024-06-03".into(),
        };
        assert!(reversed.to_datetime_range().is_err());
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::minutes(11));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(11));
    }

    #[test]
    fn plates_are_normalized() {
        assert_eq!(normalize_plate(" ab-123 "), "AB123");
        assert_eq!(normalize_plate("Xy 9 z"), "XY9Z");
    }
}
