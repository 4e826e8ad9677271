pub mod enums;
mod event;
mod measurement;
mod patient;
mod protocol;
mod task;

pub use event::*;
pub use measurement::*;
pub use patient::*;
pub use protocol::*;
pub use task::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Severity, anxiety and the other 0–10 scales share these bounds.
pub const SCALE_MIN: i32 = 0;
pub const SCALE_MAX: i32 = 10;
pub const MOOD_MIN: i32 = 1;
pub const MOOD_MAX: i32 = 5;
pub const ECOG_MAX: i32 = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field} must be a probability in [0, 1], got {value}")]
    InvalidProbability { field: String, value: f64 },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Interval start {start} is after end {end}")]
    InvertedInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },
}

pub(crate) fn check_range(field: &str, value: i32, min: i32, max: i32) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.into(),
            value: value.into(),
            min: min.into(),
            max: max.into(),
        });
    }
    Ok(())
}

pub(crate) fn check_probability(field: &str, value: f64) -> Result<(), ValidationError> {
    // NaN fails both comparisons, so it is rejected here too.
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::InvalidProbability {
            field: field.into(),
            value,
        });
    }
    Ok(())
}

pub(crate) fn check_required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field.into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_are_inclusive() {
        assert!(check_range("severity", 0, SCALE_MIN, SCALE_MAX).is_ok());
        assert!(check_range("severity", 10, SCALE_MIN, SCALE_MAX).is_ok());
        assert!(check_range("severity", 11, SCALE_MIN, SCALE_MAX).is_err());
        assert!(check_range("severity", -1, SCALE_MIN, SCALE_MAX).is_err());
    }

    #[test]
    fn probability_rejects_nan_and_out_of_range() {
        assert!(check_probability("confidence", 0.0).is_ok());
        assert!(check_probability("confidence", 1.0).is_ok());
        assert!(check_probability("confidence", 1.01).is_err());
        assert!(check_probability("confidence", f64::NAN).is_err());
    }

    #[test]
    fn required_rejects_whitespace() {
        assert_eq!(
            check_required("name", "   "),
            Err(ValidationError::MissingField("name".into()))
        );
        assert!(check_required("name", "Headache").is_ok());
    }

    #[test]
    fn out_of_range_message_is_readable() {
        let err = check_range("severity", 12, SCALE_MIN, SCALE_MAX).unwrap_err();
        assert_eq!(err.to_string(), "severity must be between 0 and 10, got 12");
    }
}
