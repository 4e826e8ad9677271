use serde::{Deserialize, Serialize};

use super::enums::Trend;
use super::{check_range, check_required, ValidationError, SCALE_MAX, SCALE_MIN};

/// The symptom reading being triaged right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub severity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, severity: i32, trend: Option<Trend>) -> Self {
        Self {
            name: name.into(),
            severity,
            trend,
        }
    }

    /// Rejects out-of-range severities outright; values are never clamped.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_required("measurement.name", &self.name)?;
        check_range("severity", self.severity, SCALE_MIN, SCALE_MAX)
    }

    pub fn is_worsening(&self) -> bool {
        self.trend == Some(Trend::Worsening)
    }
}
