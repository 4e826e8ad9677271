use serde::{Deserialize, Serialize};

use super::{check_range, check_required, ValidationError, ECOG_MAX};

/// Demographic and treatment context for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_regimen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecog_score: Option<i32>,
    /// "What's on your mind?" free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concerns: Option<String>,
}

impl PatientProfile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_required("patient.id", &self.id)?;
        check_required("patient.name", &self.name)?;
        if let Some(ecog) = self.ecog_score {
            check_range("ecog_score", ecog, 0, ECOG_MAX)?;
        }
        Ok(())
    }
}
