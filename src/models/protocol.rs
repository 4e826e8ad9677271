use serde::{Deserialize, Serialize};

/// Clinician-authored escalation rules for one complaint of one patient.
///
/// `chief_complaint == None` marks the patient's general protocol, used when
/// a caller does not name a complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub criteria: EscalationCriteria,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub common_side_effects: Vec<String>,
    #[serde(default)]
    pub supportive_care: Vec<String>,
}

/// Predicate descriptions, e.g. `"severity >= 8"` or
/// `"severity >= 4 or worsening trend"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationCriteria {
    pub red: String,
    pub yellow: String,
}

impl Protocol {
    pub fn new(
        patient_id: impl Into<String>,
        chief_complaint: Option<&str>,
        red: impl Into<String>,
        yellow: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            chief_complaint: chief_complaint.map(str::to_string),
            name: String::new(),
            description: String::new(),
            criteria: EscalationCriteria {
                red: red.into(),
                yellow: yellow.into(),
            },
            red_flags: Vec::new(),
            common_side_effects: Vec::new(),
            supportive_care: Vec::new(),
        }
    }

    pub fn is_general(&self) -> bool {
        self.chief_complaint
            .as_deref()
            .map_or(true, |c| c.trim().is_empty())
    }
}
