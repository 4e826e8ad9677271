use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::enums::TriageRoute;

/// Output of one engine evaluation. Nothing is stored until the audit
/// recorder turns it into a workflow-result event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub route: TriageRoute,
    pub patient_summary: String,
    pub clinician_summary: String,
    pub safety_flags: BTreeSet<String>,
    /// Criterion text or rule description that produced a non-green route.
    pub escalation_trigger: Option<String>,
    pub confidence: f64,
    pub chief_complaint: Option<String>,
    pub symptom: String,
    pub severity: i32,
}

impl Decision {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.safety_flags.contains(flag)
    }
}
