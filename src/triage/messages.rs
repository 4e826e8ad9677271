use std::collections::BTreeSet;

use crate::models::enums::TriageRoute;

/// Message template builder for decision summaries.
/// Patient framing stays calm and actionable; clinician framing is factual.
pub struct MessageTemplates;

impl MessageTemplates {
    pub fn patient_summary(route: TriageRoute, symptom: &str, severity: i32) -> String {
        match route {
            TriageRoute::Green => format!(
                "Thanks for checking in about your {}. A severity of {}/10 is something \
                 you can manage at home with your care plan. Let us know if anything changes.",
                symptom.to_lowercase(),
                severity,
            ),
            TriageRoute::Yellow => format!(
                "Thanks for telling us about your {}. Your care team will review this \
                 and follow up with you. If it gets worse before then, please reach out.",
                symptom.to_lowercase(),
            ),
            TriageRoute::Red => format!(
                "Your {} needs attention from your care team now. Someone will contact \
                 you shortly. If you feel unsafe, call your local emergency number.",
                symptom.to_lowercase(),
            ),
        }
    }

    pub fn clinician_summary(
        route: TriageRoute,
        patient_id: &str,
        symptom: &str,
        severity: i32,
        basis: &str,
        flags: &BTreeSet<String>,
    ) -> String {
        let flags = if flags.is_empty() {
            "none".to_string()
        } else {
            flags.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        format!(
            "{}: {} severity {}/10 reported by patient {}. Basis: {}. Flags: {}.",
            route.as_str().to_uppercase(),
            symptom,
            severity,
            patient_id,
            basis,
            flags,
        )
    }

    /// Trigger text for rapid progression.
    pub fn rapid_progression(symptom: &str, from: i32, to: i32, window_points: usize) -> String {
        format!(
            "{} rose from {} to {} across {} recent reports",
            symptom, from, to, window_points,
        )
    }

    /// Trigger text for a default-policy threshold.
    pub fn default_threshold(route: TriageRoute, severity: i32, threshold: i32) -> String {
        format!(
            "severity {} >= default {} threshold {}",
            severity,
            route.as_str(),
            threshold,
        )
    }

    pub fn human_escalation_patient() -> String {
        "This requires immediate attention from your care team.".to_string()
    }

    pub fn human_escalation_clinician(reason: &str) -> String {
        format!("ESCALATION: {}", reason)
    }

    pub fn escalation_acknowledgement() -> String {
        "Escalation received. Care team has been notified.".to_string()
    }

    pub fn escalation_estimated_response() -> String {
        "A clinician will contact you within 15 minutes.".to_string()
    }
}
