use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EventKind, EventSource, LifestyleCategory, Trend, TriageRoute};
use super::{
    check_probability, check_range, check_required, ValidationError, MOOD_MAX, MOOD_MIN,
    SCALE_MAX, SCALE_MIN,
};

/// Default scale label attached to severities reported on the 0–10 scale.
pub const DEFAULT_SEVERITY_SCALE: &str = "0_10";

// ═══════════════════════════════════════════
// Event envelope
// ═══════════════════════════════════════════

/// A timestamped clinical event in a patient's record.
///
/// The envelope fields are shared; everything kind-specific lives in
/// [`EventPayload`], so a treatment event can never carry symptom fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// `Uuid::nil()` until the store assigns an id.
    pub id: Uuid,
    pub patient_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    Symptom(SymptomReport),
    Wellness(WellnessCheck),
    Treatment(Treatment),
    Lifestyle(LifestyleEntry),
    WorkflowResult(WorkflowResult),
}

impl Event {
    /// New unsaved event stamped now, sourced `manual`.
    pub fn new(patient_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::nil(),
            patient_id: patient_id.into(),
            timestamp: Utc::now(),
            source: EventSource::Manual,
            confidence: None,
            payload,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Symptom(_) => EventKind::Symptom,
            EventPayload::Wellness(_) => EventKind::Wellness,
            EventPayload::Treatment(_) => EventKind::Treatment,
            EventPayload::Lifestyle(_) => EventKind::Lifestyle,
            EventPayload::WorkflowResult(_) => EventKind::WorkflowResult,
        }
    }

    pub fn as_symptom(&self) -> Option<&SymptomReport> {
        match &self.payload {
            EventPayload::Symptom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_workflow_result(&self) -> Option<&WorkflowResult> {
        match &self.payload {
            EventPayload::WorkflowResult(w) => Some(w),
            _ => None,
        }
    }

    /// Checks envelope and payload invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_required("patient_id", &self.patient_id)?;
        if let Some(confidence) = self.confidence {
            check_probability("confidence", confidence)?;
        }
        match &self.payload {
            EventPayload::Symptom(s) => s.validate(),
            EventPayload::Wellness(w) => w.validate(),
            EventPayload::Treatment(t) => t.validate(),
            EventPayload::Lifestyle(l) => l.validate(),
            EventPayload::WorkflowResult(w) => w.validate(),
        }
    }
}

// ═══════════════════════════════════════════
// Symptom
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomReport {
    pub measurements: Vec<SymptomMeasurement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomMeasurement {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Severity {
    pub value: i32,
    #[serde(default = "default_scale")]
    pub scale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_scale() -> String {
    DEFAULT_SEVERITY_SCALE.to_string()
}

impl Severity {
    pub fn on_default_scale(value: i32) -> Self {
        Self {
            value,
            scale: default_scale(),
            label: None,
        }
    }
}

impl SymptomMeasurement {
    pub fn new(name: impl Into<String>, severity: i32, trend: Option<Trend>) -> Self {
        Self {
            name: name.into(),
            severity: Some(Severity::on_default_scale(severity)),
            trend,
            raw_text: None,
        }
    }
}

impl SymptomReport {
    pub fn single(measurement: SymptomMeasurement) -> Self {
        Self {
            measurements: vec![measurement],
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.measurements.is_empty() {
            return Err(ValidationError::MissingField("measurements".into()));
        }
        for m in &self.measurements {
            check_required("measurement.name", &m.name)?;
            if let Some(ref severity) = m.severity {
                check_range("severity", severity.value, SCALE_MIN, SCALE_MAX)?;
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Wellness
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessCheck {
    pub mood: i32,
    pub anxiety: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl WellnessCheck {
    fn validate(&self) -> Result<(), ValidationError> {
        check_range("mood", self.mood, MOOD_MIN, MOOD_MAX)?;
        check_range("anxiety", self.anxiety, SCALE_MIN, SCALE_MAX)
    }
}

// ═══════════════════════════════════════════
// Treatment
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub name: String,
    pub timing: TreatmentTiming,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A treatment happens at one instant or spans an interval, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreatmentTiming {
    Point {
        at: DateTime<Utc>,
    },
    Interval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Treatment {
    fn validate(&self) -> Result<(), ValidationError> {
        check_required("treatment.name", &self.name)?;
        if let TreatmentTiming::Interval { start, end } = self.timing {
            if start > end {
                return Err(ValidationError::InvertedInterval { start, end });
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Lifestyle
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifestyleEntry {
    pub name: String,
    pub category: LifestyleCategory,
    #[serde(default)]
    pub details: String,
}

impl LifestyleEntry {
    fn validate(&self) -> Result<(), ValidationError> {
        check_required("lifestyle.name", &self.name)
    }
}

// ═══════════════════════════════════════════
// Workflow result (audit artifact)
// ═══════════════════════════════════════════

/// Audit artifact recording one triage decision.
///
/// Fields are crate-private: the only producer is the audit recorder, and
/// readers go through the accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub(crate) workflow_name: String,
    pub(crate) route: TriageRoute,
    pub(crate) patient_summary: String,
    pub(crate) clinician_summary: String,
    pub(crate) safety_flags: BTreeSet<String>,
    #[serde(default)]
    pub(crate) escalation_trigger: Option<String>,
    /// Serialized apart from the envelope's own `confidence`.
    #[serde(rename = "triage_confidence")]
    pub(crate) confidence: f64,
}

impl WorkflowResult {
    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn route(&self) -> TriageRoute {
        self.route
    }

    pub fn patient_summary(&self) -> &str {
        &self.patient_summary
    }

    pub fn clinician_summary(&self) -> &str {
        &self.clinician_summary
    }

    pub fn safety_flags(&self) -> &BTreeSet<String> {
        &self.safety_flags
    }

    pub fn escalation_trigger(&self) -> Option<&str> {
        self.escalation_trigger.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_required("workflow_name", &self.workflow_name)?;
        check_probability("triage_confidence", self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn symptom(name: &str, severity: i32) -> Event {
        Event::new(
            "patient-1",
            EventPayload::Symptom(SymptomReport::single(SymptomMeasurement::new(
                name,
                severity,
                Some(Trend::Worsening),
            ))),
        )
    }

    #[test]
    fn new_event_has_nil_id_and_manual_source() {
        let event = symptom("Headache", 3);
        assert!(event.id.is_nil());
        assert_eq!(event.source, EventSource::Manual);
        assert_eq!(event.kind(), EventKind::Symptom);
    }

    #[test]
    fn severity_above_ten_is_rejected() {
        let err = symptom("Headache", 11).validate().unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "severity"));
    }

    #[test]
    fn negative_severity_is_rejected() {
        assert!(symptom("Headache", -1).validate().is_err());
    }

    #[test]
    fn measurement_without_severity_is_valid() {
        let mut measurement = SymptomMeasurement::new("Fatigue", 0, None);
        measurement.severity = None;
        let event = Event::new(
            "patient-1",
            EventPayload::Symptom(SymptomReport::single(measurement)),
        );
        assert!(event.validate().is_ok());
    }

    #[test]
    fn empty_symptom_report_is_rejected() {
        let event = Event::new(
            "patient-1",
            EventPayload::Symptom(SymptomReport {
                measurements: vec![],
            }),
        );
        assert_eq!(
            event.validate(),
            Err(ValidationError::MissingField("measurements".into()))
        );
    }

    #[test]
    fn wellness_ranges() {
        let ok = Event::new(
            "patient-1",
            EventPayload::Wellness(WellnessCheck {
                mood: 3,
                anxiety: 6,
                notes: None,
            }),
        );
        assert!(ok.validate().is_ok());

        let bad_mood = Event::new(
            "patient-1",
            EventPayload::Wellness(WellnessCheck {
                mood: 0,
                anxiety: 6,
                notes: None,
            }),
        );
        assert!(bad_mood.validate().is_err());

        let bad_anxiety = Event::new(
            "patient-1",
            EventPayload::Wellness(WellnessCheck {
                mood: 5,
                anxiety: 11,
                notes: None,
            }),
        );
        assert!(bad_anxiety.validate().is_err());
    }

    #[test]
    fn inverted_treatment_interval_is_rejected() {
        let end = Utc::now();
        let start = end + Duration::hours(2);
        let event = Event::new(
            "patient-1",
            EventPayload::Treatment(Treatment {
                name: "Carboplatin infusion".into(),
                timing: TreatmentTiming::Interval { start, end },
                notes: None,
            }),
        );
        assert_eq!(
            event.validate(),
            Err(ValidationError::InvertedInterval { start, end })
        );
    }

    #[test]
    fn point_treatment_is_valid() {
        let event = Event::new(
            "patient-1",
            EventPayload::Treatment(Treatment {
                name: "Ondansetron".into(),
                timing: TreatmentTiming::Point { at: Utc::now() },
                notes: Some("8mg".into()),
            }),
        );
        assert!(event.validate().is_ok());
    }

    #[test]
    fn envelope_confidence_must_be_probability() {
        let event = symptom("Nausea", 4).with_confidence(1.5);
        assert!(matches!(
            event.validate(),
            Err(ValidationError::InvalidProbability { .. })
        ));
    }

    #[test]
    fn blank_patient_is_rejected() {
        let event = Event::new(
            " ",
            EventPayload::Lifestyle(LifestyleEntry {
                name: "Walk".into(),
                category: LifestyleCategory::Exercise,
                details: String::new(),
            }),
        );
        assert_eq!(
            event.validate(),
            Err(ValidationError::MissingField("patient_id".into()))
        );
    }

    #[test]
    fn json_shape_is_tagged_by_event_type() {
        let event = symptom("Headache", 7);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "symptom");
        assert_eq!(value["measurements"][0]["severity"]["value"], 7);
        assert_eq!(value["measurements"][0]["severity"]["scale"], "0_10");
        assert_eq!(value["measurements"][0]["trend"], "worsening");

        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn treatment_timing_json_is_tagged_by_kind() {
        let at = Utc::now();
        let event = Event::new(
            "patient-1",
            EventPayload::Treatment(Treatment {
                name: "Pemetrexed".into(),
                timing: TreatmentTiming::Point { at },
                notes: None,
            }),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "treatment");
        assert_eq!(value["timing"]["kind"], "point");
    }

    #[test]
    fn workflow_result_confidence_does_not_clash_with_envelope() {
        let event = Event::new(
            "patient-1",
            EventPayload::WorkflowResult(WorkflowResult {
                workflow_name: "symptom_triage".into(),
                route: TriageRoute::Yellow,
                patient_summary: "We will follow up.".into(),
                clinician_summary: "YELLOW: Nausea 6/10.".into(),
                safety_flags: BTreeSet::from(["protocol_yellow_threshold".to_string()]),
                escalation_trigger: Some("severity >= 5".into()),
                confidence: 0.95,
            }),
        )
        .with_source(EventSource::Generated)
        .with_confidence(0.95);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "workflow_result");
        assert_eq!(value["triage_confidence"], 0.95);
        assert_eq!(value["safety_flags"][0], "protocol_yellow_threshold");

        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
