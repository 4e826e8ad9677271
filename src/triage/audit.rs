use std::collections::BTreeSet;

use uuid::Uuid;

use crate::events::EventStore;
use crate::models::enums::{EventSource, TriageRoute};
use crate::models::{Event, EventPayload, WorkflowResult};

use super::messages::MessageTemplates;
use super::types::Decision;
use super::{TriageError, FLAG_HUMAN_ESCALATION, WORKFLOW_HUMAN_ESCALATION, WORKFLOW_SYMPTOM_TRIAGE};

/// Turns decisions into immutable workflow-result events.
///
/// This is the only place a [`WorkflowResult`] is built.
pub struct AuditRecorder;

impl AuditRecorder {
    /// Record a symptom-triage decision. Returns the stored event.
    pub fn record(
        store: &mut EventStore,
        patient_id: &str,
        decision: &Decision,
    ) -> Result<Event, TriageError> {
        Self::record_named(store, patient_id, WORKFLOW_SYMPTOM_TRIAGE, decision)
    }

    pub fn record_named(
        store: &mut EventStore,
        patient_id: &str,
        workflow_name: &str,
        decision: &Decision,
    ) -> Result<Event, TriageError> {
        let result = WorkflowResult {
            workflow_name: workflow_name.to_string(),
            route: decision.route,
            patient_summary: decision.patient_summary.clone(),
            clinician_summary: decision.clinician_summary.clone(),
            safety_flags: decision.safety_flags.clone(),
            escalation_trigger: decision.escalation_trigger.clone(),
            confidence: decision.confidence,
        };
        let event = Event::new(patient_id, EventPayload::WorkflowResult(result))
            .with_id(Uuid::new_v4())
            .with_source(EventSource::Generated)
            .with_confidence(decision.confidence);

        let stored = event.clone();
        store.append(event)?;

        tracing::info!(
            event_id = %stored.id,
            patient_id = %patient_id,
            workflow = %workflow_name,
            route = decision.route.as_str(),
            "Workflow result recorded"
        );
        Ok(stored)
    }

    /// Record a hand-off to a human clinician as a red workflow result.
    pub fn record_human_escalation(
        store: &mut EventStore,
        patient_id: &str,
        reason: &str,
    ) -> Result<Event, TriageError> {
        let decision = Decision {
            route: TriageRoute::Red,
            patient_summary: MessageTemplates::human_escalation_patient(),
            clinician_summary: MessageTemplates::human_escalation_clinician(reason),
            safety_flags: BTreeSet::from([FLAG_HUMAN_ESCALATION.to_string()]),
            escalation_trigger: Some(reason.to_string()),
            confidence: 1.0,
            chief_complaint: None,
            symptom: String::new(),
            severity: 0,
        };
        Self::record_named(store, patient_id, WORKFLOW_HUMAN_ESCALATION, &decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::EventKind;
    use crate::persistence::MemoryPersistence;

    fn yellow_decision() -> Decision {
        Decision {
            route: TriageRoute::Yellow,
            patient_summary: "We will follow up.".into(),
            clinician_summary: "YELLOW: Headache severity 5/10.".into(),
            safety_flags: BTreeSet::from(["protocol_yellow_threshold".to_string()]),
            escalation_trigger: Some("severity >= 4".into()),
            confidence: 0.95,
            chief_complaint: Some("Headache".into()),
            symptom: "Headache".into(),
            severity: 5,
        }
    }

    #[test]
    fn record_appends_exactly_one_workflow_result() {
        let mut store = EventStore::in_memory();
        let event = AuditRecorder::record(&mut store, "p1", &yellow_decision()).unwrap();

        let results = store.query("p1", None, Some(&[EventKind::WorkflowResult]));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, event.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn recorded_event_mirrors_decision() {
        let mut store = EventStore::in_memory();
        let event = AuditRecorder::record(&mut store, "p1", &yellow_decision()).unwrap();

        assert_eq!(event.source, EventSource::Generated);
        let result = event.as_workflow_result().unwrap();
        assert_eq!(result.workflow_name(), "symptom_triage");
        assert_eq!(result.route(), TriageRoute::Yellow);
        assert_eq!(result.escalation_trigger(), Some("severity >= 4"));
        assert_eq!(result.confidence(), 0.95);
        assert!(result.safety_flags().contains("protocol_yellow_threshold"));
    }

    #[test]
    fn each_call_creates_a_new_event() {
        let mut store = EventStore::in_memory();
        let a = AuditRecorder::record(&mut store, "p1", &yellow_decision()).unwrap();
        let b = AuditRecorder::record(&mut store, "p1", &yellow_decision()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn human_escalation_is_red_with_flag() {
        let mut store = EventStore::in_memory();
        let event =
            AuditRecorder::record_human_escalation(&mut store, "p1", "Patient reports chest pain")
                .unwrap();
        let result = event.as_workflow_result().unwrap();
        assert_eq!(result.workflow_name(), "human_escalation");
        assert_eq!(result.route(), TriageRoute::Red);
        assert!(result.safety_flags().contains(FLAG_HUMAN_ESCALATION));
        assert_eq!(result.clinician_summary(), "ESCALATION: Patient reports chest pain");
    }

    #[test]
    fn failed_flush_records_nothing() {
        let hook = std::rc::Rc::new(MemoryPersistence::new());
        hook.set_failing(true);
        let mut store = EventStore::open(Box::new(std::rc::Rc::clone(&hook))).unwrap();

        let result = AuditRecorder::record(&mut store, "p1", &yellow_decision());
        assert!(matches!(result, Err(TriageError::Store(_))));
        assert!(store.is_empty());
    }
}
