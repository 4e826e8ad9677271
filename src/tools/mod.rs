//! JSON tool surface over the triage core.
//!
//! Each call is `{tool_name, arguments}`; each answer is a [`ToolResponse`].

pub mod error;

pub use error::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::TriagePolicy;
use crate::events::EventStore;
use crate::models::enums::{
    ContactPreference, EscalationSeverity, EventKind, EventSource, TaskStatus, TaskUrgency,
    Trend, TriageRoute,
};
use crate::models::{
    check_required, Event, EventPayload, Protocol, SymptomMeasurement, SymptomReport,
    WellnessCheck,
};
use crate::patients::PatientRegistry;
use crate::protocols::ProtocolRepository;
use crate::tasks::TaskQueue;
use crate::triage::{
    self, AuditRecorder, Decision, TriageContext, TriageEngine, TriageRequest,
    WORKFLOW_SYMPTOM_TRIAGE,
};

pub const TOOL_NAMES: &[&str] = &[
    "get_patient_context",
    "get_care_plan_protocols",
    "get_recent_events",
    "log_symptom_event",
    "log_wellness_check",
    "log_workflow_result",
    "create_followup_task",
    "escalate_to_human",
    "triage_symptom",
    "transition_task",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

// ═══════════════════════════════════════════
// Argument shapes
// ═══════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct PatientArgs {
    patient_id: String,
}

#[derive(Debug, Deserialize)]
struct ProtocolArgs {
    patient_id: String,
    #[serde(default)]
    chief_complaint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentEventsArgs {
    patient_id: String,
    #[serde(default)]
    window_hours: Option<i64>,
    #[serde(default)]
    event_types: Option<Vec<EventKind>>,
}

#[derive(Debug, Deserialize)]
struct SymptomInput {
    name: String,
    severity: i32,
    #[serde(default)]
    trend: Option<Trend>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogSymptomArgs {
    patient_id: String,
    symptom: SymptomInput,
    #[serde(default)]
    source: Option<EventSource>,
}

#[derive(Debug, Deserialize)]
struct LogWellnessArgs {
    patient_id: String,
    wellness: WellnessCheck,
    #[serde(default)]
    source: Option<EventSource>,
}

fn full_confidence() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct WorkflowResultInput {
    route: TriageRoute,
    patient_summary: String,
    #[serde(default)]
    clinician_summary: Option<String>,
    #[serde(default)]
    safety_flags: Vec<String>,
    #[serde(default)]
    escalation_trigger: Option<String>,
    #[serde(default = "full_confidence")]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct LogWorkflowArgs {
    patient_id: String,
    result: WorkflowResultInput,
    #[serde(default)]
    workflow_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowupInput {
    #[serde(default)]
    urgency: Option<TaskUrgency>,
    summary: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    triggered_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct FollowupArgs {
    patient_id: String,
    task: FollowupInput,
}

#[derive(Debug, Deserialize)]
struct EscalationInput {
    reason: String,
    #[serde(default)]
    severity: Option<EscalationSeverity>,
    #[serde(default)]
    contact_preference: Option<ContactPreference>,
}

#[derive(Debug, Deserialize)]
struct EscalationArgs {
    patient_id: String,
    escalation: EscalationInput,
}

#[derive(Debug, Deserialize)]
struct TransitionArgs {
    task_id: Uuid,
    status: TaskStatus,
}

#[derive(Debug, Serialize)]
struct EscalationReceipt {
    escalation_id: Uuid,
    acknowledged: bool,
    message: String,
    estimated_response: Option<String>,
    workflow_result_id: Uuid,
}

fn args<T: DeserializeOwned>(value: &Value) -> Result<T, ToolError> {
    Ok(serde_json::from_value(value.clone())?)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    Ok(serde_json::to_value(value)?)
}

// ═══════════════════════════════════════════
// Core
// ═══════════════════════════════════════════

/// Everything a session needs, owned in one place.
pub struct TriageCore {
    pub engine: TriageEngine,
    pub protocols: ProtocolRepository,
    pub patients: PatientRegistry,
    pub store: EventStore,
    pub queue: TaskQueue,
}

impl TriageCore {
    pub fn new(
        policy: TriagePolicy,
        protocols: ProtocolRepository,
        patients: PatientRegistry,
        store: EventStore,
        queue: TaskQueue,
    ) -> Self {
        let store = store.with_default_window(policy.query_window_hours);
        Self {
            engine: TriageEngine::new(policy),
            protocols,
            patients,
            store,
            queue,
        }
    }

    /// Session with nothing persisted.
    pub fn in_memory(policy: TriagePolicy) -> Self {
        Self::new(
            policy,
            ProtocolRepository::default(),
            PatientRegistry::new(),
            EventStore::in_memory(),
            TaskQueue::in_memory(),
        )
    }

    /// Run one tool call. Never panics; failures become error envelopes.
    pub fn dispatch(&mut self, call: &ToolCall) -> ToolResponse {
        match self.invoke(call) {
            Ok(result) => ToolResponse::success(result),
            Err(err) => {
                tracing::warn!(tool = %call.tool_name, code = err.code(), error = %err, "Tool call failed");
                ToolResponse::failure(&err)
            }
        }
    }

    pub fn invoke(&mut self, call: &ToolCall) -> Result<Value, ToolError> {
        tracing::debug!(tool = %call.tool_name, "Tool call");
        let a = &call.arguments;
        match call.tool_name.as_str() {
            "get_patient_context" => {
                let a: PatientArgs = args(a)?;
                to_value(&self.patients.context(&a.patient_id)?)
            }
            "get_care_plan_protocols" => self.care_plan_protocols(args(a)?),
            "get_recent_events" => {
                let a: RecentEventsArgs = args(a)?;
                let events =
                    self.store
                        .query(&a.patient_id, a.window_hours, a.event_types.as_deref());
                to_value(&events)
            }
            "log_symptom_event" => self.log_symptom(args(a)?),
            "log_wellness_check" => {
                let a: LogWellnessArgs = args(a)?;
                let event = Event::new(&a.patient_id, EventPayload::Wellness(a.wellness))
                    .with_source(a.source.unwrap_or(EventSource::Manual));
                let id = self.store.append(event)?;
                to_value(&self.stored(id)?)
            }
            "log_workflow_result" => self.log_workflow_result(args(a)?),
            "create_followup_task" => {
                let a: FollowupArgs = args(a)?;
                let task = self.queue.create_followup_with_context(
                    &a.patient_id,
                    a.task.urgency.unwrap_or(TaskUrgency::Routine),
                    &a.task.summary,
                    a.task.context.as_deref(),
                    a.task.triggered_by,
                )?;
                to_value(&task)
            }
            "escalate_to_human" => self.escalate_to_human(args(a)?),
            "triage_symptom" => {
                let request: TriageRequest = args(a)?;
                let outcome = triage::run(
                    &request,
                    TriageContext {
                        engine: &self.engine,
                        protocols: &self.protocols,
                        store: &mut self.store,
                        queue: &mut self.queue,
                    },
                )?;
                to_value(&outcome)
            }
            "transition_task" => {
                let a: TransitionArgs = args(a)?;
                to_value(&self.queue.transition(&a.task_id, a.status)?)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    fn stored(&self, id: Uuid) -> Result<&Event, ToolError> {
        self.store
            .get(&id)
            .ok_or_else(|| ToolError::NotFound(format!("event {id}")))
    }

    fn care_plan_protocols(&self, a: ProtocolArgs) -> Result<Value, ToolError> {
        self.patients.get(&a.patient_id)?;
        let protocols: Vec<&Protocol> = match a.chief_complaint.as_deref() {
            Some(c) if !c.trim().is_empty() => {
                self.protocols.resolve(&a.patient_id, Some(c)).into_iter().collect()
            }
            _ => self.protocols.for_patient(&a.patient_id),
        };
        to_value(&protocols)
    }

    fn log_symptom(&mut self, a: LogSymptomArgs) -> Result<Value, ToolError> {
        let mut measurement =
            SymptomMeasurement::new(a.symptom.name, a.symptom.severity, a.symptom.trend);
        measurement.raw_text = a.symptom.notes;
        let event = Event::new(
            &a.patient_id,
            EventPayload::Symptom(SymptomReport::single(measurement)),
        )
        .with_source(a.source.unwrap_or(EventSource::Manual));
        let id = self.store.append(event)?;
        to_value(&self.stored(id)?)
    }

    fn log_workflow_result(&mut self, a: LogWorkflowArgs) -> Result<Value, ToolError> {
        let r = a.result;
        let decision = Decision {
            route: r.route,
            clinician_summary: r.clinician_summary.unwrap_or_else(|| r.patient_summary.clone()),
            patient_summary: r.patient_summary,
            safety_flags: r.safety_flags.into_iter().collect(),
            escalation_trigger: r.escalation_trigger,
            confidence: r.confidence,
            chief_complaint: None,
            symptom: String::new(),
            severity: 0,
        };
        let workflow_name = a
            .workflow_name
            .unwrap_or_else(|| WORKFLOW_SYMPTOM_TRIAGE.to_string());
        let event =
            AuditRecorder::record_named(&mut self.store, &a.patient_id, &workflow_name, &decision)?;
        to_value(&event)
    }

    fn escalate_to_human(&mut self, a: EscalationArgs) -> Result<Value, ToolError> {
        let e = a.escalation;
        // Checked before the audit event so a rejected request leaves no trace.
        check_required("reason", &e.reason)?;
        let event = AuditRecorder::record_human_escalation(&mut self.store, &a.patient_id, &e.reason)?;
        let record = self.queue.create_escalation_for(
            &a.patient_id,
            &e.reason,
            e.severity,
            e.contact_preference,
            event.id,
        )?;
        to_value(&EscalationReceipt {
            escalation_id: record.id,
            acknowledged: true,
            message: record.acknowledgement,
            estimated_response: record.estimated_response,
            workflow_result_id: event.id,
        })
    }
}
