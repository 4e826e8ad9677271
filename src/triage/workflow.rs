use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{EventStore, TrendPoint};
use crate::models::enums::{EscalationSeverity, TaskUrgency, TriageRoute};
use crate::models::{
    EscalationRecord, Event, EventPayload, FollowupTask, Measurement, SymptomMeasurement,
    SymptomReport,
};
use crate::protocols::ProtocolRepository;
use crate::tasks::TaskQueue;

use super::audit::AuditRecorder;
use super::engine::TriageEngine;
use super::types::Decision;
use super::{TriageError, FLAG_RAPID_PROGRESSION};

/// Input to a full triage run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRequest {
    pub patient_id: String,
    #[serde(default)]
    pub chief_complaint: Option<String>,
    pub measurement: Measurement,
    /// Store the measurement as a symptom event before deciding.
    #[serde(default)]
    pub log_measurement: bool,
}

/// Everything a run touches. Callers serialise runs per patient.
pub struct TriageContext<'a> {
    pub engine: &'a TriageEngine,
    pub protocols: &'a ProtocolRepository,
    pub store: &'a mut EventStore,
    pub queue: &'a mut TaskQueue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageOutcome {
    pub decision: Decision,
    pub audit_event: Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup: Option<FollowupTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationRecord>,
}

/// Resolve, decide, record, then route yellow to a follow-up task and red to
/// one escalation.
pub fn run(request: &TriageRequest, ctx: TriageContext<'_>) -> Result<TriageOutcome, TriageError> {
    request.measurement.validate()?;
    let patient_id = request.patient_id.as_str();
    let complaint = request.chief_complaint.as_deref();

    let logged_event_id = if request.log_measurement {
        let m = &request.measurement;
        let event = Event::new(
            patient_id,
            EventPayload::Symptom(SymptomReport::single(SymptomMeasurement::new(
                m.name.clone(),
                m.severity,
                m.trend,
            ))),
        );
        Some(ctx.store.append(event)?)
    } else {
        None
    };

    let protocol = ctx.protocols.resolve(patient_id, complaint);
    let mut window = ctx.store.trend_for(
        patient_id,
        &request.measurement.name,
        ctx.engine.policy().decision_window_hours,
    );
    // A logged reading is already the latest point; otherwise add it here.
    if logged_event_id.is_none() {
        window = window.with_point(TrendPoint {
            timestamp: Utc::now(),
            severity: request.measurement.severity,
        });
    }
    let decision = ctx
        .engine
        .decide(patient_id, complaint, &request.measurement, protocol, &window)?;

    let audit_event = AuditRecorder::record(ctx.store, patient_id, &decision)?;

    let mut followup = None;
    let mut escalation = None;
    match decision.route {
        TriageRoute::Green => {}
        TriageRoute::Yellow => {
            let urgency = if decision.has_flag(FLAG_RAPID_PROGRESSION)
                || request.measurement.is_worsening()
            {
                TaskUrgency::Urgent
            } else {
                TaskUrgency::Routine
            };
            let summary = followup_summary(&decision);
            followup = Some(ctx.queue.create_followup_with_context(
                patient_id,
                urgency,
                &summary,
                Some(&decision.clinician_summary),
                Some(audit_event.id),
            )?);
        }
        TriageRoute::Red => {
            let severity = if decision.severity >= 10 {
                EscalationSeverity::Critical
            } else {
                EscalationSeverity::High
            };
            escalation = Some(ctx.queue.create_escalation_for(
                patient_id,
                &decision.clinician_summary,
                Some(severity),
                None,
                audit_event.id,
            )?);
        }
    }

    tracing::info!(
        patient_id = %patient_id,
        route = decision.route.as_str(),
        audit_event = %audit_event.id,
        followup = followup.is_some(),
        escalation = escalation.is_some(),
        "Triage workflow complete"
    );

    Ok(TriageOutcome {
        decision,
        audit_event,
        logged_event_id,
        followup,
        escalation,
    })
}

fn followup_summary(decision: &Decision) -> String {
    match &decision.escalation_trigger {
        Some(trigger) => format!(
            "Review {} (severity {}/10): {}",
            decision.symptom.to_lowercase(),
            decision.severity,
            trigger
        ),
        None => format!(
            "Review {} (severity {}/10)",
            decision.symptom.to_lowercase(),
            decision.severity
        ),
    }
}
