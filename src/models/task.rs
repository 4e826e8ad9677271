use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ContactPreference, EscalationSeverity, TaskStatus, TaskUrgency};

/// A clinician-queue item created from a yellow (or red) decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowupTask {
    pub id: Uuid,
    pub patient_id: String,
    pub urgency: TaskUrgency,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Workflow-result event that caused this task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<Uuid>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Human-facing notification raised for a red route.
///
/// Delivery belongs to whoever consumes the queue; the record is never
/// retried from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: Uuid,
    pub patient_id: String,
    pub reason: String,
    pub severity: EscalationSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_preference: Option<ContactPreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub acknowledgement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_response: Option<String>,
}
