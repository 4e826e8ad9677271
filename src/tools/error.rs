use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::StoreError;
use crate::models::ValidationError;
use crate::patients::PatientError;
use crate::persistence::PersistenceError;
use crate::tasks::QueueError;
use crate::triage::TriageError;

/// Response envelope: `{ok: true, result}` or `{ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ToolResponse {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(err: &ToolError) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorDetail {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// Tool-level errors with stable codes.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Storage error: {0}")]
    Persistence(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::Validation(_) => "VALIDATION",
            ToolError::NotFound(_) => "NOT_FOUND",
            ToolError::InvalidTransition(_) => "INVALID_TRANSITION",
            ToolError::BadRequest(_) => "BAD_REQUEST",
            ToolError::Persistence(_) => "PERSISTENCE",
            ToolError::UnknownTool(_) => "UNKNOWN_TOOL",
        }
    }
}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        ToolError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::BadRequest(err.to_string())
    }
}

impl From<PersistenceError> for ToolError {
    fn from(err: PersistenceError) -> Self {
        tracing::error!(error = %err, "Tool persistence failure");
        ToolError::Persistence(err.to_string())
    }
}

impl From<StoreError> for ToolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => e.into(),
            StoreError::DuplicateId(id) => {
                ToolError::Validation(format!("Event {id} already exists"))
            }
            StoreError::Persistence(e) => e.into(),
        }
    }
}

impl From<QueueError> for ToolError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Validation(e) => e.into(),
            QueueError::NotFound(id) => ToolError::NotFound(format!("task {id}")),
            e @ QueueError::InvalidTransition { .. } => ToolError::InvalidTransition(e.to_string()),
            e @ QueueError::DuplicateEscalation(_) => ToolError::Validation(e.to_string()),
            QueueError::Persistence(e) => e.into(),
        }
    }
}

impl From<TriageError> for ToolError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::Validation(e) => e.into(),
            TriageError::Store(e) => e.into(),
            TriageError::Queue(e) => e.into(),
        }
    }
}

impl From<PatientError> for ToolError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound(id) => ToolError::NotFound(format!("patient {id}")),
            PatientError::Validation(e) => e.into(),
            e @ PatientError::Load(..) => ToolError::BadRequest(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::TaskStatus;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ToolError::Validation("x".into()).code(), "VALIDATION");
        assert_eq!(ToolError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(ToolError::UnknownTool("x".into()).code(), "UNKNOWN_TOOL");
    }

    #[test]
    fn invalid_transition_maps_to_its_code() {
        let err: ToolError = QueueError::InvalidTransition {
            from: TaskStatus::Completed,
            to: TaskStatus::Pending,
        }
        .into();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(err.to_string(), "Cannot move task from completed to pending");
    }

    #[test]
    fn failure_envelope_shape() {
        let response = ToolResponse::failure(&ToolError::NotFound("patient p9".into()));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Not found: patient p9");
        assert!(json.get("result").is_none());
    }
}
