pub mod audit;
pub mod engine;
pub mod messages;
pub mod types;
pub mod workflow;

pub use audit::*;
pub use engine::*;
pub use messages::*;
pub use types::*;
pub use workflow::*;

use thiserror::Error;

use crate::events::StoreError;
use crate::models::ValidationError;
use crate::tasks::QueueError;

/// Safety flag names attached to decisions.
pub const FLAG_PROTOCOL_RED: &str = "protocol_red_threshold";
pub const FLAG_PROTOCOL_YELLOW: &str = "protocol_yellow_threshold";
pub const FLAG_RAPID_PROGRESSION: &str = "rapid_symptom_progression";
pub const FLAG_DEFAULT_POLICY: &str = "default_policy_applied";
pub const FLAG_UNEVALUABLE_CRITERION: &str = "unevaluable_protocol_criterion";
pub const FLAG_HUMAN_ESCALATION: &str = "human_escalation_triggered";

/// Workflow names written into workflow-result events.
pub const WORKFLOW_SYMPTOM_TRIAGE: &str = "symptom_triage";
pub const WORKFLOW_HUMAN_ESCALATION: &str = "human_escalation";

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Invalid triage input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event store error: {0}")]
    Store(#[from] StoreError),

    #[error("Task queue error: {0}")]
    Queue(#[from] QueueError),
}
