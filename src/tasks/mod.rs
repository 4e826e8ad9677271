//! Clinician follow-up tasks and human escalations fed by triage decisions.

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::enums::{ContactPreference, EscalationSeverity, TaskStatus, TaskUrgency};
use crate::models::{check_required, EscalationRecord, FollowupTask, ValidationError};
use crate::persistence::{NullPersistence, PersistenceError, QueuePersistence};
use crate::triage::MessageTemplates;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid task input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Task not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Workflow result {0} already has an escalation")]
    DuplicateEscalation(Uuid),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

pub struct TaskQueue {
    tasks: Vec<FollowupTask>,
    escalations: Vec<EscalationRecord>,
    hook: Box<dyn QueuePersistence>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("tasks", &self.tasks.len())
            .field("escalations", &self.escalations.len())
            .finish()
    }
}

impl TaskQueue {
    pub fn open(hook: Box<dyn QueuePersistence>) -> Result<Self, QueueError> {
        let snapshot = hook.load_queue()?;
        tracing::info!(
            tasks = snapshot.tasks.len(),
            escalations = snapshot.escalations.len(),
            "Task queue opened"
        );
        Ok(Self {
            tasks: snapshot.tasks,
            escalations: snapshot.escalations,
            hook,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            tasks: Vec::new(),
            escalations: Vec::new(),
            hook: Box::new(NullPersistence),
        }
    }

    pub fn create_followup(
        &mut self,
        patient_id: &str,
        urgency: TaskUrgency,
        summary: &str,
        triggered_by: Option<Uuid>,
    ) -> Result<FollowupTask, QueueError> {
        self.create_followup_with_context(patient_id, urgency, summary, None, triggered_by)
    }

    pub fn create_followup_with_context(
        &mut self,
        patient_id: &str,
        urgency: TaskUrgency,
        summary: &str,
        context: Option<&str>,
        triggered_by: Option<Uuid>,
    ) -> Result<FollowupTask, QueueError> {
        check_required("patient_id", patient_id)?;
        check_required("summary", summary)?;

        let now = Utc::now();
        let task = FollowupTask {
            id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            urgency,
            summary: summary.to_string(),
            context: context.map(str::to_string),
            triggered_by,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.hook.save_task(&task)?;
        self.tasks.push(task.clone());

        tracing::info!(
            task_id = %task.id,
            patient_id = %patient_id,
            urgency = urgency.as_str(),
            "Follow-up task created"
        );
        Ok(task)
    }

    /// Raise an escalation not tied to a recorded decision.
    pub fn create_escalation(
        &mut self,
        patient_id: &str,
        reason: &str,
        severity: Option<EscalationSeverity>,
        contact_preference: Option<ContactPreference>,
    ) -> Result<EscalationRecord, QueueError> {
        self.raise(patient_id, reason, severity, contact_preference, None)
    }

    /// Raise the escalation for one workflow result. A second call for the
    /// same result is refused.
    pub fn create_escalation_for(
        &mut self,
        patient_id: &str,
        reason: &str,
        severity: Option<EscalationSeverity>,
        contact_preference: Option<ContactPreference>,
        triggered_by: Uuid,
    ) -> Result<EscalationRecord, QueueError> {
        if self
            .escalations
            .iter()
            .any(|e| e.triggered_by == Some(triggered_by))
        {
            return Err(QueueError::DuplicateEscalation(triggered_by));
        }
        self.raise(patient_id, reason, severity, contact_preference, Some(triggered_by))
    }

    fn raise(
        &mut self,
        patient_id: &str,
        reason: &str,
        severity: Option<EscalationSeverity>,
        contact_preference: Option<ContactPreference>,
        triggered_by: Option<Uuid>,
    ) -> Result<EscalationRecord, QueueError> {
        check_required("patient_id", patient_id)?;
        check_required("reason", reason)?;

        let record = EscalationRecord {
            id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            reason: reason.to_string(),
            severity: severity.unwrap_or(EscalationSeverity::High),
            contact_preference,
            triggered_by,
            created_at: Utc::now(),
            acknowledgement: MessageTemplates::escalation_acknowledgement(),
            estimated_response: Some(MessageTemplates::escalation_estimated_response()),
        };

        self.hook.save_escalation(&record)?;
        self.escalations.push(record.clone());

        tracing::info!(
            escalation_id = %record.id,
            patient_id = %patient_id,
            severity = record.severity.as_str(),
            "Escalation raised"
        );
        Ok(record)
    }

    /// Move a task to `next`. Illegal moves leave the task untouched.
    pub fn transition(&mut self, task_id: &Uuid, next: TaskStatus) -> Result<FollowupTask, QueueError> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == *task_id)
            .ok_or(QueueError::NotFound(*task_id))?;

        let current = self.tasks[index].status;
        if !current.can_transition_to(next) {
            tracing::warn!(
                task_id = %task_id,
                from = current.as_str(),
                to = next.as_str(),
                "Rejected task transition"
            );
            return Err(QueueError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        let mut updated = self.tasks[index].clone();
        updated.status = next;
        updated.updated_at = Utc::now();
        self.hook.save_task(&updated)?;
        self.tasks[index] = updated.clone();

        tracing::info!(
            task_id = %task_id,
            from = current.as_str(),
            to = next.as_str(),
            "Task transitioned"
        );
        Ok(updated)
    }

    pub fn get_task(&self, task_id: &Uuid) -> Option<&FollowupTask> {
        self.tasks.iter().find(|t| t.id == *task_id)
    }

    /// Tasks for a patient in creation order, optionally by status.
    pub fn tasks_for(&self, patient_id: &str, status: Option<TaskStatus>) -> Vec<&FollowupTask> {
        self.tasks
            .iter()
            .filter(|t| t.patient_id == patient_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .collect()
    }

    pub fn get_escalation(&self, id: &Uuid) -> Option<&EscalationRecord> {
        self.escalations.iter().find(|e| e.id == *id)
    }

    pub fn escalations_for(&self, patient_id: &str) -> Vec<&EscalationRecord> {
        self.escalations
            .iter()
            .filter(|e| e.patient_id == patient_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::persistence::MemoryPersistence;

    fn queue_with_task() -> (TaskQueue, FollowupTask) {
        let mut queue = TaskQueue::in_memory();
        let task = queue
            .create_followup("p1", TaskUrgency::Routine, "Review nausea", None)
            .unwrap();
        (queue, task)
    }

    #[test]
    fn new_task_is_pending() {
        let (queue, task) = queue_with_task();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(queue.get_task(&task.id), Some(&task));
    }

    #[test]
    fn context_is_kept() {
        let mut queue = TaskQueue::in_memory();
        let task = queue
            .create_followup_with_context(
                "p1",
                TaskUrgency::Urgent,
                "Review headache progression",
                Some("Severity went from 3 to 7 since last infusion"),
                Some(Uuid::new_v4()),
            )
            .unwrap();
        assert_eq!(
            task.context.as_deref(),
            Some("Severity went from 3 to 7 since last infusion")
        );
        assert!(task.triggered_by.is_some());
    }

    #[test]
    fn blank_summary_is_rejected() {
        let mut queue = TaskQueue::in_memory();
        let result = queue.create_followup("p1", TaskUrgency::Routine, " ", None);
        assert!(matches!(result, Err(QueueError::Validation(_))));
        assert!(queue.tasks_for("p1", None).is_empty());
    }

    #[test]
    fn pending_to_completed_succeeds_once() {
        let (mut queue, task) = queue_with_task();
        let done = queue.transition(&task.id, TaskStatus::Completed).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let again = queue.transition(&task.id, TaskStatus::Completed);
        assert!(matches!(again, Err(QueueError::InvalidTransition { .. })));
    }

    #[test]
    fn completed_to_pending_fails_and_status_unchanged() {
        let (mut queue, task) = queue_with_task();
        queue.transition(&task.id, TaskStatus::Completed).unwrap();

        let result = queue.transition(&task.id, TaskStatus::Pending);
        assert!(matches!(
            result,
            Err(QueueError::InvalidTransition {
                from: TaskStatus::Completed,
                to: TaskStatus::Pending
            })
        ));
        assert_eq!(queue.get_task(&task.id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn in_progress_path() {
        let (mut queue, task) = queue_with_task();
        queue.transition(&task.id, TaskStatus::InProgress).unwrap();
        assert!(queue.transition(&task.id, TaskStatus::Pending).is_err());
        let cancelled = queue.transition(&task.id, TaskStatus::Cancelled).unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
    }

    #[test]
    fn unknown_task_is_not_found() {
        let mut queue = TaskQueue::in_memory();
        let id = Uuid::new_v4();
        assert!(matches!(
            queue.transition(&id, TaskStatus::Completed),
            Err(QueueError::NotFound(missing)) if missing == id
        ));
    }

    #[test]
    fn tasks_filter_by_status() {
        let (mut queue, task) = queue_with_task();
        queue
            .create_followup("p1", TaskUrgency::Urgent, "Check fever", None)
            .unwrap();
        queue
            .create_followup("p2", TaskUrgency::Routine, "Other patient", None)
            .unwrap();
        queue.transition(&task.id, TaskStatus::InProgress).unwrap();

        assert_eq!(queue.tasks_for("p1", None).len(), 2);
        assert_eq!(queue.tasks_for("p1", Some(TaskStatus::Pending)).len(), 1);
        assert_eq!(queue.tasks_for("p1", Some(TaskStatus::InProgress))[0].id, task.id);
    }

    #[test]
    fn escalation_defaults_to_high_with_acknowledgement() {
        let mut queue = TaskQueue::in_memory();
        let record = queue
            .create_escalation("p1", "Chest pain", None, Some(ContactPreference::Call))
            .unwrap();
        assert_eq!(record.severity, EscalationSeverity::High);
        assert_eq!(
            record.acknowledgement,
            "Escalation received. Care team has been notified."
        );
        assert_eq!(queue.get_escalation(&record.id), Some(&record));
        assert_eq!(queue.escalations_for("p1").len(), 1);
    }

    #[test]
    fn second_escalation_for_same_result_is_refused() {
        let mut queue = TaskQueue::in_memory();
        let trigger = Uuid::new_v4();
        queue
            .create_escalation_for("p1", "Severity 10", Some(EscalationSeverity::Critical), None, trigger)
            .unwrap();
        let again = queue.create_escalation_for("p1", "Severity 10", None, None, trigger);
        assert!(matches!(again, Err(QueueError::DuplicateEscalation(id)) if id == trigger));
        assert_eq!(queue.escalations_for("p1").len(), 1);
    }

    #[test]
    fn failed_save_leaves_queue_unchanged() {
        let hook = Rc::new(MemoryPersistence::new());
        let mut queue = TaskQueue::open(Box::new(Rc::clone(&hook))).unwrap();
        let task = queue
            .create_followup("p1", TaskUrgency::Routine, "Review nausea", None)
            .unwrap();

        hook.set_failing(true);
        assert!(matches!(
            queue.transition(&task.id, TaskStatus::Completed),
            Err(QueueError::Persistence(_))
        ));
        assert_eq!(queue.get_task(&task.id).unwrap().status, TaskStatus::Pending);
        assert!(queue.create_escalation("p1", "Chest pain", None, None).is_err());
        assert!(queue.escalations_for("p1").is_empty());
    }

    #[test]
    fn open_restores_saved_queue() {
        let hook = Rc::new(MemoryPersistence::new());
        let task_id = {
            let mut queue = TaskQueue::open(Box::new(Rc::clone(&hook))).unwrap();
            let task = queue
                .create_followup("p1", TaskUrgency::Stat, "Call patient", None)
                .unwrap();
            queue.transition(&task.id, TaskStatus::InProgress).unwrap();
            queue.create_escalation("p1", "Fever 39C", None, None).unwrap();
            task.id
        };

        let queue = TaskQueue::open(Box::new(hook)).unwrap();
        assert_eq!(queue.get_task(&task_id).unwrap().status, TaskStatus::InProgress);
        assert_eq!(queue.escalations_for("p1").len(), 1);
    }
}
