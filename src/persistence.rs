//! Load/save hooks through which the in-memory stores reach durable storage.
//!
//! The event store and the task queue never choose a storage format; they are
//! handed an implementation of these traits at construction and call it after
//! every mutation. A failed save is reported back so the caller can roll its
//! in-memory change back.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{EscalationRecord, Event, FollowupTask};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Tasks and escalations as loaded at session start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    pub tasks: Vec<FollowupTask>,
    pub escalations: Vec<EscalationRecord>,
}

pub trait EventPersistence {
    /// Every stored event, each patient's events in arrival order.
    fn load_events(&self) -> Result<Vec<Event>, PersistenceError>;

    /// Replace the stored log of one patient with `events`.
    fn save_patient_events(&self, patient_id: &str, events: &[Event])
        -> Result<(), PersistenceError>;
}

pub trait QueuePersistence {
    fn load_queue(&self) -> Result<QueueSnapshot, PersistenceError>;

    /// Insert or update one task.
    fn save_task(&self, task: &FollowupTask) -> Result<(), PersistenceError>;

    fn save_escalation(&self, escalation: &EscalationRecord) -> Result<(), PersistenceError>;
}

impl<T: EventPersistence + ?Sized> EventPersistence for Rc<T> {
    fn load_events(&self) -> Result<Vec<Event>, PersistenceError> {
        (**self).load_events()
    }

    fn save_patient_events(
        &self,
        patient_id: &str,
        events: &[Event],
    ) -> Result<(), PersistenceError> {
        (**self).save_patient_events(patient_id, events)
    }
}

impl<T: QueuePersistence + ?Sized> QueuePersistence for Rc<T> {
    fn load_queue(&self) -> Result<QueueSnapshot, PersistenceError> {
        (**self).load_queue()
    }

    fn save_task(&self, task: &FollowupTask) -> Result<(), PersistenceError> {
        (**self).save_task(task)
    }

    fn save_escalation(&self, escalation: &EscalationRecord) -> Result<(), PersistenceError> {
        (**self).save_escalation(escalation)
    }
}

// ═══════════════════════════════════════════
// No-op hook
// ═══════════════════════════════════════════

/// Keeps nothing. Used by purely in-memory sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersistence;

impl EventPersistence for NullPersistence {
    fn load_events(&self) -> Result<Vec<Event>, PersistenceError> {
        Ok(Vec::new())
    }

    fn save_patient_events(&self, _: &str, _: &[Event]) -> Result<(), PersistenceError> {
        Ok(())
    }
}

impl QueuePersistence for NullPersistence {
    fn load_queue(&self) -> Result<QueueSnapshot, PersistenceError> {
        Ok(QueueSnapshot::default())
    }

    fn save_task(&self, _: &FollowupTask) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn save_escalation(&self, _: &EscalationRecord) -> Result<(), PersistenceError> {
        Ok(())
    }
}

// ═══════════════════════════════════════════
// In-memory hook (tests, embedding)
// ═══════════════════════════════════════════

/// Keeps saved state in memory, counts flushes, and can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    events: RefCell<BTreeMap<String, Vec<Event>>>,
    tasks: RefCell<BTreeMap<Uuid, FollowupTask>>,
    escalations: RefCell<Vec<EscalationRecord>>,
    flushes: Cell<usize>,
    failing: Cell<bool>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the saved event logs, as if written by an earlier session.
    pub fn with_events(events: Vec<Event>) -> Self {
        let persistence = Self::default();
        {
            let mut logs = persistence.events.borrow_mut();
            for event in events {
                logs.entry(event.patient_id.clone()).or_default().push(event);
            }
        }
        persistence
    }

    /// Number of successful saves so far.
    pub fn flush_count(&self) -> usize {
        self.flushes.get()
    }

    /// While set, every save fails with `Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn saved_events(&self, patient_id: &str) -> Vec<Event> {
        self.events
            .borrow()
            .get(patient_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn saved_task(&self, id: &Uuid) -> Option<FollowupTask> {
        self.tasks.borrow().get(id).cloned()
    }

    pub fn saved_escalations(&self) -> Vec<EscalationRecord> {
        self.escalations.borrow().clone()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.get() {
            return Err(PersistenceError::Unavailable("storage offline".into()));
        }
        self.flushes.set(self.flushes.get() + 1);
        Ok(())
    }
}

impl EventPersistence for MemoryPersistence {
    fn load_events(&self) -> Result<Vec<Event>, PersistenceError> {
        Ok(self.events.borrow().values().flatten().cloned().collect())
    }

    fn save_patient_events(
        &self,
        patient_id: &str,
        events: &[Event],
    ) -> Result<(), PersistenceError> {
        self.check()?;
        let mut logs = self.events.borrow_mut();
        if events.is_empty() {
            logs.remove(patient_id);
        } else {
            logs.insert(patient_id.to_string(), events.to_vec());
        }
        Ok(())
    }
}

impl QueuePersistence for MemoryPersistence {
    fn load_queue(&self) -> Result<QueueSnapshot, PersistenceError> {
        let mut tasks: Vec<FollowupTask> = self.tasks.borrow().values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(QueueSnapshot {
            tasks,
            escalations: self.escalations.borrow().clone(),
        })
    }

    fn save_task(&self, task: &FollowupTask) -> Result<(), PersistenceError> {
        self.check()?;
        self.tasks.borrow_mut().insert(task.id, task.clone());
        Ok(())
    }

    fn save_escalation(&self, escalation: &EscalationRecord) -> Result<(), PersistenceError> {
        self.check()?;
        self.escalations.borrow_mut().push(escalation.clone());
        Ok(())
    }
}
