//! Patient event store: a per-patient, time-ordered log of clinical events.
//!
//! Every mutation is flushed through an [`EventPersistence`] hook. When the
//! flush fails the in-memory change is undone before the error is returned.

pub mod trend;

pub use trend::*;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::TriagePolicy;
use crate::models::enums::EventKind;
use crate::models::{Event, ValidationError};
use crate::persistence::{EventPersistence, NullPersistence, PersistenceError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event {0} already exists")]
    DuplicateId(Uuid),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

pub struct EventStore {
    logs: BTreeMap<String, Vec<Event>>,
    hook: Box<dyn EventPersistence>,
    default_window_hours: i64,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("patients", &self.logs.len())
            .field("events", &self.len())
            .field("default_window_hours", &self.default_window_hours)
            .finish()
    }
}

impl EventStore {
    /// Load every event the hook holds and keep flushing through it.
    pub fn open(hook: Box<dyn EventPersistence>) -> Result<Self, StoreError> {
        let mut logs: BTreeMap<String, Vec<Event>> = BTreeMap::new();
        let loaded = hook.load_events()?;
        let total = loaded.len();
        for event in loaded {
            logs.entry(event.patient_id.clone()).or_default().push(event);
        }
        tracing::info!(patients = logs.len(), events = total, "Event store opened");
        Ok(Self {
            logs,
            hook,
            default_window_hours: TriagePolicy::default().query_window_hours,
        })
    }

    /// Store with nothing behind it.
    pub fn in_memory() -> Self {
        Self {
            logs: BTreeMap::new(),
            hook: Box::new(NullPersistence),
            default_window_hours: TriagePolicy::default().query_window_hours,
        }
    }

    pub fn with_default_window(mut self, hours: i64) -> Self {
        self.default_window_hours = hours;
        self
    }

    pub fn default_window_hours(&self) -> i64 {
        self.default_window_hours
    }

    /// Validate, assign an id when unset, and append in arrival order.
    pub fn append(&mut self, mut event: Event) -> Result<Uuid, StoreError> {
        event.validate()?;
        if event.id.is_nil() {
            event.id = Uuid::new_v4();
        } else if self.get(&event.id).is_some() {
            return Err(StoreError::DuplicateId(event.id));
        }

        let id = event.id;
        let kind = event.kind();
        let patient_id = event.patient_id.clone();
        self.logs.entry(patient_id.clone()).or_default().push(event);

        if let Err(e) = self.flush(&patient_id) {
            let emptied = self
                .logs
                .get_mut(&patient_id)
                .map(|log| {
                    log.pop();
                    log.is_empty()
                })
                .unwrap_or(false);
            if emptied {
                self.logs.remove(&patient_id);
            }
            tracing::warn!(event_id = %id, patient_id = %patient_id, error = %e, "Append rolled back");
            return Err(e);
        }

        tracing::debug!(event_id = %id, patient_id = %patient_id, kind = kind.as_str(), "Event appended");
        Ok(id)
    }

    /// Remove an event by id. Returns `false` when the id is unknown.
    pub fn delete(&mut self, id: &Uuid) -> Result<bool, StoreError> {
        let Some((patient_id, index)) = self.locate(id) else {
            return Ok(false);
        };

        let removed = match self.logs.get_mut(&patient_id) {
            Some(log) => log.remove(index),
            None => return Ok(false),
        };

        if let Err(e) = self.flush(&patient_id) {
            self.logs
                .entry(patient_id.clone())
                .or_default()
                .insert(index, removed);
            tracing::warn!(event_id = %id, patient_id = %patient_id, error = %e, "Delete rolled back");
            return Err(e);
        }

        if self.logs.get(&patient_id).is_some_and(Vec::is_empty) {
            self.logs.remove(&patient_id);
        }
        tracing::info!(event_id = %id, patient_id = %patient_id, "Event deleted");
        Ok(true)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Event> {
        self.logs.values().flatten().find(|e| e.id == *id)
    }

    /// Events for a patient within `[now - window, now]`, oldest first.
    pub fn query(
        &self,
        patient_id: &str,
        window_hours: Option<i64>,
        kinds: Option<&[EventKind]>,
    ) -> Vec<&Event> {
        self.query_as_of(Utc::now(), patient_id, window_hours, kinds)
    }

    pub fn query_as_of(
        &self,
        now: DateTime<Utc>,
        patient_id: &str,
        window_hours: Option<i64>,
        kinds: Option<&[EventKind]>,
    ) -> Vec<&Event> {
        let hours = window_hours.unwrap_or(self.default_window_hours).max(0);
        // Windows past the representable range reach back to the beginning.
        let since = Duration::try_hours(hours)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut events: Vec<&Event> = self
            .logs
            .get(patient_id)
            .map(|log| {
                log.iter()
                    .filter(|e| e.timestamp >= since && e.timestamp <= now)
                    .filter(|e| kinds.map_or(true, |k| k.contains(&e.kind())))
                    .collect()
            })
            .unwrap_or_default();

        // Stable: equal timestamps keep arrival order
        events.sort_by_key(|e| e.timestamp);

        tracing::debug!(
            patient_id = %patient_id,
            window_hours = hours,
            matched = events.len(),
            "Event query"
        );
        events
    }

    /// Severity series for one symptom, matched case-insensitively by name.
    pub fn trend_for(&self, patient_id: &str, symptom: &str, window_hours: i64) -> SymptomTrend {
        self.trend_for_as_of(Utc::now(), patient_id, symptom, window_hours)
    }

    pub fn trend_for_as_of(
        &self,
        now: DateTime<Utc>,
        patient_id: &str,
        symptom: &str,
        window_hours: i64,
    ) -> SymptomTrend {
        let wanted = symptom.trim().to_lowercase();
        let mut points = Vec::new();
        for event in self.query_as_of(now, patient_id, Some(window_hours), Some(&[EventKind::Symptom])) {
            let Some(report) = event.as_symptom() else {
                continue;
            };
            for m in &report.measurements {
                if m.name.trim().to_lowercase() != wanted {
                    continue;
                }
                if let Some(ref severity) = m.severity {
                    points.push(TrendPoint {
                        timestamp: event.timestamp,
                        severity: severity.value,
                    });
                }
            }
        }

        let trend = SymptomTrend::from_points(symptom.trim(), points);
        tracing::debug!(
            patient_id = %patient_id,
            symptom = %trend.symptom,
            points = trend.len(),
            direction = trend.direction.as_str(),
            "Symptom trend"
        );
        trend
    }

    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.values().all(Vec::is_empty)
    }

    fn locate(&self, id: &Uuid) -> Option<(String, usize)> {
        self.logs.iter().find_map(|(patient_id, log)| {
            log.iter()
                .position(|e| e.id == *id)
                .map(|index| (patient_id.clone(), index))
        })
    }

    fn flush(&self, patient_id: &str) -> Result<(), StoreError> {
        let log = self.logs.get(patient_id).map(Vec::as_slice).unwrap_or(&[]);
        self.hook.save_patient_events(patient_id, log)?;
        Ok(())
    }
}
