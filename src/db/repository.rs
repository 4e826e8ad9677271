use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{open_database, open_memory_database, DatabaseError};
use crate::models::enums::*;
use crate::models::{EscalationRecord, Event, FollowupTask, ValidationError};
use crate::persistence::{EventPersistence, PersistenceError, QueuePersistence, QueueSnapshot};

// ═══════════════════════════════════════════
// Row helpers
// ═══════════════════════════════════════════

fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {value}: {e}")))
}

fn parse_enum<T: FromStr<Err = ValidationError>>(field: &str, value: &str) -> Result<T, DatabaseError> {
    T::from_str(value).map_err(|_| DatabaseError::InvalidEnum {
        field: field.into(),
        value: value.into(),
    })
}

// ═══════════════════════════════════════════
// Event Repository
// ═══════════════════════════════════════════

/// Replace one patient's stored log with `events`, in order, atomically.
pub fn replace_patient_events(
    conn: &Connection,
    patient_id: &str,
    events: &[Event],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM events WHERE patient_id = ?1", params![patient_id])?;

    for (seq, event) in events.iter().enumerate() {
        let body = serde_json::to_string(event)?;
        tx.execute(
            "INSERT INTO events (id, patient_id, seq, timestamp, event_type, source, confidence, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id.to_string(),
                event.patient_id,
                seq as i64,
                event.timestamp.to_rfc3339(),
                event.kind().as_str(),
                event.source.as_str(),
                event.confidence,
                body,
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// All events, each patient's log in arrival order.
pub fn get_all_events(conn: &Connection) -> Result<Vec<Event>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT body FROM events ORDER BY patient_id, seq")?;
    let bodies = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut events = Vec::with_capacity(bodies.len());
    for body in bodies {
        events.push(serde_json::from_str::<Event>(&body)?);
    }
    Ok(events)
}

// ═══════════════════════════════════════════
// Task Repository
// ═══════════════════════════════════════════

pub fn upsert_task(conn: &Connection, task: &FollowupTask) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO followup_tasks (id, patient_id, urgency, summary, context, triggered_by,
         status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            urgency = excluded.urgency,
            summary = excluded.summary,
            context = excluded.context,
            status = excluded.status,
            updated_at = excluded.updated_at",
        params![
            task.id.to_string(),
            task.patient_id,
            task.urgency.as_str(),
            task.summary,
            task.context,
            task.triggered_by.map(|id| id.to_string()),
            task.status.as_str(),
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

type TaskRow = (
    String, String, String, String,
    Option<String>, Option<String>,
    String, String, String,
);

pub fn get_all_tasks(conn: &Connection) -> Result<Vec<FollowupTask>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, urgency, summary, context, triggered_by, status, created_at, updated_at
         FROM followup_tasks ORDER BY created_at ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?
        .collect::<Result<Vec<TaskRow>, _>>()?;

    let mut tasks = Vec::with_capacity(rows.len());
    for (id, patient_id, urgency, summary, context, triggered_by, status, created_at, updated_at) in rows {
        tasks.push(FollowupTask {
            id: parse_uuid(&id)?,
            patient_id,
            urgency: parse_enum("urgency", &urgency)?,
            summary,
            context,
            triggered_by: triggered_by.as_deref().map(parse_uuid).transpose()?,
            status: parse_enum("status", &status)?,
            created_at: parse_time(&created_at)?,
            updated_at: parse_time(&updated_at)?,
        });
    }
    Ok(tasks)
}

// ═══════════════════════════════════════════
// Escalation Repository
// ═══════════════════════════════════════════

pub fn insert_escalation(conn: &Connection, record: &EscalationRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO escalations (id, patient_id, reason, severity, contact_preference,
         triggered_by, created_at, acknowledgement, estimated_response)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id.to_string(),
            record.patient_id,
            record.reason,
            record.severity.as_str(),
            record.contact_preference.map(|c| c.as_str()),
            record.triggered_by.map(|id| id.to_string()),
            record.created_at.to_rfc3339(),
            record.acknowledgement,
            record.estimated_response,
        ],
    )?;
    Ok(())
}

type EscalationRow = (
    String, String, String, String,
    Option<String>, Option<String>,
    String, String, Option<String>,
);

pub fn get_all_escalations(conn: &Connection) -> Result<Vec<EscalationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, reason, severity, contact_preference, triggered_by,
         created_at, acknowledgement, estimated_response
         FROM escalations ORDER BY created_at ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?
        .collect::<Result<Vec<EscalationRow>, _>>()?;

    let mut records = Vec::with_capacity(rows.len());
    for (
        id, patient_id, reason, severity, contact, triggered_by,
        created_at, acknowledgement, estimated_response,
    ) in rows
    {
        records.push(EscalationRecord {
            id: parse_uuid(&id)?,
            patient_id,
            reason,
            severity: parse_enum("severity", &severity)?,
            contact_preference: contact
                .as_deref()
                .map(|c| parse_enum::<ContactPreference>("contact_preference", c))
                .transpose()?,
            triggered_by: triggered_by.as_deref().map(parse_uuid).transpose()?,
            created_at: parse_time(&created_at)?,
            acknowledgement,
            estimated_response,
        });
    }
    Ok(records)
}

// ═══════════════════════════════════════════
// Persistence adapter
// ═══════════════════════════════════════════

/// SQLite-backed load/save hooks for the event store and task queue.
///
/// Share one adapter between both through `Rc`.
pub struct SqlitePersistence {
    conn: Connection,
}

impl SqlitePersistence {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(open_memory_database()?))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl EventPersistence for SqlitePersistence {
    fn load_events(&self) -> Result<Vec<Event>, PersistenceError> {
        Ok(get_all_events(&self.conn)?)
    }

    fn save_patient_events(
        &self,
        patient_id: &str,
        events: &[Event],
    ) -> Result<(), PersistenceError> {
        Ok(replace_patient_events(&self.conn, patient_id, events)?)
    }
}

impl QueuePersistence for SqlitePersistence {
    fn load_queue(&self) -> Result<QueueSnapshot, PersistenceError> {
        Ok(QueueSnapshot {
            tasks: get_all_tasks(&self.conn)?,
            escalations: get_all_escalations(&self.conn)?,
        })
    }

    fn save_task(&self, task: &FollowupTask) -> Result<(), PersistenceError> {
        Ok(upsert_task(&self.conn, task)?)
    }

    fn save_escalation(&self, escalation: &EscalationRecord) -> Result<(), PersistenceError> {
        Ok(insert_escalation(&self.conn, escalation)?)
    }
}
