use super::{clean_opt, new_id, now_stamp, roster};
use crate::error::{StoreError, StoreResult};
use crate::model::{Event, EventParticipant, EventType};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{info, instrument};

fn event_from_row(r: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: r.get(0)?,
        name: r.get(1)?,
        event_type: r.get(2)?,
        description: r.get(3)?,
        start_date: r.get(4)?,
        end_date: r.get(5)?,
        organizer: r.get(6)?,
    })
}

pub struct NewEvent<'a> {
    pub name: &'a str,
    pub event_type: EventType,
    pub description: Option<&'a str>,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
    pub organizer: Option<&'a str>,
}

#[instrument(skip_all, fields(name = new.name))]
pub fn create_event(conn: &Connection, new: &NewEvent<'_>) -> StoreResult<Event> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(StoreError::Invalid("event name must not be empty".into()));
    }
    let event = Event {
        id: new_id(),
        name: name.to_string(),
        event_type: new.event_type,
        description: clean_opt(new.description),
        start_date: clean_opt(new.start_date),
        end_date: clean_opt(new.end_date),
        organizer: clean_opt(new.organizer),
    };
    conn.execute(
        "INSERT INTO events(id, name, event_type, description, start_date, end_date, organizer)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &event.id,
            &event.name,
            event.event_type,
            &event.description,
            &event.start_date,
            &event.end_date,
            &event.organizer,
        ),
    )
    .map_err(|e| StoreError::from(e).for_entity("event"))?;
    info!(event_id = %event.id, "event created");
    Ok(event)
}

pub fn get_event(conn: &Connection, event_id: &str) -> StoreResult<Option<Event>> {
    Ok(conn
        .query_row(
            "SELECT id, name, event_type, description, start_date, end_date, organizer
             FROM events WHERE id = ?",
            [event_id],
            event_from_row,
        )
        .optional()?)
}

pub fn require_event(conn: &Connection, event_id: &str) -> StoreResult<Event> {
    get_event(conn, event_id)?.ok_or_else(|| StoreError::not_found("event", event_id))
}

pub fn list_events(conn: &Connection) -> StoreResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, event_type, description, start_date, end_date, organizer
         FROM events
         ORDER BY start_date IS NULL, start_date DESC, name",
    )?;
    let rows = stmt
        .query_map([], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Linked groups are detached, participant rows go with the event.
#[instrument(skip(conn))]
pub fn delete_event(conn: &Connection, event_id: &str) -> StoreResult<()> {
    let n = conn.execute("DELETE FROM events WHERE id = ?", [event_id])?;
    if n == 0 {
        return Err(StoreError::not_found("event", event_id));
    }
    info!("event deleted");
    Ok(())
}

/// Returns `true` when the student was newly registered for the event.
#[instrument(skip(conn))]
pub fn add_participant(
    conn: &Connection,
    event_id: &str,
    student_id: &str,
    role: Option<&str>,
) -> StoreResult<bool> {
    require_event(conn, event_id)?;
    roster::require_student(conn, student_id)?;
    let n = conn.execute(
        "INSERT INTO event_participants(id, event_id, student_id, role, registered_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(student_id, event_id) DO NOTHING",
        (new_id(), event_id, student_id, clean_opt(role), now_stamp()),
    )?;
    Ok(n > 0)
}

pub fn remove_participant(conn: &Connection, event_id: &str, student_id: &str) -> StoreResult<bool> {
    let n = conn.execute(
        "DELETE FROM event_participants WHERE event_id = ? AND student_id = ?",
        (event_id, student_id),
    )?;
    Ok(n > 0)
}

pub fn list_participants(conn: &Connection, event_id: &str) -> StoreResult<Vec<EventParticipant>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.first_name, s.last_name, s.school_name, s.registered_at,
                ep.role, ep.registered_at
         FROM event_participants ep
         JOIN students s ON s.id = ep.student_id
         WHERE ep.event_id = ?
         ORDER BY s.last_name, s.first_name, s.id",
    )?;
    let rows = stmt
        .query_map([event_id], |r| {
            Ok(EventParticipant {
                student: roster::student_from_row(r)?,
                role: r.get(5)?,
                registered_at: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
