use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{optional_date, optional_str, parse_enum, required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::EventType;
use crate::store::events::{self, NewEvent};
use crate::store::roster;
use rusqlite::Connection;
use serde_json::{json, Value};

fn events_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({ "events": events::list_events(conn)? }))
}

fn events_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let start_date = optional_date(params, "startDate")?;
    let end_date = optional_date(params, "endDate")?;
    if let (Some(s), Some(e)) = (&start_date, &end_date) {
        if e < s {
            return Err(HandlerErr::bad_params("endDate is before startDate"));
        }
    }
    let event = events::create_event(
        conn,
        &NewEvent {
            name: required_str(params, "name")?,
            event_type: parse_enum(params, "eventType", Some(EventType::Other))?,
            description: optional_str(params, "description"),
            start_date: start_date.as_deref(),
            end_date: end_date.as_deref(),
            organizer: optional_str(params, "organizer"),
        },
    )?;
    Ok(json!({ "eventId": event.id, "event": event }))
}

fn events_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let event_id = required_str(params, "eventId")?;
    let event = events::require_event(conn, event_id)?;
    Ok(json!({
        "event": event,
        "groups": roster::list_groups(conn, Some(event_id))?,
        "participants": events::list_participants(conn, event_id)?,
    }))
}

fn events_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    events::delete_event(conn, required_str(params, "eventId")?)?;
    Ok(json!({ "ok": true }))
}

fn participants_add(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let added = events::add_participant(
        conn,
        required_str(params, "eventId")?,
        required_str(params, "studentId")?,
        optional_str(params, "role"),
    )?;
    Ok(json!({ "added": added }))
}

fn participants_remove(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let removed = events::remove_participant(
        conn,
        required_str(params, "eventId")?,
        required_str(params, "studentId")?,
    )?;
    Ok(json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let body: fn(&Connection, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "events.list" => events_list,
        "events.create" => events_create,
        "events.get" => events_get,
        "events.delete" => events_delete,
        "events.participants.add" => participants_add,
        "events.participants.remove" => participants_remove,
        _ => return None,
    };
    Some(with_conn(state, req, body))
}
