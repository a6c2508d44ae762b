use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{optional_date, optional_str, required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::roster::{self, Enrollment};
use rusqlite::Connection;
use serde_json::{json, Value};

fn groups_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let event_id = optional_str(params, "eventId").filter(|s| !s.trim().is_empty());
    Ok(json!({ "groups": roster::list_groups(conn, event_id)? }))
}

fn groups_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let start_date = optional_date(params, "startDate")?;
    let end_date = optional_date(params, "endDate")?;
    let event_id = optional_str(params, "eventId").filter(|s| !s.trim().is_empty());
    let group = roster::create_group(
        conn,
        required_str(params, "name")?,
        optional_str(params, "description"),
        event_id,
        start_date.as_deref(),
        end_date.as_deref(),
    )?;
    Ok(json!({ "groupId": group.id, "group": group }))
}

fn groups_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    roster::delete_group(conn, required_str(params, "groupId")?)?;
    Ok(json!({ "ok": true }))
}

fn groups_add_student(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let added = roster::add_student_to_group(
        conn,
        required_str(params, "studentId")?,
        required_str(params, "groupId")?,
    )?;
    Ok(json!({ "added": added }))
}

fn groups_remove_student(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let removed = roster::remove_student_from_group(
        conn,
        required_str(params, "studentId")?,
        required_str(params, "groupId")?,
    )?;
    Ok(json!({ "removed": removed }))
}

fn groups_enroll(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let outcome = roster::enroll_by_name(
        conn,
        required_str(params, "groupId")?,
        required_str(params, "firstName")?,
        required_str(params, "lastName")?,
        optional_str(params, "school"),
    )?;
    Ok(match outcome {
        Enrollment::Enrolled {
            student,
            created,
            added,
        } => json!({
            "status": "enrolled",
            "studentId": student.id,
            "student": student,
            "created": created,
            "added": added,
        }),
        Enrollment::Ambiguous(candidates) => json!({
            "status": "ambiguous",
            "candidates": candidates,
        }),
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let body: fn(&Connection, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "groups.list" => groups_list,
        "groups.create" => groups_create,
        "groups.delete" => groups_delete,
        "groups.addStudent" => groups_add_student,
        "groups.removeStudent" => groups_remove_student,
        "groups.enroll" => groups_enroll,
        _ => return None,
    };
    Some(with_conn(state, req, body))
}
