use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{optional_str, required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::{olympiads, roster};
use rusqlite::Connection;
use serde_json::{json, Value};

fn students_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let students = match optional_str(params, "groupId").filter(|s| !s.trim().is_empty()) {
        Some(group_id) => {
            roster::require_group(conn, group_id)?;
            roster::list_group_students(conn, group_id)?
        }
        None => roster::list_students(conn)?,
    };
    Ok(json!({ "students": students }))
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student = roster::create_student(
        conn,
        required_str(params, "firstName")?,
        required_str(params, "lastName")?,
        optional_str(params, "school"),
    )?;
    Ok(json!({ "studentId": student.id, "student": student }))
}

fn students_find(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let found = roster::find_students_by_name(
        conn,
        required_str(params, "firstName")?,
        required_str(params, "lastName")?,
    )?;
    Ok(json!({ "students": found }))
}

fn students_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    roster::delete_student(conn, required_str(params, "studentId")?)?;
    Ok(json!({ "ok": true }))
}

fn students_groups(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    roster::require_student(conn, student_id)?;
    Ok(json!({ "groups": roster::list_student_groups(conn, student_id)? }))
}

fn students_olympiad_results(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    roster::require_student(conn, student_id)?;
    Ok(json!({ "results": olympiads::list_results_for_student(conn, student_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let body: fn(&Connection, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "students.list" => students_list,
        "students.create" => students_create,
        "students.find" => students_find,
        "students.delete" => students_delete,
        "students.groups" => students_groups,
        "students.olympiadResults" => students_olympiad_results,
        _ => return None,
    };
    Some(with_conn(state, req, body))
}
