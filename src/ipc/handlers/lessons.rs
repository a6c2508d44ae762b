//! Lessons, their problem columns and single-cell result writes.

use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    optional_i64, optional_str, parse_enum, required_bool, required_date, required_str,
    string_list, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ProblemType, SubjectArea};
use crate::store::{lessons, roster, ConduitStore};
use rusqlite::Connection;
use serde_json::{json, Value};

fn lessons_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let group_id = required_str(params, "groupId")?;
    roster::require_group(conn, group_id)?;
    Ok(json!({ "lessons": lessons::list_lessons(conn, group_id)? }))
}

fn lessons_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let date = required_date(params, "date")?;
    let lesson = lessons::create_lesson(
        conn,
        required_str(params, "groupId")?,
        &date,
        required_str(params, "topic")?,
        parse_enum::<SubjectArea>(params, "subjectArea", None)?,
        optional_str(params, "sheetLink"),
    )?;
    Ok(json!({ "lessonId": lesson.id, "lesson": lesson }))
}

fn lessons_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let lesson_id = required_str(params, "lessonId")?;
    let lesson = lessons::require_lesson(conn, lesson_id)?;
    Ok(json!({
        "lesson": lesson,
        "problems": lessons::list_problems(conn, lesson_id)?,
    }))
}

fn lessons_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    lessons::delete_lesson(conn, required_str(params, "lessonId")?)?;
    Ok(json!({ "ok": true }))
}

fn problems_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let lesson_id = required_str(params, "lessonId")?;
    lessons::require_lesson(conn, lesson_id)?;
    Ok(json!({ "problems": lessons::list_problems(conn, lesson_id)? }))
}

fn problems_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let problem = lessons::create_problem(
        conn,
        required_str(params, "lessonId")?,
        required_str(params, "label")?,
        parse_enum(params, "problemType", Some(ProblemType::Regular))?,
        optional_i64(params, "displayOrder")?,
    )?;
    Ok(json!({ "problemId": problem.id, "problem": problem }))
}

fn problems_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    lessons::delete_problem(conn, required_str(params, "problemId")?)?;
    Ok(json!({ "ok": true }))
}

fn problems_set_discussed(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let problem = conn.mark_discussed(
        required_str(params, "problemId")?,
        required_bool(params, "discussed")?,
    )?;
    Ok(json!({ "problem": problem }))
}

fn problems_sync_discussed(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let changed = lessons::sync_discussed(
        conn,
        required_str(params, "lessonId")?,
        &string_list(params, "labels")?,
    )?;
    Ok(json!({ "changed": changed }))
}

fn results_solve(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let changed = lessons::add_result(
        conn,
        required_str(params, "studentId")?,
        required_str(params, "problemId")?,
        required_str(params, "lessonId")?,
    )?;
    Ok(json!({ "changed": changed }))
}

fn results_unsolve(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let changed = lessons::delete_result(
        conn,
        required_str(params, "studentId")?,
        required_str(params, "problemId")?,
    )?;
    Ok(json!({ "changed": changed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let body: fn(&Connection, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "lessons.list" => lessons_list,
        "lessons.create" => lessons_create,
        "lessons.get" => lessons_get,
        "lessons.delete" => lessons_delete,
        "problems.list" => problems_list,
        "problems.create" => problems_create,
        "problems.delete" => problems_delete,
        "problems.setDiscussed" => problems_set_discussed,
        "problems.syncDiscussed" => problems_sync_discussed,
        "results.solve" => results_solve,
        "results.unsolve" => results_unsolve,
        _ => return None,
    };
    Some(with_conn(state, req, body))
}
