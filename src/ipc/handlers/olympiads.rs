use crate::error::StoreError;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    optional_f64, optional_str, parse_enum, required_date, required_str, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Award, OlympiadLevel};
use crate::store::olympiads::{self, NewOlympiadResult};
use rusqlite::Connection;
use serde_json::{json, Value};

fn olympiads_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subject = optional_str(params, "subject")
        .map(str::trim)
        .filter(|s| !s.is_empty());
    Ok(json!({ "olympiads": olympiads::list_olympiads(conn, subject)? }))
}

fn olympiads_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let date = required_date(params, "date")?;
    let olympiad = olympiads::create_olympiad(
        conn,
        required_str(params, "name")?,
        &date,
        parse_enum::<OlympiadLevel>(params, "level", None)?,
        required_str(params, "subject")?,
        optional_str(params, "organizer"),
    )?;
    Ok(json!({ "olympiadId": olympiad.id, "olympiad": olympiad }))
}

fn olympiads_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    olympiads::delete_olympiad(conn, required_str(params, "olympiadId")?)?;
    Ok(json!({ "ok": true }))
}

fn results_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let olympiad_id = required_str(params, "olympiadId")?;
    if olympiads::get_olympiad(conn, olympiad_id)?.is_none() {
        return Err(StoreError::not_found("olympiad", olympiad_id).into());
    }
    Ok(json!({ "results": olympiads::list_results_for_olympiad(conn, olympiad_id)? }))
}

fn results_add(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let score = optional_f64(params, "score")?;
    if matches!(score, Some(s) if !s.is_finite() || s < 0.0) {
        return Err(HandlerErr::bad_params("score must be a non-negative number"));
    }
    let result = olympiads::add_result(
        conn,
        &NewOlympiadResult {
            olympiad_id: required_str(params, "olympiadId")?,
            student_id: required_str(params, "studentId")?,
            award: parse_enum::<Award>(params, "award", None)?,
            score,
            details: optional_str(params, "details"),
            document_link: optional_str(params, "documentLink"),
        },
    )?;
    Ok(json!({ "resultId": result.id, "result": result }))
}

fn results_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    olympiads::delete_result(conn, required_str(params, "resultId")?)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let body: fn(&Connection, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "olympiads.list" => olympiads_list,
        "olympiads.create" => olympiads_create,
        "olympiads.delete" => olympiads_delete,
        "olympiads.results.list" => results_list,
        "olympiads.results.add" => results_add,
        "olympiads.results.delete" => results_delete,
        _ => return None,
    };
    Some(with_conn(state, req, body))
}
