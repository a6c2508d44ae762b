//! Read-only scoring queries. Unknown lessons and groups read as empty.

use crate::calc;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn lesson_ratings(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let lesson_id = required_str(params, "lessonId")?;
    let ratings = calc::lesson_ratings(conn, lesson_id)?;
    Ok(json!({ "lessonId": lesson_id, "ratings": ratings }))
}

fn student_lesson(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let lesson_id = required_str(params, "lessonId")?;
    let ratings = calc::lesson_ratings(conn, lesson_id)?;
    Ok(json!({
        "score": calc::score_for_student_in_lesson(conn, student_id, lesson_id, &ratings)?,
        "solved": calc::solved_count_for_student_in_lesson(conn, student_id, lesson_id)?,
    }))
}

fn student_group(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let group_id = required_str(params, "groupId")?;
    Ok(json!({
        "totalScore": calc::total_score_for_student_in_group(conn, student_id, group_id)?,
        "totalSolved": calc::total_solved_for_student_in_group(conn, student_id, group_id)?,
    }))
}

fn group_standings(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let group_id = required_str(params, "groupId")?;
    Ok(json!({
        "groupId": group_id,
        "standings": calc::group_standings(conn, group_id)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let body: fn(&Connection, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "analytics.lessonRatings" => lesson_ratings,
        "analytics.studentLesson" => student_lesson,
        "analytics.studentGroup" => student_group,
        "analytics.groupStandings" => group_standings,
        _ => return None,
    };
    Some(with_conn(state, req, body))
}
