use crate::calc::ProblemRatings;
use crate::conduit::{
    self, CellGrid, ConduitMatrix, ReconcileContext, DERIVED_COLUMNS,
};
use crate::error::StoreError;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::lessons;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

fn conduit_json(matrix: &ConduitMatrix, ratings: &ProblemRatings) -> Value {
    let rows: Vec<Value> = matrix
        .rows
        .iter()
        .map(|row| {
            let cells: Map<String, Value> = matrix
                .columns
                .iter()
                .zip(&row.cells)
                .map(|(c, v)| (c.label.clone(), Value::Bool(*v)))
                .collect();
            json!({
                "studentId": row.student_id,
                "name": row.name,
                "cells": cells,
                "solved": row.solved,
                "score": row.score,
            })
        })
        .collect();
    json!({
        "lessonId": matrix.lesson_id,
        "empty": matrix.is_empty(),
        "columns": matrix.columns,
        "rows": rows,
        "ratings": ratings,
        "derivedColumns": DERIVED_COLUMNS,
    })
}

/// `{rowName: {label: bool}}`
fn parse_grid(params: &Value, key: &str) -> Result<Option<CellGrid>, HandlerErr> {
    let raw = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(m)) => m,
        Some(_) => return Err(HandlerErr::bad_params(format!("{key} must be an object"))),
    };
    let mut grid = CellGrid::new();
    for (name, cells) in raw {
        let Some(cells) = cells.as_object() else {
            return Err(HandlerErr::bad_params(format!("{key}.{name} must be an object")));
        };
        let mut row = BTreeMap::new();
        for (label, v) in cells {
            // Derived columns come back as numbers and are ignored anyway.
            if !v.is_boolean() && DERIVED_COLUMNS.contains(&label.as_str()) {
                continue;
            }
            let Some(b) = v.as_bool() else {
                return Err(HandlerErr::bad_params(format!(
                    "{key}.{name}.{label} must be a boolean"
                )));
            };
            row.insert(label.clone(), b);
        }
        grid.insert(name.clone(), row);
    }
    Ok(Some(grid))
}

fn conduit_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let lesson_id = required_str(params, "lessonId")?;
    let (matrix, ratings) = conduit::load_conduit(conn, lesson_id)?;
    Ok(conduit_json(&matrix, &ratings))
}

fn conduit_save(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let lesson_id = required_str(params, "lessonId")?;
    lessons::require_lesson(conn, lesson_id)?;
    let Some(edited) = parse_grid(params, "edited")? else {
        return Err(HandlerErr::bad_params("missing edited"));
    };

    let (current, _) = conduit::load_conduit(conn, lesson_id)?;
    let original = match parse_grid(params, "original")? {
        Some(g) => g,
        None => current.cells(),
    };
    let name_to_id = current.name_to_id();
    let label_to_id = current.label_to_id();
    let frozen_labels = current.discussed_labels();
    let ctx = ReconcileContext {
        lesson_id,
        name_to_id: &name_to_id,
        label_to_id: &label_to_id,
        frozen_labels: &frozen_labels,
    };
    let rec = conduit::reconcile(&original, &edited, &ctx);

    let applied = conduit::apply_reconciliation(conn, &rec).map_err(|e| match e {
        StoreError::Sqlite(_) => HandlerErr::new("db_tx_failed", e.to_string()),
        other => HandlerErr::from(other),
    })?;

    let (matrix, ratings) = conduit::load_conduit(conn, lesson_id)?;
    Ok(json!({
        "added": applied.added,
        "removed": applied.removed,
        "unchanged": applied.unchanged,
        "frozenSkipped": rec.frozen_skipped,
        "warnings": rec.warnings,
        "conduit": conduit_json(&matrix, &ratings),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let body: fn(&Connection, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "conduit.get" => conduit_get,
        "conduit.save" => conduit_save,
        _ => return None,
    };
    Some(with_conn(state, req, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_drops_totals_but_keeps_boolean_cells() {
        let params = json!({
            "edited": { "Ivanov Ivan": { "1": true, "solved": 3, "score": false } }
        });
        let grid = parse_grid(&params, "edited").expect("grid").expect("present");
        let row = &grid["Ivanov Ivan"];
        assert_eq!(row.get("1"), Some(&true));
        assert_eq!(row.get("score"), Some(&false));
        assert!(!row.contains_key("solved"));

        let bad = json!({ "edited": { "Ivanov Ivan": { "1": "yes" } } });
        assert_eq!(parse_grid(&bad, "edited").expect_err("string cell").code, "bad_params");
        assert!(parse_grid(&json!({}), "edited").expect("absent").is_none());
    }
}
