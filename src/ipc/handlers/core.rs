use crate::db;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{optional_i64, required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::seed;
use serde_json::json;
use std::path::PathBuf;
use tracing::warn;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(&req.params, "path") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id),
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

fn handle_seed_demo(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let seed = match optional_i64(params, "seed")? {
            Some(s) if s < 0 => return Err(HandlerErr::bad_params("seed must be >= 0")),
            Some(s) => s as u64,
            None => seed::DEFAULT_SEED,
        };
        let students = match optional_i64(params, "students")? {
            Some(n) if !(0..=10_000).contains(&n) => {
                return Err(HandlerErr::bad_params("students must be between 0 and 10000"))
            }
            Some(n) => n as usize,
            None => seed::DEFAULT_STUDENTS,
        };
        let summary = seed::seed_demo(conn, seed, students)?;
        Ok(json!(summary))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.seedDemo" => Some(handle_seed_demo(state, req)),
        _ => None,
    }
}
