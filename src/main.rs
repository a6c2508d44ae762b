mod calc;
mod conduit;
mod config;
mod db;
mod error;
mod ipc;
mod model;
mod seed;
mod store;

use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() {
    let cfg = config::Config::from_env();
    init_logging(&cfg.log_filter);
    info!(version = env!("CARGO_PKG_VERSION"), "conduitd starting");

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace {
        match db::open_db(&path) {
            Ok(conn) => {
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => error!(path = %path.display(), error = %e, "could not open configured workspace"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => {
                let span = info_span!("request", id = %req.id, method = %req.method);
                let _enter = span.enter();
                let resp = ipc::handle_request(&mut state, req);
                debug!(ok = resp.get("ok").and_then(|v| v.as_bool()), "handled");
                resp
            }
            // Without a parsed id the reply cannot be correlated.
            Err(e) => json!({
                "ok": false,
                "error": { "code": "bad_json", "message": e.to_string() },
            }),
        };

        if writeln!(stdout, "{}", resp).and_then(|_| stdout.flush()).is_err() {
            break;
        }
    }
    info!("conduitd stopped");
}
