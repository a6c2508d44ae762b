use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: &[Handler] = &[
    handlers::core::try_handle,
    handlers::students::try_handle,
    handlers::groups::try_handle,
    handlers::events::try_handle,
    handlers::lessons::try_handle,
    handlers::conduit::try_handle,
    handlers::analytics::try_handle,
    handlers::olympiads::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    for handler in HANDLERS {
        if let Some(resp) = handler(&mut *state, &req) {
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(method: &str, params: serde_json::Value) -> Request {
        Request {
            id: "1".into(),
            method: method.into(),
            params,
        }
    }

    #[test]
    fn unknown_methods_are_not_implemented() {
        let mut state = AppState::default();
        let resp = handle_request(&mut state, req("grades.compute", json!({})));
        assert_eq!(resp["error"]["code"], "not_implemented");
    }

    #[test]
    fn data_methods_need_a_workspace() {
        let mut state = AppState::default();
        for m in ["students.list", "conduit.get", "analytics.groupStandings", "olympiads.list"] {
            let resp = handle_request(&mut state, req(m, json!({})));
            assert_eq!(resp["error"]["code"], "no_workspace", "{m}");
        }
        let resp = handle_request(&mut state, req("health", json!({})));
        assert_eq!(resp["ok"], true);
    }
}
