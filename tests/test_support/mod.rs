#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn temp_workspace() -> TempDir {
    tempfile::Builder::new()
        .prefix("conduitd-test-")
        .tempdir()
        .expect("create temp dir")
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_conduitd");
    let mut child = Command::new(exe)
        .env_remove("CONDUITD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn conduitd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

/// Spawn a sidecar with a fresh workspace already selected.
pub fn spawn_with_workspace() -> (Sidecar, TempDir) {
    let ws = temp_workspace();
    let mut sc = spawn_sidecar();
    request_ok(
        &mut sc,
        "workspace.select",
        json!({ "path": ws.path().to_string_lossy() }),
    );
    (sc, ws)
}

pub fn send_line(sc: &mut Sidecar, line: &str) -> serde_json::Value {
    writeln!(sc.stdin, "{}", line).expect("write request");
    sc.stdin.flush().expect("flush request");

    let mut out = String::new();
    sc.reader.read_line(&mut out).expect("read response line");
    assert!(!out.trim().is_empty(), "empty response for {}", line);
    serde_json::from_str(out.trim()).expect("parse response json")
}

pub fn request(sc: &mut Sidecar, method: &str, params: serde_json::Value) -> serde_json::Value {
    sc.next_id += 1;
    let id = sc.next_id.to_string();
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    let value = send_line(sc, &payload.to_string());
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
    value
}

pub fn request_ok(sc: &mut Sidecar, method: &str, params: serde_json::Value) -> serde_json::Value {
    let value = request(sc, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the error code of a request that is expected to fail.
pub fn request_err(sc: &mut Sidecar, method: &str, params: serde_json::Value) -> String {
    let value = request(sc, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

pub fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .and_then(|x| x.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}

pub struct ThreeByTwo {
    pub group_id: String,
    pub lesson_id: String,
    /// Alekseeva, Borisov, Vasiliev
    pub students: [String; 3],
    pub problem_a: String,
    pub problem_b: String,
}

/// Group of 3, one lesson with problems A and B; A solved by Alekseeva and Borisov.
pub fn three_by_two(sc: &mut Sidecar) -> ThreeByTwo {
    let g = request_ok(sc, "groups.create", json!({ "name": "Circle 7" }));
    let group_id = str_field(&g, "groupId");
    let mut ids = Vec::new();
    for (first, last) in [("Anna", "Alekseeva"), ("Boris", "Borisov"), ("Viktor", "Vasiliev")] {
        let s = request_ok(
            sc,
            "students.create",
            json!({ "firstName": first, "lastName": last }),
        );
        let id = str_field(&s, "studentId");
        request_ok(
            sc,
            "groups.addStudent",
            json!({ "groupId": group_id, "studentId": id }),
        );
        ids.push(id);
    }
    let l = request_ok(
        sc,
        "lessons.create",
        json!({ "groupId": group_id, "date": "2024-10-01", "topic": "Parity", "subjectArea": "logic" }),
    );
    let lesson_id = str_field(&l, "lessonId");
    let a = request_ok(sc, "problems.create", json!({ "lessonId": lesson_id, "label": "A" }));
    let b = request_ok(sc, "problems.create", json!({ "lessonId": lesson_id, "label": "B" }));
    let (problem_a, problem_b) = (str_field(&a, "problemId"), str_field(&b, "problemId"));
    for sid in &ids[..2] {
        request_ok(
            sc,
            "results.solve",
            json!({ "studentId": sid, "problemId": problem_a, "lessonId": lesson_id }),
        );
    }
    let students: [String; 3] = [ids[0].clone(), ids[1].clone(), ids[2].clone()];
    ThreeByTwo {
        group_id,
        lesson_id,
        students,
        problem_a,
        problem_b,
    }
}
