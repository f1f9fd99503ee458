use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_marksd");
    let mut child = Command::new(exe)
        .env_remove("MARKSD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn marksd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
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
        .unwrap_or("")
        .to_string()
}

struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    workspace: PathBuf,
    next_id: u32,
}

impl Sidecar {
    fn open(prefix: &str) -> Self {
        let workspace = temp_dir(prefix);
        let (child, stdin, reader) = spawn_sidecar();
        let mut s = Sidecar {
            child,
            stdin,
            reader,
            workspace,
            next_id: 0,
        };
        let path = s.workspace.to_string_lossy().to_string();
        s.ok("workspace.select", json!({ "path": path }));
        s
    }

    fn id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let id = self.id();
        request_err_code(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn student(&mut self, name: &str, class: &str, roll_no: &str) -> String {
        self.ok(
            "students.create",
            json!({ "name": name, "class": class, "section": "A", "rollNo": roll_no }),
        )
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string()
    }

    fn close(self) {
        drop(self.stdin);
        let mut child = self.child;
        let _ = child.wait();
        let _ = std::fs::remove_dir_all(self.workspace);
    }
}

#[test]
fn submit_computes_literal_weighted_figures() {
    let mut s = Sidecar::open("marksd-submit-literal");
    let sid = s.student("Asha", "7", "01");

    let res = s.ok(
        "marks.submit",
        json!({
            "studentId": sid,
            "exams": {
                "pa1": { "Math": 15, "English": 9 },
                "pa2": { "Math": 17, "English": 11 },
                "halfYear": { "Math": 61, "English": 47.5 },
                "pa3": { "Math": 18, "English": 12 },
                "pa4": { "Math": 13 },
                "final": { "Math": 66, "English": 55 }
            }
        }),
    );
    assert_eq!(res["message"], json!("Marks saved successfully"));
    let marks = &res["marks"];
    assert_eq!(marks["studentId"], json!(sid));
    assert_eq!(marks["class"], json!("7"));
    assert_eq!(marks["weightedDetails"]["Math"], json!({ "term1": 77.0, "term2": 87.0, "total": 87.0 }));
    assert_eq!(
        marks["weightedDetails"]["English"],
        json!({ "term1": 57.5, "term2": 62.25, "total": 62.25 })
    );
    assert_eq!(marks["weightedDetails"]["Science"]["total"], json!(0.0));
    // (87 + 62.25 + 0 + 0 + 0) / 5
    assert_eq!(marks["weightedTotal"], json!(29.85));
    assert_eq!(marks["total"], json!(0.0));
    assert_eq!(marks["percentage"], json!(0.0));
    assert!(marks["createdAt"].is_string());
    assert!(marks["updatedAt"].is_string());

    s.close();
}

#[test]
fn submit_all_max_reports_above_hundred() {
    let mut s = Sidecar::open("marksd-submit-max");
    let sid = s.student("Top", "nursery", "01");
    let mut exams = serde_json::Map::new();
    for (slot, v) in [
        ("pa1", 20),
        ("pa2", 20),
        ("halfYear", 80),
        ("pa3", 20),
        ("pa4", 20),
        ("final", 80),
    ] {
        exams.insert(
            slot.to_string(),
            json!({ "English": v, "Hindi": v, "Math": v, "EVS": v }),
        );
    }
    let res = s.ok("marks.submit", json!({ "studentId": sid, "exams": exams }));
    let marks = &res["marks"];
    assert_eq!(marks["weightedTotal"], json!(110.0));
    for subject in ["English", "Hindi", "Math", "EVS"] {
        assert_eq!(
            marks["weightedDetails"][subject],
            json!({ "term1": 100.0, "term2": 110.0, "total": 110.0 })
        );
    }
    s.close();
}

#[test]
fn submit_sanitizes_junk_and_out_of_range_input() {
    let mut s = Sidecar::open("marksd-submit-sanitize");
    let sid = s.student("Messy", "UKG", "01");
    let res = s.ok(
        "marks.submit",
        json!({
            "studentId": sid,
            "exams": {
                "pa1": { "English": "19", "Hindi": -5, "Math": "abc", "EVS": 42, "Art": 20 },
                "halfYear": [["English", 95], ["Math", "60.5"]],
                "final": "not a table"
            }
        }),
    );
    let exams = &res["marks"]["exams"];
    assert_eq!(
        exams["pa1"],
        json!({ "English": 19.0, "Hindi": 0.0, "Math": 0.0, "EVS": 20.0 })
    );
    assert_eq!(
        exams["halfYear"],
        json!({ "English": 80.0, "Hindi": 0.0, "Math": 60.5, "EVS": 0.0 })
    );
    assert_eq!(
        exams["final"],
        json!({ "English": 0.0, "Hindi": 0.0, "Math": 0.0, "EVS": 0.0 })
    );
    for slot in ["pa1", "pa2", "halfYear", "pa3", "pa4", "final"] {
        let keys: Vec<&String> = exams[slot].as_object().expect("plain object").keys().collect();
        assert_eq!(keys, vec!["English", "Hindi", "Math", "EVS"], "slot {}", slot);
    }
    s.close();
}

#[test]
fn submit_without_exams_records_zeroes() {
    let mut s = Sidecar::open("marksd-submit-empty");
    let sid = s.student("Blank", "3", "01");
    let res = s.ok("marks.submit", json!({ "studentId": sid }));
    assert_eq!(res["marks"]["weightedTotal"], json!(0.0));
    assert_eq!(
        res["marks"]["exams"]["pa4"],
        json!({ "Math": 0.0, "English": 0.0, "Science": 0.0, "Hindi": 0.0, "Social Science": 0.0 })
    );
    s.close();
}

#[test]
fn submit_missing_student_short_circuits() {
    let mut s = Sidecar::open("marksd-submit-missing");
    assert_eq!(
        s.err_code(
            "marks.submit",
            json!({ "studentId": "nobody", "exams": { "pa1": { "Math": 5 } } }),
        ),
        "not_found"
    );
    assert_eq!(s.err_code("marks.submit", json!({})), "bad_params");
    assert_eq!(
        s.err_code("marks.get", json!({ "studentId": "nobody" })),
        "not_found"
    );
    let list = s.ok("marks.list", json!({}));
    assert_eq!(list["marks"], json!([]));
    s.close();
}

#[test]
fn teacher_permissions_follow_assigned_classes() {
    let mut s = Sidecar::open("marksd-submit-permissions");
    let sid = s.student("Guarded", "8", "01");

    assert_eq!(
        s.err_code(
            "marks.submit",
            json!({
                "studentId": sid,
                "actor": { "role": "teacher", "assignedClasses": ["7", "9"] },
                "exams": { "pa1": { "Math": 5 } }
            }),
        ),
        "forbidden"
    );
    assert_eq!(
        s.err_code("marks.get", json!({ "studentId": sid })),
        "not_found",
        "denied submission must not create a record"
    );

    assert_eq!(
        s.err_code(
            "marks.submit",
            json!({ "studentId": sid, "actor": { "role": "principal" } }),
        ),
        "bad_params"
    );

    let res = s.ok(
        "marks.submit",
        json!({
            "studentId": sid,
            "actor": { "role": "teacher", "assignedClasses": ["8"] },
            "exams": { "pa1": { "Math": 5 } }
        }),
    );
    assert_eq!(res["marks"]["exams"]["pa1"]["Math"], json!(5.0));

    let res = s.ok(
        "marks.submit",
        json!({
            "studentId": sid,
            "actor": { "role": "admin" },
            "exams": { "pa1": { "Math": 6 } }
        }),
    );
    assert_eq!(res["marks"]["exams"]["pa1"]["Math"], json!(6.0));
    s.close();
}

#[test]
fn preview_computes_without_persisting() {
    let mut s = Sidecar::open("marksd-preview");
    let res = s.ok(
        "marks.preview",
        json!({
            "class": "Play",
            "exams": { "pa1": { "EVS": 20 }, "halfYear": { "EVS": 80 } }
        }),
    );
    assert_eq!(res["subjects"], json!(["English", "Hindi", "Math", "EVS"]));
    assert_eq!(
        res["weightedDetails"]["EVS"],
        json!({ "term1": 90.0, "term2": 45.0, "total": 45.0 })
    );
    assert_eq!(res["weightedTotal"], json!(11.25));
    assert_eq!(res["exams"]["pa1"]["EVS"], json!(20.0));
    assert_eq!(s.err_code("marks.preview", json!({})), "bad_params");

    let list = s.ok("marks.list", json!({}));
    assert_eq!(list["marks"], json!([]));
    s.close();
}
