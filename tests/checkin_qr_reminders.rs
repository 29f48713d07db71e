use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

const CAMPUS_OFFSET_MINUTES: i64 = 330; // Asia/Kolkata

fn campus_today() -> NaiveDate {
    (Utc::now().naive_utc() + Duration::minutes(CAMPUS_OFFSET_MINUTES)).date()
}

fn campus_instant(h: u32, m: u32) -> String {
    let campus = campus_today().and_hms_opt(h, m, 0).expect("time");
    let utc = campus - Duration::minutes(CAMPUS_OFFSET_MINUTES);
    format!("{}Z", utc.format("%Y-%m-%dT%H:%M:%S"))
}

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

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_presentifyd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn presentifyd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

#[test]
fn qr_scans_validate_class_and_roster_before_marking() {
    let workspace = temp_dir("presentify-qr");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let scanned = request(
        &mut stdin,
        &mut reader,
        "2",
        "checkin.qr",
        json!({
            "institutionId": "default",
            "classId": "sc-def-1",
            "payload": "s-def-1;sc-def-1"
        }),
    );
    assert_eq!(scanned["ok"], json!(true));
    assert_eq!(scanned["result"]["status"], json!("Present"));
    assert_eq!(scanned["result"]["outcome"]["inserted"], json!(1));

    // A code for a different class is rejected before any mark.
    let mismatch = request(
        &mut stdin,
        &mut reader,
        "3",
        "checkin.qr",
        json!({
            "institutionId": "default",
            "classId": "sc-def-1",
            "payload": "s-def-2;sc-def-2"
        }),
    );
    assert_eq!(mismatch["error"]["code"], json!("qr_mismatch"));

    // Users outside the tenant roster are rejected.
    let foreign = request(
        &mut stdin,
        &mut reader,
        "4",
        "checkin.qr",
        json!({
            "institutionId": "default",
            "classId": "sc-def-1",
            "payload": "s-mit-1;sc-def-1"
        }),
    );
    assert_eq!(foreign["error"]["code"], json!("not_on_roster"));

    // As are tenant students who are not enrolled in the course.
    let registered = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.register",
        json!({
            "institutionId": "default",
            "name": "No Courses Yet",
            "email": "nocourses@example.com",
            "rollNo": "DEF100"
        }),
    );
    let new_id = registered["result"]["student"]["id"]
        .as_str()
        .expect("student id")
        .to_string();
    let unenrolled = request(
        &mut stdin,
        &mut reader,
        "6",
        "checkin.qr",
        json!({
            "institutionId": "default",
            "classId": "sc-def-1",
            "payload": format!("{};sc-def-1", new_id)
        }),
    );
    assert_eq!(unenrolled["error"]["code"], json!("not_on_roster"));

    // Scans on a locked class surface the lock error.
    request(
        &mut stdin,
        &mut reader,
        "7",
        "classes.lock",
        json!({ "institutionId": "default", "classId": "sc-def-1" }),
    );
    let locked = request(
        &mut stdin,
        &mut reader,
        "8",
        "checkin.qr",
        json!({
            "institutionId": "default",
            "classId": "sc-def-1",
            "payload": "s-def-2;sc-def-1"
        }),
    );
    assert_eq!(locked["error"]["code"], json!("class_locked"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn reminders_fire_once_per_class_and_survive_restart() {
    let workspace = temp_dir("presentify-reminders");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // 08:50: only sc-def-1 (09:00) is inside the 15-minute window.
    let due = request(
        &mut stdin,
        &mut reader,
        "2",
        "checkin.reminders",
        json!({ "institutionId": "default", "now": campus_instant(8, 50) }),
    );
    let due_list = due["result"]["due"].as_array().expect("due");
    assert_eq!(due_list.len(), 1);
    assert_eq!(due_list[0]["classId"], json!("sc-def-1"));

    // The same class never prompts twice.
    let again = request(
        &mut stdin,
        &mut reader,
        "3",
        "checkin.reminders",
        json!({ "institutionId": "default", "now": campus_instant(8, 55) }),
    );
    assert_eq!(again["result"]["due"].as_array().map(Vec::len), Some(0));

    // The sent set is persisted: a restarted daemon stays quiet too.
    drop(stdin);
    let _ = child.wait();
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    request(
        &mut stdin,
        &mut reader,
        "4",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let after_restart = request(
        &mut stdin,
        &mut reader,
        "5",
        "checkin.reminders",
        json!({ "institutionId": "default", "now": campus_instant(8, 55) }),
    );
    assert_eq!(
        after_restart["result"]["due"].as_array().map(Vec::len),
        Some(0)
    );

    // Free periods never prompt: 12:00 break is in window at 11:50.
    let lunch = request(
        &mut stdin,
        &mut reader,
        "6",
        "checkin.reminders",
        json!({ "institutionId": "default", "now": campus_instant(11, 50) }),
    );
    assert!(lunch["result"]["due"]
        .as_array()
        .expect("due")
        .iter()
        .all(|d| d["classId"] != json!("sc-def-3")));

    drop(stdin);
    let _ = child.wait();
}
