use serde_json::{json, Value};
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
fn removing_a_class_cascades_to_its_records() {
    let workspace = temp_dir("presentify-cascade");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.mark",
        json!({
            "institutionId": "default",
            "classId": "sc-def-1",
            "entries": [
                { "userId": "s-def-1", "status": "Present" },
                { "userId": "s-def-2", "status": "Late" }
            ]
        }),
    );

    let removed = request(
        &mut stdin,
        &mut reader,
        "3",
        "classes.remove",
        json!({ "institutionId": "default", "classId": "sc-def-1" }),
    );
    assert_eq!(removed["ok"], json!(true));

    let listing = request(
        &mut stdin,
        &mut reader,
        "4",
        "classes.list",
        json!({ "institutionId": "default" }),
    );
    assert!(listing["result"]["classes"]
        .as_array()
        .expect("classes")
        .iter()
        .all(|c| c["id"] != json!("sc-def-1")));

    let sheet = request(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.sheet",
        json!({ "institutionId": "default", "classId": "sc-def-1" }),
    );
    assert_eq!(sheet["error"]["code"], json!("not_found"));

    for (id, student) in [("6", "s-def-1"), ("7", "s-def-2")] {
        let history = request(
            &mut stdin,
            &mut reader,
            id,
            "attendance.history",
            json!({ "institutionId": "default", "userId": student }),
        );
        assert_eq!(
            history["result"]["records"].as_array().map(Vec::len),
            Some(0),
            "records for {} must be gone",
            student
        );
    }

    // Removing again is a no-op, not an error.
    let again = request(
        &mut stdin,
        &mut reader,
        "8",
        "classes.remove",
        json!({ "institutionId": "default", "classId": "sc-def-1" }),
    );
    assert_eq!(again["ok"], json!(true));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn added_classes_slot_into_date_and_time_order() {
    let workspace = temp_dir("presentify-add-order");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let listing = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.list",
        json!({ "institutionId": "default" }),
    );
    let today = listing["result"]["classes"][0]["date"]
        .as_str()
        .expect("date")
        .to_string();

    // Subject defaults to the course name when omitted.
    let added = request(
        &mut stdin,
        &mut reader,
        "3",
        "classes.add",
        json!({
            "institutionId": "default",
            "courseId": "c-def-2",
            "date": today,
            "time": "07:30 - 08:30"
        }),
    );
    assert_eq!(added["ok"], json!(true));
    assert_eq!(added["result"]["class"]["subject"], json!("Advanced Algorithms"));
    assert_eq!(added["result"]["class"]["isLocked"], json!(false));
    assert_eq!(added["result"]["class"]["isFreePeriod"], json!(false));

    let listing = request(
        &mut stdin,
        &mut reader,
        "4",
        "classes.list",
        json!({ "institutionId": "default" }),
    );
    let first = &listing["result"]["classes"][0];
    assert_eq!(first["time"], json!("07:30 - 08:30"), "earliest slot leads");

    let bad_time = request(
        &mut stdin,
        &mut reader,
        "5",
        "classes.add",
        json!({
            "institutionId": "default",
            "courseId": "c-def-2",
            "date": today,
            "time": "sometime"
        }),
    );
    assert_eq!(bad_time["error"]["code"], json!("bad_params"));

    drop(stdin);
    let _ = child.wait();
}
