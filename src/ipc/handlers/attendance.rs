use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, now_param, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{AttendanceStatus, LedgerError, MarkEntry};
use crate::store::Store;

fn parse_entries(params: &serde_json::Value) -> Result<Vec<MarkEntry>, HandlerErr> {
    let raw = params
        .get("entries")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing entries"))?;
    serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("bad entries: {}", e)))
}

fn mark(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let class_id = get_required_str(params, "classId")?;
    let entries = parse_entries(params)?;
    let now = now_param(params)?;

    let outcome = store
        .ledger
        .mark_attendance(&institution_id, &class_id, &entries, now)?;
    store.save_ledger()?;
    to_json(&outcome)
}

/// Roster sheet for one class: every enrolled student with their current
/// status, Unmarked where no record exists yet.
fn sheet(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let class_id = get_required_str(params, "classId")?;

    let class = store
        .ledger
        .class(&institution_id, &class_id)
        .ok_or(LedgerError::ClassNotFound)?;

    let rows: Vec<serde_json::Value> = store
        .ledger
        .enrolled_students(class)
        .into_iter()
        .map(|student| {
            let status = store
                .ledger
                .attendance_records
                .iter()
                .find(|r| r.scheduled_class_id == class.id && r.user_id == student.id)
                .map(|r| r.status)
                .unwrap_or(AttendanceStatus::Unmarked);
            Ok(json!({
                "studentId": student.id,
                "name": student.name,
                "rollNo": student.roll_no,
                "avatarUrl": student.avatar_url,
                "status": to_json(&status)?,
            }))
        })
        .collect::<Result<_, HandlerErr>>()?;

    Ok(json!({ "class": to_json(class)?, "rows": rows }))
}

/// A user's attendance history across the tenant's classes, most recent
/// record first, with the class slot joined in for display.
fn history(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let user_id = get_required_str(params, "userId")?;

    let mut records: Vec<_> = store
        .ledger
        .attendance_records
        .iter()
        .filter(|r| r.institution_id == institution_id && r.user_id == user_id)
        .collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let rows: Vec<serde_json::Value> = records
        .into_iter()
        .map(|r| {
            let class = store
                .ledger
                .scheduled_classes
                .iter()
                .find(|c| c.id == r.scheduled_class_id);
            Ok(json!({
                "recordId": r.id,
                "classId": r.scheduled_class_id,
                "subject": class.map(|c| c.subject.clone()),
                "date": class.map(|c| c.date),
                "time": class.map(|c| c.time.clone()),
                "status": to_json(&r.status)?,
                "timestamp": r.timestamp,
            }))
        })
        .collect::<Result<_, HandlerErr>>()?;

    Ok(json!({ "records": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "attendance.mark" | "attendance.sheet" | "attendance.history" => {
            let Some(store) = state.store.as_mut() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            match req.method.as_str() {
                "attendance.mark" => mark(store, &req.params),
                "attendance.sheet" => sheet(store, &req.params),
                _ => history(store, &req.params),
            }
        }
        _ => return None,
    };
    Some(match outcome {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
