use serde_json::json;

use crate::clock::{self, TimeRange};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, now_param, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{AttendanceStatus, LedgerError, MarkEntry};
use crate::store::Store;

/// Minutes before class start during which the "send QR codes" reminder
/// fires.
const REMINDER_WINDOW_MINUTES: i64 = 15;

/// A scanned code carries `userId;classId`. The class must match the class
/// in context and the user must be an enrolled student of the tenant before
/// the scan reaches the normal mark path.
fn qr(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let class_id = get_required_str(params, "classId")?;
    let payload = get_required_str(params, "payload")?;
    let now = now_param(params)?;

    let (user_id, payload_class_id) = payload
        .split_once(';')
        .ok_or_else(|| HandlerErr::bad_params("payload must be userId;classId"))?;
    if payload_class_id != class_id {
        return Err(HandlerErr::new(
            "qr_mismatch",
            "scanned code belongs to a different class",
        ));
    }

    let class = store
        .ledger
        .class(&institution_id, &class_id)
        .ok_or(LedgerError::ClassNotFound)?;
    let enrolled = store
        .ledger
        .enrolled_students(class)
        .iter()
        .any(|s| s.id == user_id);
    if !enrolled {
        return Err(HandlerErr::new(
            "not_on_roster",
            "scanned user is not on this class's roster",
        ));
    }

    let entry = MarkEntry {
        user_id: user_id.to_string(),
        status: AttendanceStatus::Present,
    };
    let outcome = store
        .ledger
        .mark_attendance(&institution_id, &class_id, &[entry], now)?;
    store.save_ledger()?;
    Ok(json!({
        "userId": user_id,
        "status": to_json(&AttendanceStatus::Present)?,
        "outcome": to_json(&outcome)?,
    }))
}

/// Tenant classes starting within the reminder window that have not been
/// flagged yet. Flagged ids persist so reloads never re-prompt.
fn reminders(
    store: &mut Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let now = now_param(params)?;
    let campus = clock::to_campus(now);

    let mut due = Vec::new();
    for class in &store.ledger.scheduled_classes {
        if class.institution_id != institution_id
            || class.is_free_period
            || store.notified_class_ids.contains(&class.id)
        {
            continue;
        }
        let Some(range) = TimeRange::parse(&class.time) else {
            continue;
        };
        let start = class.date.and_time(range.start);
        let lead = start.signed_duration_since(campus).num_minutes();
        if lead <= 0 || lead > REMINDER_WINDOW_MINUTES {
            continue;
        }
        if store.ledger.enrolled_students(class).is_empty() {
            continue;
        }
        due.push(json!({
            "classId": class.id,
            "subject": class.subject,
            "time": class.time,
        }));
    }

    if !due.is_empty() {
        for item in &due {
            if let Some(id) = item.get("classId").and_then(|v| v.as_str()) {
                store.notified_class_ids.insert(id.to_string());
            }
        }
        store.save_notifications()?;
    }
    Ok(json!({ "due": due }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "checkin.qr" | "checkin.reminders" => {
            let Some(store) = state.store.as_mut() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            match req.method.as_str() {
                "checkin.qr" => qr(store, &req.params),
                _ => reminders(store, &req.params),
            }
        }
        _ => return None,
    };
    Some(match outcome {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
