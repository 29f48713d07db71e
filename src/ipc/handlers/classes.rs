use chrono::NaiveDate;
use serde_json::json;

use crate::clock::TimeRange;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, now_param, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;

fn list(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let view = store.ledger.tenant_view(&institution_id);
    Ok(json!({ "classes": to_json(&view.classes)? }))
}

fn add(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let course_id = get_required_str(params, "courseId")?;
    let date_raw = get_required_str(params, "date")?;
    let time = get_required_str(params, "time")?;

    let date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD"))?;
    if TimeRange::parse(&time).is_none() {
        return Err(HandlerErr::bad_params("time must be \"HH:MM - HH:MM\""));
    }

    // The denormalized subject is refreshed from the course at creation.
    let subject = match get_optional_str(params, "subject") {
        Some(s) if !s.trim().is_empty() => s,
        _ => store
            .ledger
            .courses
            .iter()
            .find(|c| c.institution_id == institution_id && c.id == course_id)
            .map(|c| c.name.clone())
            .ok_or_else(|| HandlerErr::bad_params("missing subject and unknown courseId"))?,
    };

    let class = store
        .ledger
        .add_class(&institution_id, &course_id, &subject, date, &time);
    store.save_ledger()?;
    Ok(json!({ "class": to_json(&class)? }))
}

fn remove(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let class_id = get_required_str(params, "classId")?;
    store.ledger.remove_class(&institution_id, &class_id);
    store.save_ledger()?;
    Ok(json!({ "ok": true }))
}

fn lock(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let class_id = get_required_str(params, "classId")?;
    let now = now_param(params)?;
    let auto_marked_absent = store.ledger.lock_class(&institution_id, &class_id, now)?;
    store.save_ledger()?;
    Ok(json!({ "autoMarkedAbsent": auto_marked_absent }))
}

fn unlock(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let class_id = get_required_str(params, "classId")?;
    store.ledger.unlock_class(&institution_id, &class_id)?;
    store.save_ledger()?;
    Ok(json!({ "ok": true }))
}

fn auto_lock_expired(
    store: &mut Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let now = now_param(params)?;
    let locked = store.ledger.auto_lock_expired(&institution_id, now);
    if !locked.is_empty() {
        store.save_ledger()?;
    }
    Ok(json!({ "lockedClassIds": locked }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "classes.list"
        | "classes.add"
        | "classes.remove"
        | "classes.lock"
        | "classes.unlock"
        | "classes.autoLockExpired" => {
            let Some(store) = state.store.as_mut() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            dispatch(store, req)
        }
        _ => return None,
    };
    Some(match outcome {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}

fn dispatch(store: &mut Store, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    match req.method.as_str() {
        "classes.list" => list(store, &req.params),
        "classes.add" => add(store, &req.params),
        "classes.remove" => remove(store, &req.params),
        "classes.lock" => lock(store, &req.params),
        "classes.unlock" => unlock(store, &req.params),
        _ => auto_lock_expired(store, &req.params),
    }
}
