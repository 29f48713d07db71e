use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;

fn list(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let view = store.ledger.tenant_view(&institution_id);
    Ok(json!({ "students": to_json(&view.students)? }))
}

fn register(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let name = get_required_str(params, "name")?;
    let email = get_required_str(params, "email")?;
    let roll_no = get_required_str(params, "rollNo")?;
    let avatar_url = get_optional_str(params, "avatarUrl");

    let student = store.ledger.register_student(
        &institution_id,
        &name,
        &email,
        &roll_no,
        avatar_url.as_deref(),
    )?;
    store.save_ledger()?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn update(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let student_id = get_required_str(params, "studentId")?;
    let name = get_required_str(params, "name")?;
    let email = get_required_str(params, "email")?;
    let roll_no = get_required_str(params, "rollNo")?;

    let student =
        store
            .ledger
            .update_student(&institution_id, &student_id, &name, &email, &roll_no)?;
    store.save_ledger()?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn update_photo(
    store: &mut Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let institution_id = get_required_str(params, "institutionId")?;
    let student_id = get_required_str(params, "studentId")?;
    let avatar_url = get_required_str(params, "avatarUrl")?;

    store
        .ledger
        .update_student_photo(&institution_id, &student_id, &avatar_url)?;
    // save_ledger extracts data URLs to the photo side map.
    store.save_ledger()?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "students.list" | "students.register" | "students.update" | "students.updatePhoto" => {
            let Some(store) = state.store.as_mut() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            match req.method.as_str() {
                "students.list" => list(store, &req.params),
                "students.register" => register(store, &req.params),
                "students.update" => update(store, &req.params),
                _ => update_photo(store, &req.params),
            }
        }
        _ => return None,
    };
    Some(match outcome {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
