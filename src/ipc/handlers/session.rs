use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger::UserRole;
use crate::store::{Session, Store};
use serde_json::json;

fn parse_role(params: &serde_json::Value) -> Result<UserRole, HandlerErr> {
    match get_required_str(params, "role")?.as_str() {
        "student" => Ok(UserRole::Student),
        "teacher" => Ok(UserRole::Teacher),
        other => Err(HandlerErr::bad_params(format!("unknown role: {}", other))),
    }
}

fn login(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let role = parse_role(params)?;
    let institution_id = get_required_str(params, "institutionId")?;
    let email = get_required_str(params, "email")?;

    // Email lookup is the whole credential check; there are no passwords.
    let user = match role {
        UserRole::Teacher => store
            .ledger
            .find_teacher_by_email(&institution_id, &email)
            .map(to_json)
            .transpose()?,
        UserRole::Student => store
            .ledger
            .find_student_by_email(&institution_id, &email)
            .map(to_json)
            .transpose()?,
    };
    let Some(user) = user else {
        return Err(HandlerErr::new(
            "invalid_credentials",
            "no account with this email",
        ));
    };

    let session = Session {
        role,
        institution_id,
        user,
    };
    store.session = Some(session.clone());
    store.save_session()?;
    Ok(json!({ "session": to_json(&session)? }))
}

fn sign_up(store: &mut Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let role = parse_role(params)?;
    let institution_id = get_required_str(params, "institutionId")?;
    let name = get_required_str(params, "name")?;
    let email = get_required_str(params, "email")?;
    let id_number = get_required_str(params, "idNumber")?;

    let user = match role {
        UserRole::Teacher => to_json(&store.ledger.sign_up_teacher(
            &institution_id,
            &name,
            &email,
            &id_number,
        )?)?,
        UserRole::Student => to_json(&store.ledger.sign_up_student(
            &institution_id,
            &name,
            &email,
            &id_number,
        )?)?,
    };

    let session = Session {
        role,
        institution_id,
        user,
    };
    store.session = Some(session.clone());
    store.save_ledger()?;
    store.save_session()?;
    Ok(json!({ "session": to_json(&session)? }))
}

fn current(store: &Store) -> Result<serde_json::Value, HandlerErr> {
    match &store.session {
        Some(session) => Ok(json!({ "session": to_json(session)? })),
        None => Ok(json!({ "session": null })),
    }
}

fn logout(store: &mut Store) -> Result<serde_json::Value, HandlerErr> {
    store.session = None;
    store.save_session()?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "session.login" | "session.signUp" | "session.current" | "session.logout" => {
            let Some(store) = state.store.as_mut() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            match req.method.as_str() {
                "session.login" => login(store, &req.params),
                "session.signUp" => sign_up(store, &req.params),
                "session.current" => current(store),
                _ => logout(store),
            }
        }
        _ => return None,
    };
    Some(match outcome {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
