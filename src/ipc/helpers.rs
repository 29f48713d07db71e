use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::ipc::error::err;
use crate::ledger::LedgerError;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<LedgerError> for HandlerErr {
    fn from(e: LedgerError) -> Self {
        match &e {
            LedgerError::ClassLocked => HandlerErr::new("class_locked", e.to_string()),
            LedgerError::ClassNotFound | LedgerError::StudentNotFound => {
                HandlerErr::new("not_found", e.to_string())
            }
            LedgerError::DuplicateIdentifier { field } => HandlerErr {
                code: "duplicate_identifier",
                message: e.to_string(),
                details: Some(json!({ "field": field })),
            },
        }
    }
}

impl From<anyhow::Error> for HandlerErr {
    fn from(e: anyhow::Error) -> Self {
        HandlerErr::new("store_save_failed", format!("{e:#}"))
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Clock value for the operation: the optional RFC 3339 `now` param (used by
/// tests and replay tooling) or the real wall clock.
pub fn now_param(params: &serde_json::Value) -> Result<DateTime<Utc>, HandlerErr> {
    match params.get("now").and_then(|v| v.as_str()) {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| HandlerErr::bad_params(format!("bad now: {}", e))),
        None => Ok(Utc::now()),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value)
        .map_err(|e| HandlerErr::new("serialize_failed", e.to_string()))
}
