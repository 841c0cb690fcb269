//! The uniform `{ok, data, error}` result shape handed to every caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a gateway call.
///
/// Only constructible through [`ApiEnvelope::success`] and
/// [`ApiEnvelope::failure`], so `ok == true` never carries an error and
/// `ok == false` never carries data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T = Value> {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn success(data: Option<T>) -> Self {
        Self {
            ok: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl ApiEnvelope<Value> {
    /// Package a backend payload.
    ///
    /// An object carrying any of `ok`, `data` or `error` is the backend's own
    /// envelope; `ok` defaults to "no error key present". Any other payload is
    /// returned verbatim as `data`.
    pub fn from_backend(payload: Value) -> Self {
        let mut map = match payload {
            Value::Object(map) => map,
            other => return Self::success(Some(other)),
        };

        if !(map.contains_key("ok") || map.contains_key("data") || map.contains_key("error")) {
            return Self::success(Some(Value::Object(map)));
        }

        let error = match map.remove("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };
        let ok = map
            .get("ok")
            .and_then(Value::as_bool)
            .unwrap_or(error.is_none());

        if ok {
            Self::success(map.remove("data"))
        } else {
            Self::failure(error.unwrap_or_else(|| "backend reported a failure".to_string()))
        }
    }
}
