//! Protocol-level error taxonomy.
//!
//! Errors never cross the middleware boundary as exceptions — every
//! fallible path here returns a value that ends up on `Response.error`.

use serde::{Deserialize, Serialize};

/// `METHOD_NOT_FOUND` — method key unresolved, or an approved method in
/// `requestPermissions` names something the router doesn't recognize.
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;
/// Recognized restricted method, no matching capability for the origin.
pub const UNAUTHORIZED_CODE: i64 = 4100;
/// Malformed `requestPermissions` payload.
pub const INVALID_REQUEST_CODE: i64 = -32600;
/// Approval resolved to an empty permission set.
pub const USER_REJECTED_CODE: i64 = 4001;
/// Generic `{message, code:1}` — an exception was thrown while resolving
/// a permission.
pub const INTERNAL_CODE: i64 = 1;

/// A protocol-shaped error: `{message, code, data?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct Error {
    pub message: String,
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Error {
    fn new(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code,
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found() -> Self {
        Self::new("Method not found", METHOD_NOT_FOUND_CODE)
    }

    pub fn unauthorized(method: &str) -> Self {
        Self::new(format!("Unauthorized to perform action: {method}"), UNAUTHORIZED_CODE)
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(detail.into(), INVALID_REQUEST_CODE)
    }

    pub fn invalid_params() -> Self {
        Self::new("invalid params", INVALID_REQUEST_CODE)
    }

    pub fn user_rejected() -> Self {
        Self::new("User rejected the request.", USER_REJECTED_CODE)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message.into(), INTERNAL_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_data_field_when_absent() {
        let err = Error::method_not_found();
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["code"], METHOD_NOT_FOUND_CODE);
    }

    #[test]
    fn carries_data_when_attached() {
        let err = Error::invalid_params().with_data(serde_json::json!({"field": "x"}));
        assert_eq!(err.data.unwrap()["field"], "x");
    }
}
