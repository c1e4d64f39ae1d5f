//! Wire-shaped request/response types and the function-object aliases
//! that stand in for a middleware-shaped function: something that takes
//! a request and owns the response it produces.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// `{origin, id?}` — an identified caller plus a request-correlation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginMetadata {
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl OriginMetadata {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            id: None,
        }
    }
}

/// `{method, params, id?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    /// The first positional param, or `Value::Null` if none was sent —
    /// this is what caveat filters compare against.
    pub fn params_value(&self) -> Value {
        self.params.first().cloned().unwrap_or(Value::Null)
    }
}

/// `{result?, error?}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
}

impl Response {
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: Error) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }
}

/// A restricted method implementation, or a caveat stage wrapping one.
/// Middleware-shaped: takes the request, owns the response it produces.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wraps a `Handler` around a stored caveat, returning a new `Handler`
/// that runs the caveat's check/mutation inline around `next`.
pub type CaveatGenerator =
    Arc<dyn Fn(&crate::capability::Caveat, Handler) -> Result<Handler, Error> + Send + Sync>;
