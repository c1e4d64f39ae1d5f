//! Caveat registry & built-in filters.
//!
//! A caveat-function generator takes a stored `Caveat` and the next stage
//! in the pipeline, and returns a new `Handler` that sits inline around
//! it. The registry is instance-scoped rather than a process-wide global
//! static, so it stays replaceable per controller — a field owned by the
//! `PermissionsController`, not a `static`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::capability::Caveat;
use crate::error::Error;
use crate::protocol::{CaveatGenerator, Handler};

/// `filterParams` — admits the request iff its full positional `params`
/// array is structurally included in `value`.
pub const FILTER_PARAMS: &str = "filterParams";
/// `filterResponse` — after the terminal method runs, replaces
/// `res.result` with its intersection with `value`.
pub const FILTER_RESPONSE: &str = "filterResponse";

pub struct CaveatRegistry {
    generators: HashMap<String, CaveatGenerator>,
}

impl Default for CaveatRegistry {
    fn default() -> Self {
        let mut registry = Self {
            generators: HashMap::new(),
        };
        registry.register(FILTER_PARAMS, Arc::new(filter_params_generator));
        registry.register(FILTER_RESPONSE, Arc::new(filter_response_generator));
        registry
    }
}

impl CaveatRegistry {
    pub fn register(&mut self, kind: impl Into<String>, generator: CaveatGenerator) {
        self.generators.insert(kind.into(), generator);
    }

    /// Wrap `next` with the stage named by `caveat.kind`. Unknown caveat
    /// types are **not** a no-op: dispatch fails closed with
    /// `invalid params`.
    pub fn wrap(&self, caveat: &Caveat, next: Handler) -> Result<Handler, Error> {
        match self.generators.get(&caveat.kind) {
            Some(generator) => generator(caveat, next),
            None => Err(Error::invalid_params()),
        }
    }
}

fn filter_params_generator(caveat: &Caveat, next: Handler) -> Result<Handler, Error> {
    let value = caveat.value.clone();
    Ok(Arc::new(move |req| {
        let value = value.clone();
        let next = next.clone();
        Box::pin(async move {
            let params = Value::Array(req.params.clone());
            if !structurally_included(&params, &value) {
                return crate::protocol::Response::err(Error::invalid_params());
            }
            next(req).await
        })
    }))
}

fn filter_response_generator(caveat: &Caveat, next: Handler) -> Result<Handler, Error> {
    let value = caveat.value.clone();
    Ok(Arc::new(move |req| {
        let value = value.clone();
        let next = next.clone();
        Box::pin(async move {
            let mut res = next(req).await;
            if let Some(result) = res.result.take() {
                res.result = Some(intersect(&result, &value));
            }
            res
        })
    }))
}

/// `a` is structurally included in `b` iff: arrays are included
/// element-wise, objects are included key-wise (every key in `a` present
/// in `b` with an included sub-value), and primitives are strictly equal.
pub fn structurally_included(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() <= b.len() && a.iter().zip(b.iter()).all(|(x, y)| structurally_included(x, y))
        }
        (Value::Object(a), Value::Object(b)) => a
            .iter()
            .all(|(k, v)| b.get(k).map(|bv| structurally_included(v, bv)).unwrap_or(false)),
        (a, b) => a == b,
    }
}

/// The structural intersection of `result` with `value`: arrays keep only
/// members that appear in `value`; objects drop keys absent from
/// `value`. Any other shape passes through unchanged — there is no
/// narrower "matching type" to intersect with.
pub fn intersect(result: &Value, value: &Value) -> Value {
    match (result, value) {
        (Value::Array(items), Value::Array(allowed)) => {
            Value::Array(items.iter().filter(|item| allowed.contains(item)).cloned().collect())
        }
        (Value::Object(map), Value::Object(allowed)) => Value::Object(
            map.iter()
                .filter(|(k, _)| allowed.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        _ => result.clone(),
    }
}
