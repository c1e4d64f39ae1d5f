//! Restricted-method executor: composes the caveat pipeline around the
//! terminal method for one authorized call.

use std::collections::HashMap;

use crate::capability::Capability;
use crate::caveat::CaveatRegistry;
use crate::error::Error;
use crate::protocol::{Handler, Request, Response};

pub type RestrictedMethods = HashMap<String, Handler>;

pub struct RestrictedMethodExecutor {
    registry: CaveatRegistry,
}

impl RestrictedMethodExecutor {
    pub fn new(registry: CaveatRegistry) -> Self {
        Self { registry }
    }

    /// Builds the one-shot pipeline for this call: one stage per caveat,
    /// in stored order, wrapping the terminal method. Folding from the
    /// last caveat inward means the first stored caveat is outermost —
    /// its request-phase check runs first, and its response-phase
    /// mutation (if any) runs last, after every caveat closer to the
    /// terminal method has already mutated the result. Standard
    /// onion-middleware order: caveats execute in stored order around
    /// the terminal method.
    fn build_pipeline(&self, permission: &Capability, terminal: Handler) -> Result<Handler, Error> {
        let mut handler = terminal;
        if let Some(caveats) = &permission.caveats {
            for caveat in caveats.iter().rev() {
                handler = self.registry.wrap(caveat, handler)?;
            }
        }
        Ok(handler)
    }

    /// Runs `req` through the authorized call named by `method_key`. If
    /// `method_key` is empty or has no registered implementation, the
    /// response is `METHOD_NOT_FOUND`. Any caveat that fails
    /// short-circuits the pipeline with its own error.
    pub async fn execute(&self, method_key: &str, permission: &Capability, methods: &RestrictedMethods, req: Request) -> Response {
        if method_key.is_empty() {
            return Response::err(Error::method_not_found());
        }
        let Some(terminal) = methods.get(method_key) else {
            return Response::err(Error::method_not_found());
        };
        match self.build_pipeline(permission, terminal.clone()) {
            Ok(handler) => handler(req).await,
            Err(err) => Response::err(err),
        }
    }
}
