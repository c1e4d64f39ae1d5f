//! Method router: classifies an incoming request as safe, internal, or
//! restricted, and resolves the namespaced restricted-method key.

use std::collections::HashSet;

/// One of the two internal methods (`getPermissions` / `requestPermissions`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalMethod {
    GetPermissions,
    RequestPermissions,
}

/// The routing decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Pass-through: unauthorized callers allowed, no capability check.
    Safe,
    Internal(InternalMethod),
    /// Resolved restricted-method key, empty if none matched.
    Restricted(String),
}

pub struct MethodRouter {
    safe_methods: HashSet<String>,
    restricted_methods: HashSet<String>,
    method_prefix: String,
}

impl MethodRouter {
    pub fn new(safe_methods: impl IntoIterator<Item = String>, restricted_methods: HashSet<String>, method_prefix: impl Into<String>) -> Self {
        Self {
            safe_methods: safe_methods.into_iter().collect(),
            restricted_methods,
            method_prefix: method_prefix.into(),
        }
    }

    fn get_permissions_method(&self) -> String {
        format!("{}getPermissions", self.method_prefix)
    }

    fn request_permissions_method(&self) -> String {
        format!("{}requestPermissions", self.method_prefix)
    }

    /// Property: a method name appearing in both `safeMethods` and
    /// `restrictedMethods` is treated as safe — checked first, so this
    /// falls out of the match order below.
    pub fn classify(&self, method: &str) -> Route {
        if self.safe_methods.contains(method) {
            return Route::Safe;
        }
        if method == self.get_permissions_method() {
            return Route::Internal(InternalMethod::GetPermissions);
        }
        if method == self.request_permissions_method() {
            return Route::Internal(InternalMethod::RequestPermissions);
        }
        Route::Restricted(self.get_method_key_for(method))
    }

    /// Supports namespaced restricted methods: `ns_` authorizes any
    /// `ns_*` call. Exact matches beat prefix matches. Accumulates
    /// underscore-delimited prefixes left to right and returns the
    /// *shortest* one registered in the restricted-method set; returns
    /// the empty string if none matches.
    pub fn get_method_key_for(&self, method: &str) -> String {
        if self.restricted_methods.contains(method) {
            return method.to_string();
        }
        for (i, ch) in method.char_indices() {
            if i == 0 {
                continue;
            }
            if ch == '_' {
                let prefix = &method[..=i];
                if self.restricted_methods.contains(prefix) {
                    return prefix.to_string();
                }
            }
        }
        String::new()
    }
}
