//! Controller façade: wires the router, store, executor, and workflow
//! together behind the middleware entry point and the host-callable
//! admin surface.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result as AnyResult};

use crate::capability::Capability;
use crate::caveat::CaveatRegistry;
use crate::error::Error;
use crate::executor::{RestrictedMethodExecutor, RestrictedMethods};
use crate::protocol::{Handler, OriginMetadata, Request, Response};
use crate::router::{InternalMethod, MethodRouter, Route};
use crate::store::{DomainEntry, PermissionRequest, PermissionStore, RequestedPermission};
use crate::workflow::{PermissionWorkflow, RequestUserApproval};

/// `{description, method}` — one entry in `restrictedMethods`.
pub struct RestrictedMethodDescriptor {
    pub description: String,
    pub method: Handler,
}

/// Constructor options.
pub struct Config {
    pub safe_methods: Vec<String>,
    pub restricted_methods: HashMap<String, RestrictedMethodDescriptor>,
    pub method_prefix: String,
    /// Required. A missing approval function fails construction — the
    /// only fatal condition the controller recognizes; everything else
    /// resolves to a `Response.error`.
    pub request_user_approval: Option<RequestUserApproval>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            safe_methods: Vec::new(),
            restricted_methods: HashMap::new(),
            method_prefix: String::new(),
            request_user_approval: None,
        }
    }
}

/// What the middleware entry point decided to do with a request.
pub enum Outcome {
    /// Safe method — the host should run its own pass-through `next`.
    PassThrough,
    /// Internal or restricted method — the host should send this back
    /// to the caller (`end`), the core already produced a terminal
    /// response.
    Handled(Response),
}

pub struct PermissionsController {
    store: Arc<PermissionStore>,
    router: Arc<MethodRouter>,
    executor: RestrictedMethodExecutor,
    workflow: PermissionWorkflow,
    restricted_methods: RestrictedMethods,
}

impl PermissionsController {
    pub fn new(config: Config) -> AnyResult<Self> {
        let Some(request_user_approval) = config.request_user_approval else {
            bail!("PermissionsController requires `request_user_approval`");
        };

        let descriptions = config
            .restricted_methods
            .iter()
            .map(|(name, descriptor)| (name.clone(), descriptor.description.clone()))
            .collect();
        let restricted_methods: RestrictedMethods = config
            .restricted_methods
            .into_iter()
            .map(|(name, descriptor)| (name, descriptor.method))
            .collect();
        let restricted_keys: HashSet<String> = restricted_methods.keys().cloned().collect();

        let store = Arc::new(PermissionStore::new(descriptions));
        let router = Arc::new(MethodRouter::new(config.safe_methods, restricted_keys, config.method_prefix));
        let workflow = PermissionWorkflow::new(store.clone(), router.clone(), request_user_approval);

        Ok(Self {
            store,
            router,
            executor: RestrictedMethodExecutor::new(CaveatRegistry::default()),
            workflow,
            restricted_methods,
        })
    }

    /// The middleware entry point, curried over the caller's origin
    /// metadata. Routing priority: safe pass-through beats internal
    /// dispatch beats restricted authorization.
    pub async fn handle_request(&self, origin_metadata: OriginMetadata, req: Request) -> Outcome {
        match self.router.classify(&req.method) {
            Route::Safe => {
                tracing::debug!(method = %req.method, "safe method, passing through");
                Outcome::PassThrough
            }
            Route::Internal(InternalMethod::GetPermissions) => {
                Outcome::Handled(self.workflow.get_permissions(&origin_metadata.origin).await)
            }
            Route::Internal(InternalMethod::RequestPermissions) => {
                Outcome::Handled(self.workflow.request_permissions(&origin_metadata, &req).await)
            }
            Route::Restricted(key) => Outcome::Handled(self.dispatch_restricted(&origin_metadata.origin, &key, req).await),
        }
    }

    async fn dispatch_restricted(&self, origin: &str, method_key: &str, req: Request) -> Response {
        if method_key.is_empty() {
            tracing::debug!(method = %req.method, "no restricted method matches");
            return Response::err(Error::method_not_found());
        }
        match self.store.get_permission(origin, method_key).await {
            Err(err) => Response::err(err),
            Ok(None) => {
                tracing::info!(%origin, method = %method_key, "denied: no capability held");
                Response::err(Error::unauthorized(&req.method))
            }
            Ok(Some(permission)) => {
                tracing::debug!(%origin, method = %method_key, "authorized, dispatching");
                self.executor.execute(method_key, &permission, &self.restricted_methods, req).await
            }
        }
    }

    // ---- Admin surface (host-callable, not over the wire) ----

    pub async fn get_permissions_for_domain(&self, origin: &str) -> Vec<Capability> {
        self.store.get_permissions_for_domain(origin).await
    }

    pub async fn get_permission(&self, origin: &str, method: &str) -> Result<Option<Capability>, Error> {
        self.store.get_permission(origin, method).await
    }

    pub async fn has_permissions(&self, origin: &str, requested: &HashMap<String, RequestedPermission>) -> bool {
        self.store.has_permissions(origin, requested).await
    }

    pub async fn get_domains(&self) -> HashMap<String, DomainEntry> {
        self.store.get_domains().await
    }

    pub async fn set_domain(&self, origin: &str, entry: DomainEntry) {
        self.store.set_domain(origin, entry).await
    }

    pub async fn add_permissions_for(&self, origin: &str, new_permissions: HashMap<String, RequestedPermission>) {
        self.store.add_permissions_for(origin, new_permissions).await
    }

    pub async fn remove_permissions_for(&self, origin: &str, methods: &[String]) {
        self.store.remove_permissions_for(origin, methods).await
    }

    pub async fn clear_domains(&self) {
        self.store.clear_domains().await
    }

    pub async fn get_permissions_requests(&self) -> Vec<PermissionRequest> {
        self.store.get_permissions_requests().await
    }

    pub async fn remove_permissions_request(&self, id: &serde_json::Value) {
        self.store.remove_permissions_request(id).await
    }

    /// Grants newly approved permissions and returns the domain's
    /// updated capability list — the operation `requestPermissions`
    /// performs on approval, exposed for hosts that grant out-of-band.
    pub async fn grant_new_permissions(&self, origin: &str, approved: HashMap<String, RequestedPermission>) -> Vec<Capability> {
        self.store.add_permissions_for(origin, approved).await;
        self.store.get_permissions_for_domain(origin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn echo_handler() -> Handler {
        Arc::new(|req: Request| Box::pin(async move { Response::ok(req.params_value()) }))
    }

    fn approve_all() -> RequestUserApproval {
        Arc::new(|req: PermissionRequest| Box::pin(async move { Ok(req.permissions) }))
    }

    fn controller_with(restricted: HashMap<String, RestrictedMethodDescriptor>) -> PermissionsController {
        PermissionsController::new(Config {
            safe_methods: vec!["eth_chainId".into()],
            restricted_methods: restricted,
            method_prefix: "wallet_".into(),
            request_user_approval: Some(approve_all()),
        })
        .unwrap()
    }

    fn readcontacts_controller() -> PermissionsController {
        let mut methods = HashMap::new();
        methods.insert(
            "readContacts".to_string(),
            RestrictedMethodDescriptor {
                description: "Read your contacts".into(),
                method: echo_handler(),
            },
        );
        controller_with(methods)
    }

    #[test]
    fn missing_approval_function_fails_construction() {
        let result = PermissionsController::new(Config::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unauthorized_restricted_method_never_reaches_the_terminal_method() {
        let reached = Arc::new(AtomicBool::new(false));
        let reached2 = reached.clone();
        let mut methods = HashMap::new();
        methods.insert(
            "readContacts".to_string(),
            RestrictedMethodDescriptor {
                description: "x".into(),
                method: Arc::new(move |_req| {
                    reached2.store(true, Ordering::SeqCst);
                    Box::pin(async { Response::ok(json!([])) })
                }),
            },
        );
        let controller = controller_with(methods);

        let outcome = controller
            .handle_request(OriginMetadata::new("o1"), Request::new("readContacts", vec![]))
            .await;
        match outcome {
            Outcome::Handled(res) => assert_eq!(res.error.unwrap().code, crate::error::UNAUTHORIZED_CODE),
            Outcome::PassThrough => panic!("expected a handled response"),
        }
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn safe_method_passes_through() {
        let controller = readcontacts_controller();
        let outcome = controller
            .handle_request(OriginMetadata::new("anyone"), Request::new("eth_chainId", vec![]))
            .await;
        assert!(matches!(outcome, Outcome::PassThrough));
    }

    #[tokio::test]
    async fn granted_capability_reaches_the_terminal_method() {
        let controller = readcontacts_controller();
        let mut perms = HashMap::new();
        perms.insert("readContacts".to_string(), RequestedPermission::default());
        controller.add_permissions_for("o1", perms).await;

        let outcome = controller
            .handle_request(OriginMetadata::new("o1"), Request::new("readContacts", vec![json!(["hi"])]))
            .await;
        match outcome {
            Outcome::Handled(res) => assert_eq!(res.result.unwrap(), json!(["hi"])),
            Outcome::PassThrough => panic!("expected a handled response"),
        }
    }

    #[tokio::test]
    async fn internal_get_permissions_round_trips_through_the_facade() {
        let controller = readcontacts_controller();
        let mut perms = HashMap::new();
        perms.insert("readContacts".to_string(), RequestedPermission::default());
        controller.add_permissions_for("o1", perms).await;

        let outcome = controller
            .handle_request(OriginMetadata::new("o1"), Request::new("wallet_getPermissions", vec![]))
            .await;
        match outcome {
            Outcome::Handled(res) => assert_eq!(res.result.unwrap().as_array().unwrap().len(), 1),
            Outcome::PassThrough => panic!("expected a handled response"),
        }
    }
}
