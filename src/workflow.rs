//! Permission-request workflow: the two internal handlers,
//! `getPermissions` and the `requestPermissions` handshake (validate,
//! canonicalize, dedupe via the fast path, enqueue, prompt, grant).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use uuid::Uuid;

use crate::capability::sort_caveats;
use crate::error::Error;
use crate::protocol::{OriginMetadata, Request, Response};
use crate::router::MethodRouter;
use crate::store::{PermissionRequest, PermissionStore, RequestedPermission};

/// What the user-approval function resolves to: the subset (or all) of
/// the requested permissions the user actually approved, keyed by
/// method name. An empty map means the user rejected everything.
pub type ApprovedPermissions = HashMap<String, RequestedPermission>;

pub type ApprovalFuture = BoxFuture<'static, Result<ApprovedPermissions, Error>>;

/// `(PermissionRequest) -> Promise<approvedPermissions>` — required at
/// construction, may prompt a human.
pub type RequestUserApproval = Arc<dyn Fn(PermissionRequest) -> ApprovalFuture + Send + Sync>;

pub struct PermissionWorkflow {
    store: Arc<PermissionStore>,
    router: Arc<MethodRouter>,
    request_user_approval: RequestUserApproval,
}

impl PermissionWorkflow {
    pub fn new(store: Arc<PermissionStore>, router: Arc<MethodRouter>, request_user_approval: RequestUserApproval) -> Self {
        Self {
            store,
            router,
            request_user_approval,
        }
    }

    /// `getPermissions()` — no side effects.
    pub async fn get_permissions(&self, origin: &str) -> Response {
        let perms = self.store.get_permissions_for_domain(origin).await;
        Response::ok(serde_json::to_value(perms).expect("capabilities always serialize"))
    }

    /// `requestPermissions(permissions, extraMetadata?)`.
    pub async fn request_permissions(&self, origin_metadata: &OriginMetadata, req: &Request) -> Response {
        let Some(requested) = parse_requested_permissions(req) else {
            return Response::err(Error::invalid_request("malformed requestPermissions payload"));
        };
        let mut requested = requested;
        canonicalize(&mut requested);

        let metadata = enrich_metadata(origin_metadata, req);

        // Fast path: already hold exactly this set, no prompt needed.
        if self.store.has_permissions(&origin_metadata.origin, &requested).await {
            tracing::debug!(origin = %origin_metadata.origin, "requestPermissions fast-pathed, already held");
            return self.get_permissions(&origin_metadata.origin).await;
        }

        let pending = PermissionRequest {
            origin: origin_metadata.origin.clone(),
            metadata: metadata.clone(),
            permissions: requested,
        };
        self.store.enqueue_permissions_request(pending.clone()).await;

        let outcome = (self.request_user_approval)(pending).await;

        // Guaranteed cleanup: runs on every exit path below, since it's
        // the only code between the single await point and the match
        // that branches on its result.
        let request_id = metadata.get("id").cloned().unwrap_or(Value::Null);
        self.store.remove_permissions_request(&request_id).await;

        match outcome {
            Ok(approved) if approved.is_empty() => {
                tracing::warn!(origin = %origin_metadata.origin, "requestPermissions rejected (empty approval)");
                Response::err(Error::user_rejected())
            }
            Ok(approved) => {
                for method in approved.keys() {
                    if self.router.get_method_key_for(method).is_empty() {
                        tracing::warn!(%method, "approved an unknown method");
                        return Response::err(Error::method_not_found());
                    }
                }
                self.store.add_permissions_for(&origin_metadata.origin, approved).await;
                tracing::info!(origin = %origin_metadata.origin, "permissions granted");
                self.get_permissions(&origin_metadata.origin).await
            }
            Err(err) => Response::err(err),
        }
    }
}

fn parse_requested_permissions(req: &Request) -> Option<HashMap<String, RequestedPermission>> {
    let first = req.params.first()?;
    let Value::Object(map) = first else {
        return None;
    };
    if map.is_empty() {
        return None;
    }
    let mut requested = HashMap::new();
    for (method, descriptor) in map {
        let parsed: RequestedPermission = serde_json::from_value(descriptor.clone()).ok()?;
        requested.insert(method.clone(), parsed);
    }
    Some(requested)
}

fn canonicalize(requested: &mut HashMap<String, RequestedPermission>) {
    for perm in requested.values_mut() {
        if let Some(caveats) = perm.caveats.as_mut() {
            sort_caveats(caveats);
            if caveats.is_empty() {
                perm.caveats = None;
            }
        }
    }
}

/// Shallow-merges `req.params[1].metadata` under `origin_metadata` (the
/// caller-supplied origin metadata wins on conflict), then ensures an
/// `id` exists, synthesizing a fresh UUID if not.
fn enrich_metadata(origin_metadata: &OriginMetadata, req: &Request) -> Value {
    let mut merged = serde_json::Map::new();
    if let Some(extra) = req.params.get(1) {
        if let Some(Value::Object(extra_metadata)) = extra.get("metadata") {
            merged = extra_metadata.clone();
        }
    }
    merged.insert("origin".to_string(), Value::String(origin_metadata.origin.clone()));
    if let Some(id) = &origin_metadata.id {
        merged.insert("id".to_string(), id.clone());
    }
    if !merged.contains_key("id") {
        merged.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    Value::Object(merged)
}
