//! Permission store: per-origin capability tables, the pending
//! permission-request queue, and the derived method-description map, all
//! guarded by a single `tokio::sync::RwLock` and published on every
//! mutation through a `watch` channel so observers see state changes
//! without polling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::capability::{caveats_multiset_equal, Capability};
use crate::error::Error;

/// `{permissions: [Capability]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainEntry {
    pub permissions: Vec<Capability>,
}

/// A single entry in a `requestPermissions` payload: `{caveats?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestedPermission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caveats: Option<Vec<crate::capability::Caveat>>,
}

/// `{origin, metadata, permissions}`, held in the pending queue keyed by
/// `metadata.id`. `metadata` is an open-ended object (origin, id, and
/// whatever the caller's `extraMetadata` added) rather than the narrow
/// `OriginMetadata` the middleware entry point receives, since
/// `requestPermissions` can enrich it with arbitrary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub origin: String,
    pub metadata: Value,
    pub permissions: HashMap<String, RequestedPermission>,
}

/// `{domains, permissionsRequests, permissionsDescriptions}` — serialized
/// verbatim by whatever persists it; the core prescribes no wire format
/// beyond these field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub domains: HashMap<String, DomainEntry>,
    pub permissions_requests: Vec<PermissionRequest>,
    pub permissions_descriptions: HashMap<String, String>,
}

pub struct PermissionStore {
    state: RwLock<PersistedState>,
    updates: watch::Sender<PersistedState>,
}

impl PermissionStore {
    pub fn new(permissions_descriptions: HashMap<String, String>) -> Self {
        let initial = PersistedState {
            domains: HashMap::new(),
            permissions_requests: Vec::new(),
            permissions_descriptions,
        };
        let (updates, _) = watch::channel(initial.clone());
        Self {
            state: RwLock::new(initial),
            updates,
        }
    }

    /// Observe the persisted state as it changes.
    pub fn subscribe(&self) -> watch::Receiver<PersistedState> {
        self.updates.subscribe()
    }

    async fn publish(&self, state: &PersistedState) {
        let _ = self.updates.send(state.clone());
    }

    pub async fn get_permissions_for_domain(&self, origin: &str) -> Vec<Capability> {
        self.state
            .read()
            .await
            .domains
            .get(origin)
            .map(|d| d.permissions.clone())
            .unwrap_or_default()
    }

    /// Returns the first capability on the domain whose
    /// `parentCapability` equals `method`.
    ///
    /// Returns `Result` rather than a bare `Option` so a fallible store
    /// backend can surface a read error, which the caller converts to the
    /// generic `code:1` error; a `tokio::sync::RwLock` never poisons, so
    /// `Err` is unreachable with this in-memory backend, but the signature
    /// stays honest about what a persisted backend could do.
    pub async fn get_permission(&self, origin: &str, method: &str) -> Result<Option<Capability>, Error> {
        let state = self.state.read().await;
        Ok(state
            .domains
            .get(origin)
            .and_then(|d| d.permissions.iter().find(|c| c.parent_capability == method))
            .cloned())
    }

    pub async fn has_permissions(&self, origin: &str, requested: &HashMap<String, RequestedPermission>) -> bool {
        let state = self.state.read().await;
        let Some(domain) = state.domains.get(origin) else {
            return requested.is_empty();
        };
        requested.iter().all(|(method, req)| {
            domain
                .permissions
                .iter()
                .find(|c| &c.parent_capability == method)
                .map(|c| caveats_multiset_equal(c.caveats.as_deref(), req.caveats.as_deref()))
                .unwrap_or(false)
        })
    }

    /// For each method in `new_permissions`, removes any existing
    /// capability on the domain for that method, then appends a freshly
    /// constructed `Capability`. Other capabilities are untouched.
    pub async fn add_permissions_for(&self, origin: &str, new_permissions: HashMap<String, RequestedPermission>) {
        let mut state = self.state.write().await;
        let entry = state.domains.entry(origin.to_string()).or_default();
        for (method, req) in new_permissions {
            entry.permissions.retain(|c| c.parent_capability != method);
            entry.permissions.push(Capability::new(&method, origin, req.caveats));
        }
        let snapshot = state.clone();
        drop(state);
        self.publish(&snapshot).await;
    }

    pub async fn remove_permissions_for(&self, origin: &str, methods: &[String]) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.domains.get_mut(origin) {
            entry.permissions.retain(|c| !methods.contains(&c.parent_capability));
            if entry.permissions.is_empty() {
                state.domains.remove(origin);
            }
        }
        let snapshot = state.clone();
        drop(state);
        self.publish(&snapshot).await;
    }

    /// Stores `entry` if non-empty; deletes the domain key entirely
    /// otherwise. Guarantees no empty domain entry ever persists.
    pub async fn set_domain(&self, origin: &str, entry: DomainEntry) {
        let mut state = self.state.write().await;
        if entry.permissions.is_empty() {
            state.domains.remove(origin);
        } else {
            state.domains.insert(origin.to_string(), entry);
        }
        let snapshot = state.clone();
        drop(state);
        self.publish(&snapshot).await;
    }

    pub async fn get_domains(&self) -> HashMap<String, DomainEntry> {
        self.state.read().await.domains.clone()
    }

    pub async fn clear_domains(&self) {
        let mut state = self.state.write().await;
        state.domains.clear();
        let snapshot = state.clone();
        drop(state);
        self.publish(&snapshot).await;
    }

    pub async fn enqueue_permissions_request(&self, request: PermissionRequest) {
        let mut state = self.state.write().await;
        debug!(origin = %request.origin, "enqueueing permission request");
        state.permissions_requests.push(request);
        let snapshot = state.clone();
        drop(state);
        self.publish(&snapshot).await;
    }

    pub async fn get_permissions_requests(&self) -> Vec<PermissionRequest> {
        self.state.read().await.permissions_requests.clone()
    }

    /// Drops the pending request with this `metadata.id` from the queue.
    /// A no-op if it is already gone (e.g. a caller-initiated cancel
    /// raced with the finalizer).
    pub async fn remove_permissions_request(&self, id: &Value) {
        let mut state = self.state.write().await;
        state
            .permissions_requests
            .retain(|r| r.metadata.get("id") != Some(id));
        let snapshot = state.clone();
        drop(state);
        self.publish(&snapshot).await;
    }

    pub async fn permissions_descriptions(&self) -> HashMap<String, String> {
        self.state.read().await.permissions_descriptions.clone()
    }
}
