//! # warden
//!
//! Capability-based permissions middleware for a request/response
//! protocol where each call carries a `method`, positional `params`, and
//! yields a `result` or an `error`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    PermissionsController                    │
//! ├────────────────────────────────────────────────────────────┤
//! │  classify(method)                                           │
//! │    │                                                        │
//! │    ├─ safe        ──────────────────────────▶ pass-through  │
//! │    ├─ internal    ──▶ PermissionWorkflow ────▶ response     │
//! │    └─ restricted  ──▶ PermissionStore.get_permission         │
//! │                         │                                    │
//! │                  found  │  not found                         │
//! │                         ▼          ▼                         │
//! │           RestrictedMethodExecutor   unauthorized             │
//! │             (CaveatRegistry chain)                           │
//! │                         ▼                                    │
//! │                   terminal method                            │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A domain (an identified, possibly untrusted origin) calls restricted
//! methods through [`PermissionsController::handle_request`]. Two
//! internal methods, `getPermissions` and `requestPermissions`, let a
//! domain enumerate its current capabilities and request new ones — the
//! latter may require an interactive user-approval round trip.
//!
//! The transport that delivers requests, the user-approval UI, and the
//! bodies of restricted methods are all owned by the host process; see
//! `src/bin/wardend.rs` for a minimal one wired over stdio.

pub mod capability;
pub mod caveat;
pub mod controller;
pub mod error;
pub mod executor;
pub mod protocol;
pub mod router;
pub mod store;
pub mod workflow;

pub use capability::{Capability, Caveat};
pub use controller::{Config, Outcome, PermissionsController, RestrictedMethodDescriptor};
pub use error::Error;
pub use protocol::{Handler, OriginMetadata, Request, Response};
pub use store::{DomainEntry, PermissionRequest, RequestedPermission};
pub use workflow::RequestUserApproval;
