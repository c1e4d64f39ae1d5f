//! The capability record and the `Caveat` value it may carry.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// JSON-LD framing tag stamped onto every emitted capability.
pub const CONTEXT_URI: &str = "https://warden.example/capability/v1";

/// A named constraint consumed by a caveat-registry generator.
///
/// Two caveats are equal iff `type` matches and `value` is deep-equal —
/// `serde_json::Value`'s derived `PartialEq` already does structural,
/// order-independent comparison for objects, so `Caveat`'s derived
/// `PartialEq` is already the right equality for this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caveat {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

impl Caveat {
    pub fn new(kind: impl Into<String>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }
}

/// Sort caveats into canonical order: ascending by `type`, then by a
/// canonical serialization of `value`. `serde_json::Value` objects
/// serialize with sorted keys by default (no `preserve_order` feature),
/// so the serialized string is already a stable total order. Idempotent.
pub fn sort_caveats(caveats: &mut [Caveat]) {
    caveats.sort_by(|a, b| {
        a.kind.cmp(&b.kind).then_with(|| {
            let sa = serde_json::to_string(&a.value).unwrap_or_default();
            let sb = serde_json::to_string(&b.value).unwrap_or_default();
            sa.cmp(&sb)
        })
    });
}

/// Two caveat lists are equal as multisets iff, once both are put in
/// canonical order, they compare element-wise equal. Absent caveats on
/// both sides count as equal; one-sided absence or a length mismatch
/// fails.
pub fn caveats_multiset_equal(a: Option<&[Caveat]>, b: Option<&[Caveat]>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut a = a.to_vec();
            let mut b = b.to_vec();
            sort_caveats(&mut a);
            sort_caveats(&mut b);
            a == b
        }
        _ => false,
    }
}

/// Immutable record describing one granted method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub parent_capability: String,
    pub invoker: String,
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caveats: Option<Vec<Caveat>>,
}

impl Capability {
    /// Stamps a fresh `id` and the current time, sorts the caveats into
    /// canonical order, and normalizes an empty caveat list to `None` so
    /// "absent" has one representation.
    pub fn new(method: impl Into<String>, invoker: impl Into<String>, caveats: Option<Vec<Caveat>>) -> Self {
        let caveats = caveats.map(|mut list| {
            sort_caveats(&mut list);
            list
        });
        let caveats = caveats.filter(|list| !list.is_empty());

        Self {
            context: vec![CONTEXT_URI.to_string()],
            parent_capability: method.into(),
            invoker: invoker.into(),
            id: Uuid::new_v4().to_string(),
            date: Utc::now().timestamp_millis(),
            caveats,
        }
    }
}
