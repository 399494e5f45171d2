//! Metadata envelope carried alongside every tool invocation.

use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Reserved envelope key holding the caller's session context.
pub const DEPS_KEY: &str = "deps";

/// Per-invocation metadata handed to a tool next to its arguments.
///
/// The session context is held behind an `Arc` and is never inspected here,
/// so a tool sees the exact allocation the caller passed in. Secondary
/// entries (progress tokens and the like) live in `extra`; they can never
/// shadow `deps`.
#[derive(Debug)]
pub struct Metadata<D> {
    deps: Arc<D>,
    extra: Map<String, Value>,
}

impl<D> Metadata<D> {
    /// Create an envelope carrying only the session context.
    pub fn new(deps: Arc<D>) -> Self {
        Self {
            deps,
            extra: Map::new(),
        }
    }

    /// Create an envelope with extra entries. A `deps` entry in `extra` is dropped.
    pub fn with_extra(deps: Arc<D>, mut extra: Map<String, Value>) -> Self {
        extra.remove(DEPS_KEY);
        Self { deps, extra }
    }

    /// The session context.
    pub fn deps(&self) -> &D {
        &self.deps
    }

    /// Shared handle to the session context, for tools that hand it on.
    pub fn deps_handle(&self) -> &Arc<D> {
        &self.deps
    }

    /// Look up a secondary entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// All secondary entries.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

impl<D> Clone for Metadata<D> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
            extra: self.extra.clone(),
        }
    }
}

impl<D: Serialize> Metadata<D> {
    /// Render the envelope as a JSON object, e.g. for an MCP `_meta` field.
    pub fn to_value(&self) -> Result<Value> {
        let mut map = Map::with_capacity(self.extra.len() + 1);
        map.insert(DEPS_KEY.to_string(), serde_json::to_value(&*self.deps)?);
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shares_context_allocation() {
        let ctx = Arc::new(42_u32);
        let meta = Metadata::new(Arc::clone(&ctx));

        assert!(Arc::ptr_eq(meta.deps_handle(), &ctx));
        assert_eq!(*meta.deps(), 42);
    }

    #[test]
    fn test_null_context_still_renders_deps_key() {
        let meta: Metadata<Option<u32>> = Metadata::new(Arc::new(None));
        let value = meta.to_value().unwrap();

        assert_eq!(value, json!({ "deps": null }));
    }

    #[test]
    fn test_extra_entries_cannot_shadow_deps() {
        let mut extra = Map::new();
        extra.insert("deps".to_string(), json!("spoofed"));
        extra.insert("progressToken".to_string(), json!(7));

        let meta = Metadata::with_extra(Arc::new(json!({ "user": "ana" })), extra);

        assert!(meta.get("deps").is_none());
        assert_eq!(meta.get("progressToken"), Some(&json!(7)));
        assert_eq!(
            meta.to_value().unwrap(),
            json!({ "deps": { "user": "ana" }, "progressToken": 7 })
        );
    }
}
