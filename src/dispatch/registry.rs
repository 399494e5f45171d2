//! Name-to-tool registry.

use super::{Tool, ToolDefinition};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Mapping from exposed tool name to implementation.
///
/// Built once by wiring code, then shared read-only behind an `Arc`.
pub struct ToolRegistry<D: Send + Sync + 'static> {
    tools: HashMap<String, Arc<dyn Tool<D>>>,
}

impl<D: Send + Sync + 'static> ToolRegistry<D> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its own name, replacing any previous entry.
    pub fn register(&mut self, tool: Arc<dyn Tool<D>>) {
        let name = tool.name().to_string();
        self.insert(name, tool);
    }

    /// Register a tool as `{prefix}_{name}`.
    pub fn register_prefixed(&mut self, prefix: &str, tool: Arc<dyn Tool<D>>) {
        let name = prefixed_name(prefix, tool.name());
        self.insert(name, tool);
    }

    /// Register every tool of a toolset, optionally under a prefix.
    pub fn extend<I>(&mut self, prefix: Option<&str>, tools: I)
    where
        I: IntoIterator<Item = Arc<dyn Tool<D>>>,
    {
        for tool in tools {
            match prefix {
                Some(p) => self.register_prefixed(p, tool),
                None => self.register(tool),
            }
        }
    }

    fn insert(&mut self, name: String, tool: Arc<dyn Tool<D>>) {
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!("Tool '{}' registered twice, keeping the latest", name);
        }
    }

    /// Resolve a tool by exposed name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool<D>>> {
        self.tools.get(name).cloned()
    }

    /// Whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Exposed names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Definitions of every registered tool under its exposed name, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .iter()
            .map(|(name, tool)| ToolDefinition {
                name: name.clone(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl<D: Send + Sync + 'static> Default for ToolRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the exposed name of a prefixed tool.
pub(crate) fn prefixed_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Arguments, Metadata};
    use crate::error::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Named(&'static str);

    #[async_trait]
    impl Tool<()> for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn call(&self, _args: Arguments, _meta: &Metadata<()>) -> Result<Value> {
            Ok(json!(self.0))
        }
    }

    #[test]
    fn test_prefixed_registration() {
        let mut registry: ToolRegistry<()> = ToolRegistry::new();
        registry.extend(
            Some("sleeper"),
            [Arc::new(Named("get_user")) as Arc<dyn Tool<()>>],
        );
        registry.register(Arc::new(Named("retrieve")));

        assert!(registry.contains("sleeper_get_user"));
        assert!(!registry.contains("get_user"));
        assert_eq!(registry.names(), vec!["retrieve", "sleeper_get_user"]);
    }

    #[test]
    fn test_definitions_use_exposed_names() {
        let mut registry: ToolRegistry<()> = ToolRegistry::new();
        registry.register_prefixed("espn", Arc::new(Named("get_teams")));

        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "espn_get_teams");
        assert_eq!(defs[0].description, "test tool");
    }

    #[test]
    fn test_empty_prefix_keeps_name() {
        assert_eq!(prefixed_name("", "echo_deps"), "echo_deps");
        assert_eq!(prefixed_name("deps", "echo_deps"), "deps_echo_deps");
    }
}
