use crate::dispatch::{Arguments, Metadata, Tool};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

/// Echoes the session context back to the caller.
pub struct EchoDeps;

#[async_trait]
impl<D: Serialize + Send + Sync + 'static> Tool<D> for EchoDeps {
    fn name(&self) -> &str {
        "echo_deps"
    }

    fn description(&self) -> &str {
        "Echo the run context. Returns an echo message and the deps."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _args: Arguments, meta: &Metadata<D>) -> Result<Value> {
        info!("This is an info message");
        Ok(json!({
            "echo": "This is an echo message",
            "deps": serde_json::to_value(meta.deps())?,
        }))
    }
}
