//! The context-propagating dispatcher.

use super::{Arguments, Metadata, ToolRegistry};
use crate::error::{HuddleError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Relays tool invocations to a registry, attaching the session context.
///
/// Holds nothing but a shared read-only registry, so clones are cheap and
/// concurrent dispatches never contend.
pub struct Dispatcher<D: Send + Sync + 'static> {
    registry: Arc<ToolRegistry<D>>,
}

impl<D: Send + Sync + 'static> Clone for Dispatcher<D> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<D: Send + Sync + 'static> Dispatcher<D> {
    /// Create a dispatcher over a registry.
    pub fn new(registry: Arc<ToolRegistry<D>>) -> Self {
        Self { registry }
    }

    /// The registry tools are resolved from.
    pub fn registry(&self) -> &Arc<ToolRegistry<D>> {
        &self.registry
    }

    /// Invoke `tool_name` with `arguments`, exposing `session_context` as `deps`.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        arguments: Arguments,
        session_context: Arc<D>,
    ) -> Result<Value> {
        self.dispatch_with_metadata(tool_name, arguments, Metadata::new(session_context))
            .await
    }

    /// Invoke a tool with a caller-built envelope.
    pub async fn dispatch_with_metadata(
        &self,
        tool_name: &str,
        arguments: Arguments,
        meta: Metadata<D>,
    ) -> Result<Value> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| HuddleError::ToolNotFound(tool_name.to_string()))?;

        info!(tool = tool_name, args = arguments.len(), "Dispatching tool call");

        tool.call(arguments, &meta).await
    }

    /// Like [`dispatch`](Self::dispatch), but abandons the tool call when `token` fires.
    ///
    /// The tool future is dropped on cancellation, which cancels whatever it
    /// was awaiting. No partial result is returned.
    pub async fn dispatch_cancellable(
        &self,
        tool_name: &str,
        arguments: Arguments,
        session_context: Arc<D>,
        token: &CancellationToken,
    ) -> Result<Value> {
        self.dispatch_with_metadata_cancellable(
            tool_name,
            arguments,
            Metadata::new(session_context),
            token,
        )
        .await
    }

    /// Cancellable variant of [`dispatch_with_metadata`](Self::dispatch_with_metadata).
    pub async fn dispatch_with_metadata_cancellable(
        &self,
        tool_name: &str,
        arguments: Arguments,
        meta: Metadata<D>,
        token: &CancellationToken,
    ) -> Result<Value> {
        if token.is_cancelled() {
            return Err(HuddleError::Cancelled(tool_name.to_string()));
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(tool = tool_name, "Tool call cancelled by caller");
                Err(HuddleError::Cancelled(tool_name.to_string()))
            }
            result = self.dispatch_with_metadata(tool_name, arguments, meta) => result,
        }
    }
}
