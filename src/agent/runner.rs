//! Agent runner with tool calling loop.

use super::model::{ChatMessage, ChatModel, ModelTurn, ToolInvocation};
use crate::config::LlmSettings;
use crate::dispatch::{value_to_text, Arguments, Dispatcher};
use crate::error::{HuddleError, Result};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant";

/// Agent that answers queries by calling tools through a [`Dispatcher`].
///
/// Every tool call made during a run sees the same session context.
pub struct Agent<D: Send + Sync + 'static> {
    model: Arc<dyn ChatModel>,
    dispatcher: Dispatcher<D>,
    max_iterations: usize,
    system_prompt: String,
}

impl<D: Send + Sync + 'static> Agent<D> {
    /// Create a new agent over a model and a dispatcher.
    pub fn new(model: Arc<dyn ChatModel>, dispatcher: Dispatcher<D>) -> Self {
        Self {
            model,
            dispatcher,
            max_iterations: 15,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Apply prompt and iteration limit from `[llm]`.
    pub fn with_settings(self, settings: &LlmSettings) -> Self {
        self.with_system_prompt(&settings.system_prompt)
            .with_max_iterations(settings.max_iterations)
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn dispatcher(&self) -> &Dispatcher<D> {
        &self.dispatcher
    }

    /// Run one user query.
    ///
    /// `history` holds earlier user/assistant/tool messages of the
    /// conversation, without the system prompt. The returned response
    /// carries the history extended with this exchange.
    pub async fn run(
        &self,
        query: &str,
        deps: Arc<D>,
        history: &[ChatMessage],
    ) -> Result<AgentResponse> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(query));

        let tools = self.dispatcher.registry().definitions();
        let mut tool_calls_made = Vec::new();
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(HuddleError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);

            match self.model.complete(&messages, &tools).await? {
                ModelTurn::Message(content) => {
                    messages.push(ChatMessage::assistant(&content));
                    // Drop the system prompt so callers can feed history straight back in.
                    messages.remove(0);
                    return Ok(AgentResponse {
                        content,
                        tool_calls: tool_calls_made,
                        iterations,
                        history: messages,
                    });
                }
                ModelTurn::ToolCalls { content, calls } => {
                    let records = join_all(
                        calls
                            .iter()
                            .map(|call| self.execute_tool_call(call, Arc::clone(&deps))),
                    )
                    .await;

                    messages.push(ChatMessage::Assistant {
                        content,
                        tool_calls: calls.clone(),
                    });
                    for (call, record) in calls.iter().zip(&records) {
                        messages.push(ChatMessage::Tool {
                            tool_call_id: call.id.clone(),
                            content: record.result.clone(),
                        });
                    }
                    tool_calls_made.extend(records);
                }
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(&self, call: &ToolInvocation, deps: Arc<D>) -> ToolCallRecord {
        info!("Agent calling tool: {} with args: {}", call.name, call.arguments);

        let result = match parse_model_arguments(&call.arguments) {
            Ok(args) => match self.dispatcher.dispatch(&call.name, args, deps).await {
                Ok(output) => value_to_text(&output),
                Err(e) => format!("Tool error: {}", e),
            },
            Err(e) => format!("Failed to parse tool call: {}", e),
        };

        ToolCallRecord {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
        }
    }
}

/// Models send arguments as a JSON string, sometimes an empty one.
fn parse_model_arguments(raw: &str) -> Result<Arguments> {
    if raw.trim().is_empty() {
        return Ok(Arguments::new());
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Arguments::new()),
        other => Err(HuddleError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
    /// Conversation so far, without the system prompt.
    pub history: Vec<ChatMessage>,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: String,
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
