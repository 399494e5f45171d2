//! LLM agent that answers queries by calling dispatched tools.
//!
//! The agent owns a [`ChatModel`] and a [`Dispatcher`](crate::dispatch::Dispatcher).
//! Each run carries one session context that every tool call sees as `deps`.

mod model;
mod runner;

pub use model::{create_chat_model, ChatMessage, ChatModel, ModelTurn, OpenAIChatModel, ToolInvocation};
pub use runner::{Agent, AgentResponse, ToolCallRecord, DEFAULT_SYSTEM_PROMPT};

#[cfg(test)]
pub(crate) use runner::tests::ScriptedModel;
