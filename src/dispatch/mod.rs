//! Tool dispatch with per-session context propagation.
//!
//! A [`Dispatcher`] resolves a tool by name in a [`ToolRegistry`], wraps the
//! caller's session context in a [`Metadata`] envelope under the reserved
//! [`DEPS_KEY`], and hands both to the tool. Whatever the tool returns, value
//! or error, goes back to the caller untouched.
//!
//! Tools that need caller-scoped state read it with [`Metadata::deps`]; the
//! rest never look at the envelope.

mod dispatcher;
mod envelope;
mod registry;
mod tool;

pub use dispatcher::Dispatcher;
pub use envelope::{Metadata, DEPS_KEY};
pub use registry::ToolRegistry;
pub use tool::{parse_arguments, value_to_text, Arguments, Tool, ToolDefinition};
