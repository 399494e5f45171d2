//! Chat model interface and the OpenAI / Azure OpenAI implementation.

use crate::config::{LlmProvider, LlmSettings};
use crate::dispatch::ToolDefinition;
use crate::error::{HuddleError, Result};
use crate::openai::{create_azure_client, create_client};
use async_openai::config::Config;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolInvocation>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        ChatMessage::System {
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        ChatMessage::User {
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        ChatMessage::Assistant {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// What the model answered on one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Final text answer.
    Message(String),
    /// The model wants tools run before it continues.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolInvocation>,
    },
}

/// A chat completion backend that can request tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<ModelTurn>;

    fn model_name(&self) -> &str;
}

/// Build the model configured in `[llm]`.
pub fn create_chat_model(settings: &LlmSettings) -> Result<Arc<dyn ChatModel>> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    let model: Arc<dyn ChatModel> = match settings.provider {
        LlmProvider::OpenAI => Arc::new(OpenAIChatModel::new(create_client(timeout)?, &settings.model)),
        LlmProvider::Azure => Arc::new(OpenAIChatModel::new(
            create_azure_client(&settings.model, timeout)?,
            &settings.model,
        )),
    };
    debug!("Using {} model {}", settings.provider, settings.model);
    Ok(model)
}

/// Chat model served by the OpenAI API or an Azure OpenAI deployment.
pub struct OpenAIChatModel<C: Config> {
    client: Client<C>,
    model: String,
}

impl<C: Config> OpenAIChatModel<C> {
    pub fn new(client: Client<C>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

fn agent_err<E: std::fmt::Display>(e: E) -> HuddleError {
    HuddleError::Agent(e.to_string())
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let message = match message {
        ChatMessage::System { content } => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(agent_err)?
            .into(),

        ChatMessage::User { content } => ChatCompletionRequestUserMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(agent_err)?
            .into(),

        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(text) = content {
                args.content(text.clone());
            }
            if !tool_calls.is_empty() {
                args.tool_calls(
                    tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            args.build().map_err(agent_err)?.into()
        }

        ChatMessage::Tool {
            tool_call_id,
            content,
        } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(tool_call_id.clone())
            .content(content.clone())
            .build()
            .map_err(agent_err)?
            .into(),
    };
    Ok(message)
}

fn to_completion_tool(def: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: def.name.clone(),
            description: Some(def.description.clone()).filter(|d| !d.is_empty()),
            parameters: Some(def.input_schema.clone()),
            strict: None,
        },
    }
}

#[async_trait]
impl<C: Config + Send + Sync + 'static> ChatModel for OpenAIChatModel<C> {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<ModelTurn> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(messages);
        if !tools.is_empty() {
            request.tools(tools.iter().map(to_completion_tool).collect::<Vec<_>>());
        }
        let request = request.build().map_err(agent_err)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| HuddleError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| HuddleError::Agent("No response from model".to_string()))?;

        let calls: Vec<ToolInvocation> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolInvocation {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        if calls.is_empty() {
            Ok(ModelTurn::Message(choice.message.content.unwrap_or_default()))
        } else {
            Ok(ModelTurn::ToolCalls {
                content: choice.message.content,
                calls,
            })
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
