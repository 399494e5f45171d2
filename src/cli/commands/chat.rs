//! Interactive chat, against a local agent or a running API.

use super::build_agent;
use crate::agent::{Agent, ChatMessage};
use crate::api::{ChatRequest, ChatResponse};
use crate::cli::Output;
use crate::config::Settings;
use crate::toolsets::Toolset;
use anyhow::Result;
use console::style;
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Keep at most this many history messages between turns.
const MAX_HISTORY: usize = 30;

/// Run the interactive chat command.
pub async fn run_chat(
    api: Option<String>,
    deps: Value,
    model: Option<String>,
    toolsets: &[Toolset],
    mut settings: Settings,
) -> Result<()> {
    if let Some(model) = model {
        settings.llm.model = model;
    }

    let mut backend = match api {
        Some(url) => {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.api.client_timeout_secs))
                .build()?;
            Backend::Remote { http, url }
        }
        None => Backend::Local {
            agent: build_agent(&settings, toolsets).await?,
            history: Vec::new(),
        },
    };
    let deps = Arc::new(deps);

    println!("\n{}", style("huddle chat").bold().cyan());
    if let Backend::Remote { url, .. } = &backend {
        println!("{}", style(format!("Connected to {}", url)).dim());
    }
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            backend.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        match backend.send(input, &deps).await {
            Ok(reply) => println!("\n{} {}\n", style("huddle:").cyan().bold(), reply),
            Err(e) => Output::error(&format!("Error: {}", e)),
        }
    }

    Ok(())
}

enum Backend {
    Local {
        agent: Agent<Value>,
        history: Vec<ChatMessage>,
    },
    Remote {
        http: reqwest::Client,
        url: String,
    },
}

impl Backend {
    fn clear(&mut self) {
        if let Backend::Local { history, .. } = self {
            history.clear();
        }
    }

    async fn send(&mut self, query: &str, deps: &Arc<Value>) -> Result<String> {
        match self {
            Backend::Local { agent, history } => {
                let response = agent.run(query, Arc::clone(deps), history).await?;
                for call in &response.tool_calls {
                    println!("{}", style(format!("  [{}]", call.name)).dim());
                }
                *history = response.history;
                trim_history(history, MAX_HISTORY);
                Ok(response.content)
            }
            Backend::Remote { http, url } => Ok(remote_reply(http, url, query, deps).await),
        }
    }
}

/// Post one query to `{url}/chat`. Failures are turned into the reply text.
pub(crate) async fn remote_reply(http: &reqwest::Client, url: &str, query: &str, deps: &Value) -> String {
    let endpoint = format!("{}/chat", url.trim_end_matches('/'));
    debug!("Posting chat query to {}", endpoint);

    let request = ChatRequest {
        query: query.to_string(),
        deps: deps.clone(),
    };

    let outcome = async {
        http.post(&endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await
    }
    .await;

    match outcome {
        Ok(reply) => reply.response,
        Err(e) => format!("Error connecting to agent: {}", e),
    }
}

/// Drop the oldest messages beyond `max`, never starting on a tool result.
fn trim_history(history: &mut Vec<ChatMessage>, max: usize) {
    if history.len() <= max {
        return;
    }
    let mut start = history.len() - max;
    while start < history.len() && !matches!(history[start], ChatMessage::User { .. }) {
        start += 1;
    }
    history.drain(..start);
}
