use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::ChatError;
use crate::types::ChatMessage;

pub const SYSTEM_PROMPT: &str = r#"You are a browser automation agent. You operate a live web page by issuing ONE action per reply.

Each message shows the current URL and the interactive elements of the page, one per line, prefixed with their index, e.g. [3]<button>Save</button>.

Reply with exactly one of:
- ACTION: click(index)
- ACTION: type(index, "text")
- ACTION: scroll(down) or ACTION: scroll(up)
- ACTION: select(index, "option text")
- DONE: <short summary of what was achieved>
- ASK: <question for the user, if the task is ambiguous>

Rules:
1. Only use indices from the latest element list. Indices change after every action.
2. Quote text arguments.
3. After each action you will see the refreshed page. Decide the next step from what you see.
4. When the task is accomplished, reply with DONE.
5. Keep steps minimal."#;

/// The reasoning service: one user turn in, free text out.
#[async_trait]
pub trait ChatCapability: Send + Sync {
    async fn chat(&self, message: &str, history: &[ChatMessage]) -> Result<String, ChatError>;
}

#[async_trait]
impl<F> ChatCapability for F
where
    F: Fn(&str, &[ChatMessage]) -> Result<String, ChatError> + Send + Sync,
{
    async fn chat(&self, message: &str, history: &[ChatMessage]) -> Result<String, ChatError> {
        self(message, history)
    }
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    history_window: usize,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig, history_window: usize) -> Result<Self, ChatError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ChatError::Other(format!("{} not set in environment", config.api_key_env)))?;
        Ok(Self::with_api_key(config, api_key, history_window))
    }

    pub fn with_api_key(config: &LlmConfig, api_key: String, history_window: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            history_window,
        }
    }

    /// System prompt, the most recent history window, then the new turn.
    fn build_messages(&self, message: &str, history: &[ChatMessage]) -> Vec<Value> {
        let start = history.len().saturating_sub(self.history_window);
        std::iter::once(&ChatMessage::system(SYSTEM_PROMPT))
            .chain(&history[start..])
            .chain(std::iter::once(&ChatMessage::user(message)))
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect()
    }
}

#[async_trait]
impl ChatCapability for OpenAiChat {
    async fn chat(&self, message: &str, history: &[ChatMessage]) -> Result<String, ChatError> {
        let messages = self.build_messages(message, history);
        debug!("Sending {} messages to {}", messages.len(), self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": self.temperature,
            }))
            .send()
            .await?;

        let status = response.status();
        let json_resp: Value = response.json().await?;

        if !status.is_success() {
            let err_msg = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error")
                .to_string();
            warn!("LLM API error ({}): {}", status, err_msg);
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: err_msg,
            });
        }

        let content = json_resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ChatError::EmptyResponse(json_resp.to_string()))?;

        debug!("LLM says: {}", content);
        Ok(content.to_string())
    }
}
