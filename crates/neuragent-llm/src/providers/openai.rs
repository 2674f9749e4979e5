use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use neuragent_core::config::LlmConfig;
use neuragent_core::error::{AgentError, Result};
use neuragent_core::traits::CompletionService;
use neuragent_core::types::ChatMessage;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Debug, PartialEq)]
struct OaiMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn convert_messages(messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    messages
        .into_iter()
        .map(|m| OaiMessage {
            role: m.role.as_str().to_string(),
            content: m.content,
            name: m.name,
            tool_call_id: m.tool_call_id,
        })
        .collect()
}

fn extract_text(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AgentError::Service(format!("invalid completion response: {}", e)))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| AgentError::Service("completion response had no choices".into()))
}

impl CompletionService for OpenAiClient {
    fn complete(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let url = self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL);

            let body = ChatRequest {
                model: &self.config.model,
                messages: convert_messages(messages),
                max_tokens: self.config.max_tokens,
                temperature: Some(self.config.temperature),
            };

            let mut req = self.http.post(url).json(&body);
            if let Some(api_key) = &self.config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            debug!(model = %self.config.model, messages = body.messages.len(), "Sending completion request");

            let response = req
                .send()
                .await
                .map_err(|e| AgentError::Service(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| AgentError::Service(e.to_string()))?;

            if !status.is_success() {
                return Err(AgentError::Service(format!("HTTP {}: {}", status, text)));
            }

            extract_text(&text)
        })
    }
}
