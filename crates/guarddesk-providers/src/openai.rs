//! OpenAI Chat Completions dialogue bridge.
//!
//! Calls `/v1/chat/completions` in JSON mode with a variant-specific system
//! prompt. Works with any OpenAI-compatible server via `base_url`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use guarddesk_core::config::DialogueConfig;
use guarddesk_core::error::BridgeError;
use guarddesk_core::types::{ChatMessage, Variant};

use crate::prompt::system_prompt;
use crate::reply::{DialogueReply, parse_reply};
use crate::{DialogueBridge, DialogueRequest};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 800;
const DEFAULT_TEMPERATURE: f64 = 0.4;

pub struct OpenAiDialogue {
    pub base_url: String,
    pub model: String,
    variant: Variant,
    api_key: String,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiDialogue {
    pub fn new(variant: Variant, api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: DEFAULT_MODEL.into(),
            variant,
            api_key: api_key.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &DialogueConfig, variant: Variant) -> Result<Self, BridgeError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| BridgeError::NotConfigured("No dialogue API key configured".into()))?;
        let mut bridge = Self::new(variant, api_key, config.base_url.as_deref());
        if let Some(model) = &config.model {
            bridge.model = model.clone();
        }
        if let Some(temperature) = config.temperature {
            bridge.temperature = temperature;
        }
        if let Some(max_tokens) = config.max_tokens {
            bridge.max_tokens = max_tokens;
        }
        Ok(bridge)
    }

    fn format_messages(&self, request: &DialogueRequest) -> Vec<serde_json::Value> {
        let today = chrono::Local::now().date_naive();
        let system = system_prompt(self.variant, request.context.as_deref(), today);

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(json!({ "role": "system", "content": system }));
        messages.extend(request.history.iter().map(format_message));
        messages.push(json!({ "role": "user", "content": request.message }));
        messages
    }
}

fn format_message(message: &ChatMessage) -> serde_json::Value {
    json!({ "role": message.role, "content": message.content })
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl DialogueBridge for OpenAiDialogue {
    fn variant(&self) -> Variant {
        self.variant
    }

    async fn reply(&self, request: &DialogueRequest) -> Result<DialogueReply, BridgeError> {
        let body = OpenAiRequest {
            model: self.model.clone(),
            messages: self.format_messages(request),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(
            model = %body.model,
            base_url = %self.base_url,
            history = request.history.len(),
            "Requesting structured reply"
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(BridgeError::transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Status { status, body });
        }

        let completion: ChatCompletion = response.json().await.map_err(BridgeError::malformed)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(BridgeError::Empty)?;

        parse_reply(&content, self.variant)
    }
}
