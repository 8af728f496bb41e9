//! Hosted dialogue endpoint.
//!
//! POSTs the [`DialogueRequest`] as JSON and expects the structured reply
//! object back as the response body.

use async_trait::async_trait;
use tracing::debug;

use guarddesk_core::config::DialogueConfig;
use guarddesk_core::error::BridgeError;
use guarddesk_core::types::Variant;

use crate::reply::{DialogueReply, reply_from_value};
use crate::{DialogueBridge, DialogueRequest};

pub struct EndpointDialogue {
    pub url: String,
    variant: Variant,
    token: Option<String>,
    client: reqwest::Client,
}

impl EndpointDialogue {
    pub fn new(variant: Variant, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            variant,
            token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn from_config(config: &DialogueConfig, variant: Variant) -> Result<Self, BridgeError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| BridgeError::NotConfigured("dialogue.url".into()))?;
        let bridge = Self::new(variant, url);
        Ok(match config.resolve_api_key() {
            Some(token) => bridge.with_token(token),
            None => bridge,
        })
    }
}

#[async_trait]
impl DialogueBridge for EndpointDialogue {
    fn variant(&self) -> Variant {
        self.variant
    }

    async fn reply(&self, request: &DialogueRequest) -> Result<DialogueReply, BridgeError> {
        debug!(
            url = %self.url,
            history = request.history.len(),
            offerings = request.context.as_ref().map_or(0, Vec::len),
            "Posting to dialogue endpoint"
        );

        let mut builder = self.client.post(&self.url).json(request);
        if let Some(token) = &self.token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let response = builder.send().await.map_err(BridgeError::transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Status { status, body });
        }

        let value: serde_json::Value = response.json().await.map_err(BridgeError::malformed)?;
        reply_from_value(value, self.variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_url() {
        let mut config = DialogueConfig {
            provider: "endpoint".into(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            model: None,
            temperature: None,
            max_tokens: None,
            url: None,
        };
        assert!(matches!(
            EndpointDialogue::from_config(&config, Variant::Manager),
            Err(BridgeError::NotConfigured(_))
        ));

        config.url = Some("http://localhost:3000/api/dashboard-chat".into());
        config.api_key = Some("session-token".into());
        let bridge = EndpointDialogue::from_config(&config, Variant::Manager).unwrap();
        assert_eq!(bridge.url, "http://localhost:3000/api/dashboard-chat");
        assert_eq!(bridge.token.as_deref(), Some("session-token"));
        assert_eq!(bridge.variant(), Variant::Manager);
    }
}
