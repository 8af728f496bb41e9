//! Dialogue bridges.
//!
//! A [`DialogueBridge`] takes the user's utterance plus the running history
//! and returns a [`DialogueReply`]: the spoken message and a tagged
//! [`ReplyKind`] describing what else the assistant wants to happen. The
//! underlying model is always run in structured-output mode; anything that
//! does not parse into a reply is a failed turn.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use guarddesk_core::config::DialogueConfig;
use guarddesk_core::error::BridgeError;
use guarddesk_core::types::{ChatMessage, Offering, Variant};

#[cfg(feature = "endpoint")]
pub mod endpoint;
#[cfg(feature = "openai")]
pub mod openai;
pub mod prompt;
pub mod reply;

pub use reply::{DialogueReply, ReplyKind, parse_reply};

/// One dialogue turn as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
    /// Active offerings, fetched fresh for every receptionist turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<Offering>>,
}

/// The chat-completion side of a voice session.
#[async_trait]
pub trait DialogueBridge: Send + Sync {
    /// Which assistant this bridge speaks for.
    fn variant(&self) -> Variant;

    async fn reply(&self, request: &DialogueRequest) -> Result<DialogueReply, BridgeError>;
}

/// Build the configured dialogue bridge for `variant`.
pub fn bridge_from_config(
    config: &DialogueConfig,
    variant: Variant,
) -> Result<Arc<dyn DialogueBridge>, BridgeError> {
    match config.provider.as_str() {
        #[cfg(feature = "endpoint")]
        "endpoint" => Ok(Arc::new(endpoint::EndpointDialogue::from_config(config, variant)?)),
        #[cfg(feature = "openai")]
        "openai" => Ok(Arc::new(openai::OpenAiDialogue::from_config(config, variant)?)),
        other => Err(BridgeError::NotConfigured(format!(
            "unknown dialogue provider: {other}"
        ))),
    }
}
