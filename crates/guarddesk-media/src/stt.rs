//! Speech-to-text bridge.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use guarddesk_core::config::TranscriptionConfig;
use guarddesk_core::error::BridgeError;

use crate::capture::AudioClip;

/// Turns one finalized clip into text. A single attempt per call.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, BridgeError>;
}

/// Trim recognized text; blank output counts as not understood.
pub fn normalize_transcript(text: &str) -> Result<String, BridgeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::Empty);
    }
    Ok(trimmed.to_string())
}

/// Get the transcription API URL for a given provider.
pub fn provider_url(config: &TranscriptionConfig) -> &str {
    match config.provider.as_str() {
        "openai" => "https://api.openai.com/v1/audio/transcriptions",
        "endpoint" => config.url.as_deref().unwrap_or_default(),
        _ => "https://api.groq.com/openai/v1/audio/transcriptions",
    }
}

fn default_model(provider: &str) -> &str {
    match provider {
        "openai" => "whisper-1",
        _ => "whisper-large-v3-turbo",
    }
}

enum Target {
    /// OpenAI-compatible Whisper API (multipart upload).
    Whisper {
        url: String,
        api_key: String,
        model: String,
    },
    /// Hosted endpoint taking the raw clip body and answering `{transcript}`.
    Endpoint { url: String },
}

#[derive(Deserialize)]
struct EndpointResponse {
    transcript: String,
}

pub struct HttpTranscriber {
    target: Target,
    client: reqwest::Client,
}

impl HttpTranscriber {
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, BridgeError> {
        let target = if config.provider == "endpoint" {
            let url = config
                .url
                .clone()
                .ok_or_else(|| BridgeError::NotConfigured("transcription.url".into()))?;
            Target::Endpoint { url }
        } else {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                BridgeError::NotConfigured("No transcription API key configured".into())
            })?;
            Target::Whisper {
                url: provider_url(config).to_string(),
                api_key,
                model: config
                    .model
                    .clone()
                    .unwrap_or_else(|| default_model(&config.provider).to_string()),
            }
        };
        Ok(Self {
            target,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, BridgeError> {
        let resp = match &self.target {
            Target::Whisper {
                url,
                api_key,
                model,
            } => {
                debug!(url = %url, model = %model, bytes = clip.len(), "Sending audio for transcription");
                let part = reqwest::multipart::Part::bytes(clip.bytes.clone())
                    .file_name(format!("audio.{}", clip.extension()))
                    .mime_str(&clip.mime_type)
                    .map_err(BridgeError::transport)?;
                let form = reqwest::multipart::Form::new()
                    .text("model", model.clone())
                    .text("response_format", "text")
                    .part("file", part);
                self.client
                    .post(url)
                    .header("Authorization", format!("Bearer {api_key}"))
                    .multipart(form)
                    .send()
                    .await
            }
            Target::Endpoint { url } => {
                debug!(url = %url, bytes = clip.len(), "Sending audio to transcription endpoint");
                self.client
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, &clip.mime_type)
                    .body(clip.bytes.clone())
                    .send()
                    .await
            }
        }
        .map_err(BridgeError::transport)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Status { status, body });
        }

        match &self.target {
            Target::Whisper { .. } => resp.text().await.map_err(BridgeError::transport),
            Target::Endpoint { .. } => {
                let body: EndpointResponse = resp.json().await.map_err(BridgeError::malformed)?;
                Ok(body.transcript)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> TranscriptionConfig {
        TranscriptionConfig {
            provider: provider.into(),
            api_key: None,
            api_key_env: None,
            model: None,
            url: None,
        }
    }

    #[test]
    fn test_provider_url_selection() {
        assert!(provider_url(&config("groq")).contains("groq.com"));
        assert!(provider_url(&config("openai")).contains("openai.com"));

        let mut endpoint = config("endpoint");
        endpoint.url = Some("http://localhost:3000/api/transcribe".into());
        assert_eq!(provider_url(&endpoint), "http://localhost:3000/api/transcribe");
    }

    #[test]
    fn test_blank_transcript_rejected() {
        assert_eq!(normalize_transcript("  \n\t"), Err(BridgeError::Empty));
        assert_eq!(
            normalize_transcript("  I need two guards tomorrow \n").unwrap(),
            "I need two guards tomorrow"
        );
    }

    #[test]
    fn test_missing_key_not_configured() {
        let err = HttpTranscriber::from_config(&config("groq")).err().unwrap();
        assert!(matches!(err, BridgeError::NotConfigured(_)));

        let err = HttpTranscriber::from_config(&config("endpoint")).err().unwrap();
        assert!(matches!(err, BridgeError::NotConfigured(_)));
    }
}
