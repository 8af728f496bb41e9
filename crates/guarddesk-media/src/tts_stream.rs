//! Text-to-speech: a whole clip, or raw PCM streamed as it is synthesized.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use tracing::debug;

use guarddesk_core::config::TtsConfig;
use guarddesk_core::error::BridgeError;

use crate::capture::AudioClip;

const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM"; // ElevenLabs "Rachel"
const DEFAULT_MODEL: &str = "eleven_turbo_v2";
const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Response header carrying the sample rate of a streamed PCM body.
pub const SAMPLE_RATE_HEADER: &str = "x-sample-rate";

/// Synthesized speech.
pub enum SpeechAudio {
    /// A complete encoded clip, played as a whole.
    Clip(AudioClip),
    /// Raw 16-bit little-endian mono PCM, delivered incrementally.
    /// Dropping the stream aborts the network read.
    Stream {
        sample_rate: u32,
        chunks: BoxStream<'static, Result<Bytes, BridgeError>>,
    },
}

impl std::fmt::Debug for SpeechAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clip(clip) => f
                .debug_struct("Clip")
                .field("mime_type", &clip.mime_type)
                .field("bytes", &clip.len())
                .finish(),
            Self::Stream { sample_rate, .. } => f
                .debug_struct("Stream")
                .field("sample_rate", sample_rate)
                .finish_non_exhaustive(),
        }
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, BridgeError>;
}

/// Build the ElevenLabs streaming TTS request URL for a given voice.
pub fn build_tts_url(voice: &str) -> String {
    format!("https://api.elevenlabs.io/v1/text-to-speech/{voice}/stream")
}

/// Parse the sample rate out of an ElevenLabs `pcm_<rate>` output format.
pub fn pcm_format_rate(format: &str) -> Option<u32> {
    format.strip_prefix("pcm_")?.parse().ok()
}

enum Target {
    ElevenLabs {
        api_key: String,
        voice: String,
        model: String,
        output_format: String,
    },
    /// Hosted endpoint taking `{text}`; answers with an audio clip, or a PCM
    /// stream when it sets the sample-rate header.
    Endpoint { url: String },
}

pub struct HttpSynthesizer {
    target: Target,
    stream: bool,
    sample_rate: u32,
    client: reqwest::Client,
}

impl HttpSynthesizer {
    pub fn from_config(config: &TtsConfig) -> Result<Self, BridgeError> {
        let target = if config.provider == "endpoint" {
            let url = config
                .url
                .clone()
                .ok_or_else(|| BridgeError::NotConfigured("tts.url".into()))?;
            Target::Endpoint { url }
        } else {
            let api_key = config
                .resolve_api_key()
                .ok_or_else(|| BridgeError::NotConfigured("No TTS API key configured".into()))?;
            Target::ElevenLabs {
                api_key,
                voice: config
                    .default_voice
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VOICE_ID.into()),
                model: config
                    .default_model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL.into()),
                output_format: config
                    .output_format
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.into()),
            }
        };
        Ok(Self {
            target,
            stream: config.stream,
            sample_rate: config
                .output_format
                .as_deref()
                .and_then(pcm_format_rate)
                .unwrap_or(config.sample_rate),
            client: reqwest::Client::new(),
        })
    }

    fn request(&self, text: &str) -> reqwest::RequestBuilder {
        match &self.target {
            Target::ElevenLabs {
                api_key,
                voice,
                model,
                output_format,
            } => {
                let format = if self.stream {
                    format!("pcm_{}", self.sample_rate)
                } else {
                    output_format.clone()
                };
                let url = format!("{}?output_format={format}", build_tts_url(voice));
                debug!(voice = %voice, model = %model, format = %format, text_len = text.len(), "Starting TTS request");
                self.client
                    .post(url)
                    .header("xi-api-key", api_key)
                    .json(&json!({
                        "text": text,
                        "model_id": model,
                        "voice_settings": {
                            "stability": 0.5,
                            "similarity_boost": 0.75
                        }
                    }))
            }
            Target::Endpoint { url } => {
                debug!(url = %url, text_len = text.len(), "Starting TTS request");
                self.client.post(url).json(&json!({ "text": text }))
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, BridgeError> {
        let resp = self
            .request(text)
            .send()
            .await
            .map_err(BridgeError::transport)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Status { status, body });
        }

        let header_rate = resp
            .headers()
            .get(SAMPLE_RATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();

        let streamed = match &self.target {
            Target::ElevenLabs { .. } => self.stream,
            Target::Endpoint { .. } => header_rate.is_some() || content_type.starts_with("audio/pcm"),
        };

        if streamed {
            let sample_rate = header_rate.unwrap_or(self.sample_rate);
            debug!(sample_rate, "Streaming TTS audio");
            let chunks = resp
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| BridgeError::Transport(format!("TTS stream error: {e}"))))
                .boxed();
            return Ok(SpeechAudio::Stream {
                sample_rate,
                chunks,
            });
        }

        let bytes = resp.bytes().await.map_err(BridgeError::transport)?;
        if bytes.is_empty() {
            return Err(BridgeError::Empty);
        }
        debug!(bytes = bytes.len(), content_type = %content_type, "TTS clip received");
        Ok(SpeechAudio::Clip(AudioClip::new(bytes.to_vec(), content_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_construction() {
        let url = build_tts_url("Rachel");
        assert!(url.contains("Rachel"));
        assert!(url.contains("stream"));
        assert!(url.starts_with("https://api.elevenlabs.io"));
    }

    #[test]
    fn test_pcm_format_rate() {
        assert_eq!(pcm_format_rate("pcm_16000"), Some(16000));
        assert_eq!(pcm_format_rate("pcm_24000"), Some(24000));
        assert_eq!(pcm_format_rate("mp3_44100_128"), None);
    }

    #[test]
    fn test_endpoint_requires_url() {
        let config = TtsConfig {
            provider: "endpoint".into(),
            api_key: None,
            api_key_env: None,
            default_voice: None,
            default_model: None,
            output_format: None,
            stream: true,
            sample_rate: 24000,
            url: None,
        };
        assert!(matches!(
            HttpSynthesizer::from_config(&config),
            Err(BridgeError::NotConfigured(_))
        ));
    }
}
