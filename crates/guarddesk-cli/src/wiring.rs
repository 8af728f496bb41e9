//! Builds sessions and bridges from the loaded config.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::warn;

use guarddesk_backend::HttpBackend;
use guarddesk_core::config::Config;
use guarddesk_core::error::BridgeError;
use guarddesk_core::types::Variant;
use guarddesk_media::capture::{CaptureError, InputStream, Microphone};
use guarddesk_media::graph::VirtualGraphFactory;
use guarddesk_media::stt::HttpTranscriber;
use guarddesk_media::tts_stream::HttpSynthesizer;
use guarddesk_media::{AudioClip, SpeechAudio, SpeechSynthesizer, Transcriber};
use guarddesk_providers::bridge_from_config;
use guarddesk_voice::{Collaborators, VoiceSession};

/// Stand-in for a collaborator that is missing from the config.
/// Every call fails with the setting that needs filling in.
pub struct Unconfigured(pub &'static str);

impl Unconfigured {
    fn error(&self) -> BridgeError {
        BridgeError::NotConfigured(self.0.into())
    }
}

#[async_trait]
impl Transcriber for Unconfigured {
    async fn transcribe(&self, _clip: &AudioClip) -> Result<String, BridgeError> {
        Err(self.error())
    }
}

#[async_trait]
impl SpeechSynthesizer for Unconfigured {
    async fn synthesize(&self, _text: &str) -> Result<SpeechAudio, BridgeError> {
        Err(self.error())
    }
}

#[async_trait]
impl Microphone for Unconfigured {
    async fn open(&self) -> Result<InputStream, CaptureError> {
        Err(CaptureError::Device(format!("no input device ({})", self.0)))
    }
}

pub fn transcriber(config: &Config) -> Arc<dyn Transcriber> {
    match config.transcription.as_ref().map(HttpTranscriber::from_config) {
        Some(Ok(t)) => Arc::new(t),
        Some(Err(e)) => {
            warn!(error = %e, "Transcription disabled");
            Arc::new(Unconfigured("transcription"))
        }
        None => Arc::new(Unconfigured("transcription")),
    }
}

pub fn synthesizer(config: &Config) -> Arc<dyn SpeechSynthesizer> {
    match config.tts.as_ref().map(HttpSynthesizer::from_config) {
        Some(Ok(s)) => Arc::new(s),
        Some(Err(e)) => {
            warn!(error = %e, "Speech output disabled");
            Arc::new(Unconfigured("tts"))
        }
        None => Arc::new(Unconfigured("tts")),
    }
}

/// Graph rate used for virtual playback.
pub fn output_rate(config: &Config) -> u32 {
    config.tts.as_ref().map(|t| t.sample_rate).unwrap_or(24_000)
}

/// A session wired to the configured services, playing into a virtual graph.
pub fn session(
    config: &Config,
    variant: Variant,
    microphone: Arc<dyn Microphone>,
) -> anyhow::Result<(VoiceSession, Arc<VirtualGraphFactory>)> {
    let dialogue_config = config
        .dialogue
        .as_ref()
        .context("No dialogue provider configured (set dialogue.provider)")?;
    let dialogue = bridge_from_config(dialogue_config, variant)?;

    let graphs = Arc::new(VirtualGraphFactory::new(output_rate(config)));
    let mut collab = Collaborators::new(
        microphone,
        transcriber(config),
        dialogue,
        synthesizer(config),
        graphs.clone(),
    );
    if let Some(backend) = &config.backend {
        let backend = Arc::new(HttpBackend::from_config(backend));
        collab = collab
            .with_offerings(backend.clone())
            .with_desk(backend.clone())
            .with_executor(backend);
    }

    Ok((VoiceSession::new(config.voice(), collab), graphs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_services_fail_softly() {
        let config = Config::default();
        let clip = AudioClip::new(vec![0; 2048], "audio/wav");
        let err = transcriber(&config).transcribe(&clip).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConfigured(_)));
        assert!(synthesizer(&config).synthesize("hi").await.is_err());
        assert_eq!(output_rate(&config), 24_000);
    }

    #[test]
    fn test_session_requires_dialogue() {
        let config = Config::default();
        let mic = Arc::new(Unconfigured("microphone"));
        assert!(session(&config, Variant::Receptionist, mic).is_err());
    }

    #[tokio::test]
    async fn test_session_from_endpoint_config() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "dialogue": {"provider": "endpoint", "url": "http://localhost:9/api/voice-agent"}
        }))
        .unwrap();
        let mic = Arc::new(Unconfigured("microphone"));
        let (session, graphs) = session(&config, Variant::Manager, mic).unwrap();
        assert_eq!(session.variant(), Variant::Manager);
        assert_eq!(graphs.created_count(), 0);
    }
}
