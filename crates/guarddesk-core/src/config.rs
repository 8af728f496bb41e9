//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Guard Desk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<TranscriptionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<DialogueConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Voice session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Hard ceiling on a single recording (default: 15).
    #[serde(default = "default_max_capture_secs")]
    pub max_capture_secs: u64,

    /// Clips smaller than this are treated as silence (default: 1000).
    #[serde(default = "default_min_clip_bytes")]
    pub min_clip_bytes: usize,

    /// Optional bound on every outbound bridge call. Unset means no timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Orb animation frame rate (default: 60).
    #[serde(default = "default_orb_fps")]
    pub orb_fps: u32,

    /// Utterance submitted when the user confirms a pending action.
    #[serde(default = "default_confirm_phrase")]
    pub confirm_phrase: String,

    /// Utterance submitted when the user declines a pending action.
    #[serde(default = "default_cancel_phrase")]
    pub cancel_phrase: String,
}

fn default_max_capture_secs() -> u64 {
    15
}

fn default_min_clip_bytes() -> usize {
    1000
}

fn default_orb_fps() -> u32 {
    60
}

fn default_confirm_phrase() -> String {
    "Yes, confirm".into()
}

fn default_cancel_phrase() -> String {
    "No, cancel that".into()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            max_capture_secs: default_max_capture_secs(),
            min_clip_bytes: default_min_clip_bytes(),
            request_timeout_secs: None,
            orb_fps: default_orb_fps(),
            confirm_phrase: default_confirm_phrase(),
            cancel_phrase: default_cancel_phrase(),
        }
    }
}

impl VoiceConfig {
    pub fn max_capture(&self) -> Duration {
        Duration::from_secs(self.max_capture_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Provider: "groq", "openai" or "endpoint" (default: "groq").
    #[serde(default = "default_transcription_provider")]
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Model name (e.g. "whisper-large-v3-turbo").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Transcription endpoint URL, required for the "endpoint" provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_transcription_provider() -> String {
    "groq".into()
}

impl TranscriptionConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Provider: "elevenlabs" or "endpoint" (default: "elevenlabs").
    #[serde(default = "default_tts_provider")]
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Default voice ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_voice: Option<String>,

    /// Default model ID (e.g. "eleven_turbo_v2").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Output format for batch synthesis (default: "mp3_44100_128").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,

    /// Stream raw PCM instead of fetching a complete clip.
    #[serde(default)]
    pub stream: bool,

    /// Sample rate assumed for streamed PCM when the response does not say.
    #[serde(default = "default_tts_sample_rate")]
    pub sample_rate: u32,

    /// Synthesis endpoint URL, required for the "endpoint" provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_tts_provider() -> String {
    "elevenlabs".into()
}

fn default_tts_sample_rate() -> u32 {
    16000
}

impl TtsConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Dialogue (chat completion) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Provider: "openai" or "endpoint" (default: "openai").
    #[serde(default = "default_dialogue_provider")]
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Hosted dialogue endpoint, required for the "endpoint" provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_dialogue_provider() -> String {
    "openai".into()
}

impl DialogueConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Business backend the side effects are sent to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Resolve names in action data against the backend directories before
    /// executing (default: true). Turn off when the server does it itself.
    #[serde(default = "default_resolve_names")]
    pub resolve_names: bool,
}

fn default_resolve_names() -> bool {
    true
}

impl BackendConfig {
    pub fn resolve_token(&self) -> Option<String> {
        resolve_secret_field(&self.token, &self.token_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "guarddesk_voice=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::GuardDeskError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw)?;

        json5::from_str(&substituted)
            .map_err(|e| crate::error::GuardDeskError::Config(e.to_string()))
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Voice settings, falling back to defaults.
    pub fn voice(&self) -> VoiceConfig {
        self.voice.clone().unwrap_or_default()
    }

    /// Get a config value by dotted path (e.g. "voice.max_capture_secs").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Set a config value by dotted path.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| anyhow::anyhow!("Config serialization error: {e}"))?;

        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            anyhow::bail!("Empty path");
        };

        let mut current = &mut json;
        for segment in parents {
            let serde_json::Value::Object(map) = current else {
                anyhow::bail!("Cannot set '{path}': no section to hold '{segment}'");
            };
            let slot = map
                .entry(segment.to_string())
                .or_insert_with(|| serde_json::json!({}));
            if slot.is_null() {
                *slot = serde_json::json!({});
            }
            current = slot;
        }
        let serde_json::Value::Object(map) = current else {
            anyhow::bail!("Cannot set '{path}': no section to hold '{last}'");
        };
        map.insert(last.to_string(), value);

        *self = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {e}"))?;
        Ok(())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        match &self.transcription {
            Some(t) if t.provider == "endpoint" => {
                if t.url.is_none() {
                    errors.push("Transcription provider 'endpoint' requires a url".to_string());
                }
            }
            Some(t) if t.resolve_api_key().is_none() => {
                warnings.push(format!(
                    "Transcription provider '{}' has no API key configured",
                    t.provider
                ));
            }
            None => warnings.push("No transcription configured; voice turns will fail".into()),
            _ => {}
        }

        match &self.tts {
            Some(t) if t.provider == "endpoint" => {
                if t.url.is_none() {
                    errors.push("TTS provider 'endpoint' requires a url".to_string());
                }
            }
            Some(t) if t.resolve_api_key().is_none() => {
                warnings.push(format!("TTS provider '{}' has no API key configured", t.provider));
            }
            _ => {}
        }

        if let Some(d) = &self.dialogue {
            if d.provider == "endpoint" {
                if d.url.is_none() {
                    errors.push("Dialogue provider 'endpoint' requires a url".to_string());
                }
            } else if d.resolve_api_key().is_none() {
                warnings.push(format!(
                    "Dialogue provider '{}' has no API key configured",
                    d.provider
                ));
            }
        }

        if let Some(v) = &self.voice {
            if v.max_capture_secs == 0 {
                errors.push("voice.max_capture_secs cannot be 0".to_string());
            }
            if v.request_timeout_secs == Some(0) {
                errors.push("voice.request_timeout_secs cannot be 0".to_string());
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Guard Desk data: `~/.guarddesk/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".guarddesk")
}
