use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardDeskError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GuardDeskError>;

/// Failure of a call to an external collaborator (speech, dialogue, backend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Service rejected the request: {0}")]
    Rejected(String),

    #[error("Empty result")]
    Empty,

    #[error("Timed out")]
    Timeout,
}

impl BridgeError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }

    /// Detail string suitable for appending to a user-visible error.
    pub fn detail(&self) -> String {
        match self {
            Self::Rejected(msg) => msg.clone(),
            Self::Status { body, .. } if !body.is_empty() => body.clone(),
            other => other.to_string(),
        }
    }
}

/// Turn-terminal failures of a voice session.
///
/// The `Display` text of each variant is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("Microphone access denied.")]
    PermissionDenied,

    #[error("No audio detected.")]
    NoAudio,

    #[error("Speech processing failed.")]
    TranscriptionFailed,

    #[error("Could not understand. Please try again.")]
    NotUnderstood,

    #[error("Something went wrong. Please try again.")]
    DialogueFailed,

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Session is busy")]
    Busy,

    #[error("No action is awaiting confirmation")]
    NoPendingAction,

    #[error("Session has been disposed")]
    Disposed,
}

impl VoiceError {
    /// Whether this error is reported to the user rather than to the caller.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Busy | Self::NoPendingAction | Self::Disposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(VoiceError::NoAudio.to_string(), "No audio detected.");
        assert_eq!(
            VoiceError::PermissionDenied.to_string(),
            "Microphone access denied."
        );
        assert_eq!(
            VoiceError::ActionFailed("guard not found".into()).to_string(),
            "Action failed: guard not found"
        );
    }

    #[test]
    fn test_control_errors_not_user_facing() {
        assert!(!VoiceError::Busy.is_user_facing());
        assert!(!VoiceError::Disposed.is_user_facing());
        assert!(VoiceError::DialogueFailed.is_user_facing());
    }
}
