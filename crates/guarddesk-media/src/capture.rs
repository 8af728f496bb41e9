//! Microphone capture: buffers encoded audio into a single clip.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::analyser::LevelMeter;
use crate::pcm;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone access denied")]
    PermissionDenied,

    #[error("audio device error: {0}")]
    Device(String),
}

/// One block delivered by an input device.
#[derive(Debug, Clone, Default)]
pub struct InputFrame {
    /// Encoded container bytes, concatenated into the final clip.
    pub encoded: Vec<u8>,
    /// Raw samples of the same block, used only for level metering.
    pub samples: Vec<f32>,
}

/// A live input opened by a [`Microphone`].
///
/// Dropping the receiver releases the device.
pub struct InputStream {
    pub mime_type: String,
    pub frames: mpsc::UnboundedReceiver<InputFrame>,
}

/// Source of microphone audio.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Request access and start delivering frames.
    async fn open(&self) -> Result<InputStream, CaptureError>;
}

/// A finalized audio clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A clip below `min_bytes` carries no usable speech.
    pub fn is_usable(&self, min_bytes: usize) -> bool {
        self.bytes.len() >= min_bytes
    }

    /// File extension matching the clip's container.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let base = mime.split(';').next().unwrap_or_default().trim();
    match base {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        _ => "webm",
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        _ => "audio/webm",
    }
}

/// An in-flight recording. Owns the input stream and the chunk buffer.
pub struct Recorder {
    mime_type: String,
    started_at: Instant,
    cancel: CancellationToken,
    task: JoinHandle<Vec<Vec<u8>>>,
}

impl Recorder {
    /// Start buffering frames from `stream`, feeding raw samples to `meter`.
    pub fn start(stream: InputStream, meter: Option<Arc<LevelMeter>>) -> Self {
        let InputStream {
            mime_type,
            mut frames,
        } = stream;
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut chunks: Vec<Vec<u8>> = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    frame = frames.recv() => match frame {
                        Some(frame) => {
                            if let Some(meter) = &meter {
                                meter.push(&frame.samples);
                            }
                            if !frame.encoded.is_empty() {
                                chunks.push(frame.encoded);
                            }
                        }
                        None => {
                            debug!("Input device closed");
                            break;
                        }
                    }
                }
            }
            // Pick up anything delivered before the stop request.
            while let Ok(frame) = frames.try_recv() {
                if let Some(meter) = &meter {
                    meter.push(&frame.samples);
                }
                if !frame.encoded.is_empty() {
                    chunks.push(frame.encoded);
                }
            }
            chunks
        });

        Self {
            mime_type,
            started_at: Instant::now(),
            cancel,
            task,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stop recording, release the device, and concatenate the chunks.
    pub async fn stop(self) -> AudioClip {
        self.cancel.cancel();
        let chunks = match self.task.await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Recorder task failed");
                Vec::new()
            }
        };
        let bytes = chunks.concat();
        debug!(
            chunks = chunks.len(),
            bytes = bytes.len(),
            mime = %self.mime_type,
            "Recording stopped"
        );
        AudioClip::new(bytes, self.mime_type)
    }

    /// Drop the recording without producing a clip.
    pub fn abort(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Microphone backed by an audio file, delivered in fixed-size frames.
pub struct FileMicrophone {
    path: PathBuf,
    frame_bytes: usize,
}

impl FileMicrophone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_bytes: 4096,
        }
    }
}

#[async_trait]
impl Microphone for FileMicrophone {
    async fn open(&self) -> Result<InputStream, CaptureError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CaptureError::Device(format!("{}: {e}", self.path.display())))?;
        let mime_type = mime_for_path(&self.path).to_string();
        let samples = if mime_type == "audio/wav" {
            pcm::wav_samples(&bytes).unwrap_or_default()
        } else {
            Vec::new()
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let frame_bytes = self.frame_bytes;
        let chunk_count = bytes.len().div_ceil(frame_bytes).max(1);
        let samples_per_frame = samples.len().div_ceil(chunk_count).max(1);

        for (i, encoded) in bytes.chunks(frame_bytes).enumerate() {
            let start = (i * samples_per_frame).min(samples.len());
            let end = ((i + 1) * samples_per_frame).min(samples.len());
            let frame = InputFrame {
                encoded: encoded.to_vec(),
                samples: samples[start..end].to_vec(),
            };
            if tx.send(frame).is_err() {
                break;
            }
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "File microphone opened");
        Ok(InputStream {
            mime_type,
            frames: rx,
        })
    }
}
