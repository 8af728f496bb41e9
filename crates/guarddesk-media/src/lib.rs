//! Media pipeline: microphone capture, analysers, PCM playback, STT and TTS streaming.

pub mod analyser;
pub mod capture;
pub mod graph;
pub mod pcm;
pub mod playback;
pub mod stt;
pub mod tts_stream;

pub use analyser::{AnalyserSlot, LevelMeter};
pub use capture::{AudioClip, CaptureError, InputFrame, InputStream, Microphone, Recorder};
pub use graph::{AudioGraph, GraphFactory, PcmBuffer, PlaybackError, ScheduledSource, SharedGraph};
pub use playback::{SourceSet, StreamPlayer};
pub use stt::Transcriber;
pub use tts_stream::{SpeechAudio, SpeechSynthesizer};
