//! Audio output graph: the long-lived playback resource of a session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::analyser::LevelMeter;
use crate::capture::AudioClip;
use crate::pcm;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio graph is closed")]
    Closed,

    #[error("could not decode audio: {0}")]
    Decode(String),

    #[error("audio output error: {0}")]
    Device(String),
}

/// Decoded mono samples ready to schedule.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A buffer scheduled on the graph. Stopping it silences it immediately.
pub trait ScheduledSource: Send + Sync {
    fn stop(&self);
    fn start_time(&self) -> f64;
    fn end_time(&self) -> f64;
}

/// Playback graph with a monotonic clock in seconds.
#[async_trait]
pub trait AudioGraph: Send + Sync {
    fn is_closed(&self) -> bool;

    /// Graph clock, in seconds since creation.
    fn current_time(&self) -> f64;

    /// Schedule `buffer` to start at `start_at` on the graph clock.
    fn schedule(
        &self,
        buffer: PcmBuffer,
        start_at: f64,
        tap: Option<Arc<LevelMeter>>,
    ) -> Result<Arc<dyn ScheduledSource>, PlaybackError>;

    /// Play a complete encoded clip, resolving when it has finished playing.
    async fn play_clip(
        &self,
        clip: &AudioClip,
        tap: Option<Arc<LevelMeter>>,
    ) -> Result<(), PlaybackError>;

    fn close(&self);
}

/// Creates audio graphs on demand.
pub trait GraphFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn AudioGraph>, PlaybackError>;
}

/// Lazily created graph, reused until it reports itself closed.
pub struct SharedGraph {
    factory: Arc<dyn GraphFactory>,
    current: Mutex<Option<Arc<dyn AudioGraph>>>,
}

impl SharedGraph {
    pub fn new(factory: Arc<dyn GraphFactory>) -> Self {
        Self {
            factory,
            current: Mutex::new(None),
        }
    }

    /// The open graph, creating one if none exists or the last was closed.
    pub fn get(&self) -> Result<Arc<dyn AudioGraph>, PlaybackError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(graph) = current.as_ref() {
            if !graph.is_closed() {
                return Ok(graph.clone());
            }
        }
        debug!("Creating audio graph");
        let graph = self.factory.create()?;
        *current = Some(graph.clone());
        Ok(graph)
    }

    pub fn is_open(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|g| !g.is_closed())
    }

    /// Close and forget the graph.
    pub fn close(&self) {
        if let Some(graph) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            graph.close();
        }
    }
}

/// Estimated play time of an encoded clip.
///
/// WAV clips are measured exactly; compressed clips assume 128 kbit/s.
pub fn estimate_clip_duration(clip: &AudioClip) -> Duration {
    if let Some((rate, data)) = pcm::wav_data(&clip.bytes) {
        if rate > 0 {
            return Duration::from_secs_f64(data.len() as f64 / 2.0 / rate as f64);
        }
    }
    Duration::from_secs_f64(clip.bytes.len() as f64 * 8.0 / 128_000.0)
}

/// A source scheduled on a [`VirtualGraph`].
pub struct VirtualSource {
    start: f64,
    end: f64,
    samples: Vec<f32>,
    stopped: AtomicBool,
}

impl VirtualSource {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl ScheduledSource for VirtualSource {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn start_time(&self) -> f64 {
        self.start
    }

    fn end_time(&self) -> f64 {
        self.end
    }
}

/// In-process graph that keeps a timeline of everything scheduled on it.
///
/// Its clock follows tokio time, so paused-clock tests control playback.
pub struct VirtualGraph {
    sample_rate: u32,
    origin: Instant,
    closed: AtomicBool,
    sources: Mutex<Vec<Arc<VirtualSource>>>,
    clips: Mutex<Vec<AudioClip>>,
}

impl VirtualGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            origin: Instant::now(),
            closed: AtomicBool::new(false),
            sources: Mutex::new(Vec::new()),
            clips: Mutex::new(Vec::new()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sources(&self) -> Vec<Arc<VirtualSource>> {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clips(&self) -> Vec<AudioClip> {
        self.clips
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mix every non-stopped source into one buffer at the graph rate.
    pub fn render(&self) -> Vec<f32> {
        let sources = self.sources();
        let rate = self.sample_rate as f64;
        let len = sources
            .iter()
            .filter(|s| !s.is_stopped())
            .map(|s| (s.start * rate).round() as usize + s.samples.len())
            .max()
            .unwrap_or(0);
        let mut out = vec![0.0f32; len];
        for source in sources.iter().filter(|s| !s.is_stopped()) {
            let offset = (source.start * rate).round() as usize;
            for (i, s) in source.samples.iter().enumerate() {
                out[offset + i] += s;
            }
        }
        out
    }

    /// Render the timeline as a 16-bit mono WAV file.
    pub fn render_wav(&self) -> Vec<u8> {
        let pcm: Vec<i16> = self.render().into_iter().map(pcm::f32_to_i16).collect();
        pcm::pcm_to_wav(&pcm, self.sample_rate, 1, 16)
    }
}

#[async_trait]
impl AudioGraph for VirtualGraph {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn schedule(
        &self,
        buffer: PcmBuffer,
        start_at: f64,
        tap: Option<Arc<LevelMeter>>,
    ) -> Result<Arc<dyn ScheduledSource>, PlaybackError> {
        if self.is_closed() {
            return Err(PlaybackError::Closed);
        }
        let samples = if buffer.sample_rate == self.sample_rate || buffer.sample_rate == 0 {
            buffer.samples
        } else {
            resample_linear(&buffer.samples, buffer.sample_rate, self.sample_rate)
        };
        if let Some(tap) = tap {
            tap.push(&samples);
        }
        let duration = samples.len() as f64 / self.sample_rate as f64;
        let source = Arc::new(VirtualSource {
            start: start_at,
            end: start_at + duration,
            samples,
            stopped: AtomicBool::new(false),
        });
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source.clone());
        Ok(source)
    }

    async fn play_clip(
        &self,
        clip: &AudioClip,
        tap: Option<Arc<LevelMeter>>,
    ) -> Result<(), PlaybackError> {
        if self.is_closed() {
            return Err(PlaybackError::Closed);
        }
        if clip.is_empty() {
            return Err(PlaybackError::Decode("empty clip".into()));
        }
        if let (Some(tap), Some(samples)) = (tap, pcm::wav_samples(&clip.bytes)) {
            tap.push(&samples);
        }
        self.clips
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(clip.clone());
        tokio::time::sleep(estimate_clip_duration(clip)).await;
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if samples.is_empty() || from == 0 || to == 0 {
        return Vec::new();
    }
    let out_len = (samples.len() as u64 * to as u64 / from as u64) as usize;
    let step = from as f64 / to as f64;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

/// Factory producing [`VirtualGraph`]s, remembering the latest one.
pub struct VirtualGraphFactory {
    sample_rate: u32,
    created: Mutex<Vec<Arc<VirtualGraph>>>,
}

impl VirtualGraphFactory {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn latest(&self) -> Option<Arc<VirtualGraph>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl GraphFactory for VirtualGraphFactory {
    fn create(&self) -> Result<Arc<dyn AudioGraph>, PlaybackError> {
        let graph = Arc::new(VirtualGraph::new(self.sample_rate));
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(graph.clone());
        Ok(graph)
    }
}
