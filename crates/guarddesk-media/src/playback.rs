//! Gapless playback of streamed PCM.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::analyser::LevelMeter;
use crate::graph::{AudioGraph, PcmBuffer, PlaybackError, ScheduledSource};
use crate::pcm::PcmDecoder;

/// Every source scheduled during the current playback, so they can all be
/// stopped at once from outside the playing task.
#[derive(Default)]
pub struct SourceSet {
    sources: Mutex<Vec<Arc<dyn ScheduledSource>>>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source: Arc<dyn ScheduledSource>) {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source);
    }

    /// Stop every source and forget them. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let sources: Vec<_> = self
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for source in &sources {
            source.stop();
        }
        sources.len()
    }

    /// Forget finished sources without stopping them.
    pub fn clear(&self) {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decodes PCM chunks as they arrive and schedules them back-to-back.
pub struct StreamPlayer {
    graph: Arc<dyn AudioGraph>,
    decoder: PcmDecoder,
    sample_rate: u32,
    next_start: f64,
    scheduled_secs: f64,
    sources: Arc<SourceSet>,
    tap: Option<Arc<LevelMeter>>,
}

impl StreamPlayer {
    pub fn new(
        graph: Arc<dyn AudioGraph>,
        sample_rate: u32,
        sources: Arc<SourceSet>,
        tap: Option<Arc<LevelMeter>>,
    ) -> Self {
        let next_start = graph.current_time();
        Self {
            graph,
            decoder: PcmDecoder::new(),
            sample_rate,
            next_start,
            scheduled_secs: 0.0,
            sources,
            tap,
        }
    }

    /// Decode `chunk` and schedule it right after the previous one.
    ///
    /// Returns the number of samples scheduled.
    pub fn push(&mut self, chunk: &[u8]) -> Result<usize, PlaybackError> {
        let samples = self.decoder.decode(chunk);
        if samples.is_empty() {
            return Ok(0);
        }

        let count = samples.len();
        let buffer = PcmBuffer {
            samples,
            sample_rate: self.sample_rate,
        };
        let duration = buffer.duration_secs();

        // If the stream stalled past the end of what is queued, start from now.
        let start = self.next_start.max(self.graph.current_time());
        let source = self.graph.schedule(buffer, start, self.tap.clone())?;
        self.sources.add(source);

        self.next_start = start + duration;
        self.scheduled_secs += duration;
        trace!(samples = count, start, "Scheduled PCM chunk");
        Ok(count)
    }

    /// Total audio scheduled so far.
    pub fn scheduled(&self) -> Duration {
        Duration::from_secs_f64(self.scheduled_secs)
    }

    /// Graph time at which the last scheduled sample finishes.
    pub fn end_time(&self) -> f64 {
        self.next_start
    }

    /// Audio still queued ahead of the graph clock.
    pub fn remaining(&self) -> Duration {
        let left = self.next_start - self.graph.current_time();
        Duration::from_secs_f64(left.max(0.0))
    }

    pub fn total_samples(&self) -> u64 {
        self.decoder.total_samples()
    }

    /// Wait until everything scheduled has played out.
    pub async fn finish(self) {
        let remaining = self.remaining();
        debug!(
            remaining_ms = remaining.as_millis() as u64,
            total_samples = self.total_samples(),
            "Waiting for scheduled audio"
        );
        tokio::time::sleep(remaining).await;
        self.sources.clear();
    }
}
