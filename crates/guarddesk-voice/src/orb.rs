//! Orb visualization sampling.
//!
//! The orb reads whatever analyser is bound on the session. While thinking,
//! or when nothing is bound, it falls back to a deterministic synthetic
//! animation so the orb never freezes.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use guarddesk_core::types::SessionState;
use guarddesk_media::AnalyserSlot;

use crate::snapshot::SessionSnapshot;

pub const DEFAULT_BANDS: usize = 32;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrbFrame {
    /// Overall loudness, 0.0..=1.0.
    pub level: f32,
    /// Per-band magnitude, 0..=255.
    pub bands: Vec<u8>,
    /// Whether the frame came from the synthetic animation.
    pub synthetic: bool,
}

pub struct OrbSampler {
    analyser: Arc<AnalyserSlot>,
    bands: usize,
}

impl OrbSampler {
    pub fn new(analyser: Arc<AnalyserSlot>) -> Self {
        Self {
            analyser,
            bands: DEFAULT_BANDS,
        }
    }

    pub fn with_bands(mut self, bands: usize) -> Self {
        self.bands = bands.max(1);
        self
    }

    /// Sample one frame at animation time `t` seconds.
    pub fn sample(&self, state: SessionState, t: f64) -> OrbFrame {
        if state != SessionState::Thinking {
            if let Some(meter) = self.analyser.current() {
                let mut bands = vec![0u8; self.bands];
                meter.frequency_data(&mut bands);
                return OrbFrame {
                    level: meter.level(),
                    bands,
                    synthetic: false,
                };
            }
        }
        synthetic_frame(state, t, self.bands)
    }
}

/// Deterministic animation for phases without an audio signal.
pub fn synthetic_frame(state: SessionState, t: f64, bands: usize) -> OrbFrame {
    // (base level, swing, cycles per second)
    let (base, swing, speed) = match state {
        SessionState::Thinking => (0.35, 0.15, 1.5),
        _ => (0.12, 0.04, 0.4),
    };
    let phase = TAU * speed * t;
    let level = base + swing * phase.sin();
    let bands = (0..bands)
        .map(|i| {
            let offset = TAU * i as f64 / bands as f64;
            let value = level * (0.7 + 0.3 * (phase + offset).sin());
            (value * 255.0).round().clamp(0.0, 255.0) as u8
        })
        .collect();
    OrbFrame {
        level: level as f32,
        bands,
        synthetic: true,
    }
}

/// A running animation loop. Stops when [`stop`](Self::stop)ped or dropped.
pub struct OrbAnimation {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl OrbAnimation {
    /// Sample at `fps` frames per second, following the session state in `session`.
    pub fn start(
        sampler: OrbSampler,
        session: watch::Receiver<SessionSnapshot>,
        fps: u32,
    ) -> (Self, watch::Receiver<OrbFrame>) {
        let (frames, rx) = watch::channel(OrbFrame::default());
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let state = session.borrow().state;
                        let frame = sampler.sample(state, started.elapsed().as_secs_f64());
                        frames.send_replace(frame);
                    }
                }
            }
            debug!("Orb animation stopped");
        });

        (
            Self {
                cancel,
                task: Some(task),
            },
            rx,
        )
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for OrbAnimation {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
