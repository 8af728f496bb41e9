//! Level analysers used to drive visualization.
//!
//! A [`LevelMeter`] is a tap on an audio path: capture and playback push the
//! samples they handle into it, and the renderer reads level and frequency
//! data back out. Nothing here feeds transcription or business logic.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Lowest and highest decibel values mapped onto the 0..=255 byte range.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Analyser over the most recent window of samples.
pub struct LevelMeter {
    window: usize,
    samples: Mutex<VecDeque<f32>>,
}

impl LevelMeter {
    /// Create a meter keeping the last `window` samples.
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            window,
            samples: Mutex::new(VecDeque::with_capacity(window)),
        }
    }

    /// Feed samples (normalized to -1.0..=1.0) into the meter.
    pub fn push(&self, samples: &[f32]) {
        let mut buf = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = samples.len().saturating_sub(self.window);
        for &s in &samples[skip..] {
            if buf.len() == self.window {
                buf.pop_front();
            }
            buf.push_back(s);
        }
    }

    pub fn clear(&self) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Compute RMS energy of a block of samples.
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = samples.iter().map(|&s| s * s).sum();
        (sum / samples.len() as f32).sqrt()
    }

    /// RMS level of the current window, in 0.0..=1.0.
    pub fn level(&self) -> f32 {
        let buf = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let (a, b) = buf.as_slices();
        let sum: f32 = a.iter().chain(b).map(|&s| s * s).sum();
        if buf.is_empty() {
            return 0.0;
        }
        (sum / buf.len() as f32).sqrt().min(1.0)
    }

    /// Fill `out` with byte-scaled band magnitudes, lowest band first.
    ///
    /// Bands are spread linearly over 0..Nyquist of the window. A silent or
    /// empty window yields all zeros.
    pub fn frequency_data(&self, out: &mut [u8]) {
        out.fill(0);
        if out.is_empty() {
            return;
        }

        let window: Vec<f32> = {
            let buf = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
            buf.iter().copied().collect()
        };
        let n = window.len();
        if n < 2 {
            return;
        }

        let half = n / 2;
        let bands = out.len();
        for (band, slot) in out.iter_mut().enumerate() {
            let k = 1 + band * (half - 1) / bands;
            let (mut re, mut im) = (0.0f32, 0.0f32);
            for (i, &x) in window.iter().enumerate() {
                let hann = 0.5 - 0.5 * (2.0 * PI * i as f32 / (n - 1) as f32).cos();
                let phase = 2.0 * PI * k as f32 * i as f32 / n as f32;
                re += x * hann * phase.cos();
                im -= x * hann * phase.sin();
            }
            let magnitude = (re * re + im * im).sqrt() / n as f32;
            let db = 20.0 * (magnitude + 1e-12).log10();
            let scaled = ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0);
            *slot = (scaled * 255.0).round() as u8;
        }
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(512)
    }
}

/// Holds the analyser of whichever phase currently owns audio.
///
/// Capture and playback bind their meter when they start and detach it when
/// they end; readers only ever see one meter or none.
#[derive(Default)]
pub struct AnalyserSlot {
    current: RwLock<Option<Arc<LevelMeter>>>,
}

impl AnalyserSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fresh meter and return it, replacing any previous one.
    pub fn bind_new(&self) -> Arc<LevelMeter> {
        let meter = Arc::new(LevelMeter::default());
        self.bind(meter.clone());
        meter
    }

    pub fn bind(&self, meter: Arc<LevelMeter>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(meter);
    }

    pub fn detach(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<Arc<LevelMeter>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_bound(&self) -> bool {
        self.current().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_bin: usize, n: usize, amplitude: f32) -> Vec<f32> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq_bin as f32 * i as f32 / n as f32).sin())
            .collect()
    }

    #[test]
    fn test_rms_calculation() {
        assert_eq!(LevelMeter::rms(&[0.0; 320]), 0.0);
        let rms = LevelMeter::rms(&[0.5; 320]);
        assert!((rms - 0.5).abs() < 1e-6);
        assert_eq!(LevelMeter::rms(&[]), 0.0);
    }

    #[test]
    fn test_window_keeps_latest_samples() {
        let meter = LevelMeter::new(4);
        meter.push(&[1.0, 1.0, 1.0, 1.0]);
        meter.push(&[0.0, 0.0]);
        let level = meter.level();
        // Two ones and two zeros left in the window.
        assert!((level - (0.5f32).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_silence_has_no_frequency_energy() {
        let meter = LevelMeter::new(64);
        meter.push(&[0.0; 64]);
        let mut bins = [7u8; 8];
        meter.frequency_data(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_in_matching_band() {
        let n = 128;
        let meter = LevelMeter::new(n);
        // Band 0 of 4 over 64 usable bins maps to bin index 1.
        meter.push(&sine(1, n, 0.8));
        let mut bins = [0u8; 4];
        meter.frequency_data(&mut bins);
        let peak = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 0);
        assert!(bins[0] > 200);
    }

    #[test]
    fn test_bands_spread_across_spectrum() {
        let n = 128;
        let meter = LevelMeter::new(n);
        // Band 3 of 4 maps to bin 1 + 3 * 63 / 4 = 48.
        meter.push(&sine(48, n, 0.8));
        let mut bins = [0u8; 4];
        meter.frequency_data(&mut bins);
        assert!(bins[3] > 200);
        assert!(bins[..3].iter().all(|&b| b < bins[3]));
    }

    #[test]
    fn test_slot_bind_and_detach() {
        let slot = AnalyserSlot::new();
        assert!(!slot.is_bound());
        let first = slot.bind_new();
        let second = slot.bind_new();
        assert!(Arc::ptr_eq(&slot.current().unwrap(), &second));
        assert!(!Arc::ptr_eq(&first, &second));
        slot.detach();
        assert!(slot.current().is_none());
    }
}
