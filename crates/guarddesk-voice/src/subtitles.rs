//! Word-level subtitle timing.
//!
//! Per-word timing is estimated by spreading the speech duration evenly over
//! the words. Good enough to highlight along with playback, not aligned to
//! the audio.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct WordTimeline {
    words: Vec<String>,
    per_word: Duration,
}

impl WordTimeline {
    pub fn new(text: &str, total: Duration) -> Self {
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let per_word = match u32::try_from(words.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => total / count,
        };
        Self { words, per_word }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn per_word(&self) -> Duration {
        self.per_word
    }

    /// Index of the word to highlight `elapsed` into playback.
    pub fn index_at(&self, elapsed: Duration) -> Option<usize> {
        if self.words.is_empty() {
            return None;
        }
        if self.per_word.is_zero() {
            return Some(self.words.len() - 1);
        }
        let index = (elapsed.as_secs_f64() / self.per_word.as_secs_f64()) as usize;
        Some(index.min(self.words.len() - 1))
    }

    /// Advance the highlighted index on a timer until the last word or cancellation.
    pub fn spawn_ticker(
        self,
        highlight: watch::Sender<Option<usize>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            for index in 0..self.words.len() {
                highlight.send_replace(Some(index));
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(self.per_word) => {}
                }
            }
            highlight.send_replace(None);
        })
    }
}
