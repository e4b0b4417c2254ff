//! Audio-reactive feedback level for the visual indicator.
//!
//! The playback sink pushes raw output frames into a [`FeedbackTap`]; the
//! session loop samples the analyzer once per tick while the assistant is
//! speaking. Sampling is lazy and lossy — frames that arrive between ticks
//! overwrite each other — and the result is purely advisory: nothing in
//! dispatch or the state machine reads it.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex};

/// Analysis window size in samples.
const FFT_SIZE: usize = 256;

/// Shared buffer the playback sink writes output frames into.
#[derive(Debug, Clone, Default)]
pub struct FeedbackTap {
    frame: Arc<Mutex<Vec<f32>>>,
}

impl FeedbackTap {
    /// Record the latest output frame, replacing any unsampled one.
    pub fn push(&self, samples: &[f32]) {
        if let Ok(mut frame) = self.frame.lock() {
            frame.clear();
            frame.extend_from_slice(samples);
        }
    }

    /// Take the pending frame, leaving the tap empty.
    fn take(&self) -> Vec<f32> {
        match self.frame.lock() {
            Ok(mut frame) => std::mem::take(&mut *frame),
            Err(_) => Vec::new(),
        }
    }
}

/// Frequency-domain amplitude analyzer for the output audio stream.
pub struct AudioFeedbackAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    tap: FeedbackTap,
}

impl AudioFeedbackAnalyzer {
    /// Create an analyzer with a fresh tap.
    #[must_use]
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(FFT_SIZE),
            tap: FeedbackTap::default(),
        }
    }

    /// The tap to hand to the playback sink.
    #[must_use]
    pub fn tap(&self) -> FeedbackTap {
        self.tap.clone()
    }

    /// Sample the current output level in `[0, 1]`.
    ///
    /// Computes the average spectral magnitude of the latest frame,
    /// normalizing each bin against the maximum representable magnitude.
    /// Returns 0.0 when no frame arrived since the last sample.
    #[must_use]
    pub fn sample(&mut self) -> f32 {
        let frame = self.tap.take();
        if frame.is_empty() {
            return 0.0;
        }

        let mut buffer: Vec<Complex<f32>> = frame
            .iter()
            .copied()
            .chain(std::iter::repeat(0.0))
            .take(FFT_SIZE)
            .map(|s| Complex::new(s, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        // Max magnitude for unit-amplitude input is N/2 per bin.
        let max_magnitude = (FFT_SIZE / 2) as f32;
        let bins = FFT_SIZE / 2;
        let sum: f32 = buffer[..bins]
            .iter()
            .map(|c| (c.norm() / max_magnitude).min(1.0))
            .sum();
        (sum / bins as f32).clamp(0.0, 1.0)
    }
}

impl Default for AudioFeedbackAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
