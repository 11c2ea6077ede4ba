//! Spectral level meter.
//!
//! Emulates an analyser node's byte frequency data: Blackman-windowed FFT
//! over the most recent `fft_size` samples, magnitude smoothed over time,
//! converted to dB and mapped onto 0..=255. The meter level is the RMS of
//! those bytes scaled to 0..100.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::MeterConfig;

/// Visual zone of a meter level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterZone {
    Normal,
    Hot,
    Clip,
}

impl MeterZone {
    pub fn classify(level: f64) -> MeterZone {
        if level > 80.0 {
            MeterZone::Clip
        } else if level > 60.0 {
            MeterZone::Hot
        } else {
            MeterZone::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeterZone::Normal => "normal",
            MeterZone::Hot => "hot",
            MeterZone::Clip => "clip",
        }
    }
}

/// A non-destructive tap: it only reads the samples pushed into it.
pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    history: Vec<f32>,
    write_pos: usize,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f64>,
    smoothing: f64,
    min_db: f64,
    max_db: f64,
}

impl Analyser {
    pub fn new(config: &MeterConfig) -> Self {
        let size = config.fft_size;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Analyser {
            fft,
            window: blackman(size),
            history: vec![0.0; size],
            write_pos: 0,
            spectrum: vec![Complex::new(0.0, 0.0); size],
            scratch,
            smoothed: vec![0.0; size / 2],
            smoothing: config.smoothing,
            min_db: config.min_decibels,
            max_db: config.max_decibels,
        }
    }

    #[inline]
    pub fn push(&mut self, sample: f64) {
        self.history[self.write_pos] = sample as f32;
        self.write_pos = (self.write_pos + 1) % self.history.len();
    }

    /// Take a spectral snapshot and return the meter level (0..=100).
    ///
    /// Each call advances the smoothing state, like reading frequency data
    /// from an analyser once per display frame.
    pub fn level(&mut self) -> f64 {
        let n = self.history.len();
        for i in 0..n {
            let s = self.history[(self.write_pos + i) % n];
            self.spectrum[i] = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let range = self.max_db - self.min_db;
        let mut sum_sq = 0.0;
        for (bin, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.spectrum[bin].norm() as f64 / n as f64;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
            let db = 20.0 * smoothed.log10();
            let byte = (255.0 / range * (db - self.min_db)).floor().clamp(0.0, 255.0);
            sum_sq += byte * byte;
        }
        let rms = (sum_sq / self.smoothed.len() as f64).sqrt();
        (rms / 255.0 * 100.0).min(100.0)
    }
}

fn blackman(size: usize) -> Vec<f32> {
    use std::f64::consts::PI;
    (0..size)
        .map(|i| {
            let x = i as f64 / size as f64;
            (0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()) as f32
        })
        .collect()
}
