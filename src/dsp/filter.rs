//! Resonant low-pass biquad, matching WebAudio `BiquadFilterNode` in
//! `"lowpass"` mode where the Q parameter is a resonance in dB.

use std::f64::consts::PI;

/// A 2nd-order IIR low-pass filter.
///
/// Direct Form II Transposed. Coefficients are recomputed lazily whenever
/// cutoff or resonance change, so a per-sample cutoff automation only pays
/// for the recompute when the value actually moves.
#[derive(Debug, Clone)]
pub struct LowpassFilter {
    cutoff: f64,
    resonance_db: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,

    sample_rate: f64,
    dirty: bool,
}

impl LowpassFilter {
    pub fn new(sample_rate: f64) -> Self {
        let mut f = LowpassFilter {
            cutoff: 350.0,
            resonance_db: 1.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
            dirty: true,
        };
        f.update_coefficients();
        f
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn update_coefficients(&mut self) {
        let w0 = 2.0 * PI * self.cutoff / self.sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * 10.0_f64.powf(self.resonance_db / 20.0));

        let b1 = 1.0 - cos_w0;
        let b0 = b1 / 2.0;
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b0 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
        self.dirty = false;
    }

    /// Set the cutoff, clamped to [10 Hz, 0.49 × sample rate].
    pub fn set_cutoff(&mut self, hz: f64) {
        let hz = hz.clamp(10.0, self.sample_rate * 0.49);
        if hz != self.cutoff {
            self.cutoff = hz;
            self.dirty = true;
        }
    }

    /// Set resonance in dB.
    pub fn set_resonance(&mut self, db: f64) {
        if db != self.resonance_db {
            self.resonance_db = db;
            self.dirty = true;
        }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        if self.dirty {
            self.update_coefficients();
        }

        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_dc() {
        let mut f = LowpassFilter::new(44100.0);
        f.set_cutoff(5000.0);
        f.set_resonance(0.0);

        let mut output = 0.0;
        for _ in 0..2000 {
            output = f.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.001, "Lowpass should pass DC, got {output}");
    }

    #[test]
    fn attenuates_high_freq() {
        let mut f = LowpassFilter::new(44100.0);
        f.set_cutoff(200.0);
        f.set_resonance(0.0);

        let mut max_out = 0.0_f64;
        for i in 0..4410 {
            let t = i as f64 / 44100.0;
            let out = f.process((2.0 * PI * 10000.0 * t).sin());
            if i > 1000 {
                max_out = max_out.max(out.abs());
            }
        }
        assert!(max_out < 0.01, "Lowpass@200Hz should strongly attenuate 10kHz, got {max_out}");
    }

    #[test]
    fn resonance_boosts_cutoff_region() {
        let peak = |res: f64| {
            let mut f = LowpassFilter::new(44100.0);
            f.set_cutoff(1000.0);
            f.set_resonance(res);
            let mut max_out = 0.0_f64;
            for i in 0..44100 {
                let t = i as f64 / 44100.0;
                let out = f.process((2.0 * PI * 1000.0 * t).sin());
                if i > 4410 {
                    max_out = max_out.max(out.abs());
                }
            }
            max_out
        };
        let flat = peak(0.0);
        let resonant = peak(12.0);
        assert!(resonant > flat * 2.0, "12 dB resonance should boost: {flat} vs {resonant}");
    }

    #[test]
    fn cutoff_is_clamped() {
        let mut f = LowpassFilter::new(44100.0);
        f.set_cutoff(-500.0);
        assert_eq!(f.cutoff(), 10.0);
        f.set_cutoff(1e9);
        assert!((f.cutoff() - 44100.0 * 0.49).abs() < 1e-9);
        for i in 0..1000 {
            let out = f.process(if i % 50 == 0 { 1.0 } else { 0.0 });
            assert!(out.is_finite(), "output not finite at {i}");
        }
    }
}
