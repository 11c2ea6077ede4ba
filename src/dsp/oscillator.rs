//! Note and LFO oscillators.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Supported waveform shapes. Serialised lowercase (`"sawtooth"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Phase-accumulator oscillator; saw and square edges are smoothed with
/// PolyBLEP. `detune` is fixed at note start; per-sample pitch modulation is passed
/// to [`Oscillator::next_sample_modulated`] instead.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    /// Cents.
    pub detune: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            detune: 0.0,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Convenience constructor for a voice oscillator.
    pub fn tuned(waveform: Waveform, frequency: f64, detune: f64, sample_rate: f64) -> Self {
        Oscillator {
            frequency,
            detune,
            ..Oscillator::new(waveform, sample_rate)
        }
    }

    fn phase_inc(&self, extra_cents: f64) -> f64 {
        let cents = self.detune + extra_cents;
        self.frequency * 2.0_f64.powf(cents / 1200.0) / self.sample_rate
    }

    pub fn next_sample(&mut self) -> f64 {
        self.next_sample_modulated(0.0)
    }

    /// Generate the next sample with `extra_cents` added to the detune.
    pub fn next_sample_modulated(&mut self, extra_cents: f64) -> f64 {
        let inc = self.phase_inc(extra_cents);
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Sawtooth => 2.0 * self.phase - 1.0 - poly_blep(self.phase, inc),
            Waveform::Square => {
                let naive = if self.phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(self.phase, inc) - poly_blep((self.phase + 0.5) % 1.0, inc)
            }
            // Piecewise linear: -1 -> +1 over the first half, back down over the second.
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample
    }
}

/// Residual subtracted around a discontinuity at phase 0. `dt` is the
/// per-sample phase increment.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_zero_at_start() {
        let mut osc = Oscillator::tuned(Waveform::Sine, 440.0, 0.0, 44100.0);
        let sample = osc.next_sample();
        assert!(sample.abs() < 1e-10, "Sine should start near 0, got {sample}");
    }

    #[test]
    fn waveforms_stay_bounded() {
        for wave in [Waveform::Sine, Waveform::Square, Waveform::Sawtooth, Waveform::Triangle] {
            let mut osc = Oscillator::tuned(wave, 440.0, 0.0, 44100.0);
            for _ in 0..44100 {
                let s = osc.next_sample();
                assert!(s.abs() <= 1.5, "{wave:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn detune_shifts_frequency() {
        let plain = Oscillator::tuned(Waveform::Sine, 440.0, 0.0, 44100.0);
        let octave_up = Oscillator::tuned(Waveform::Sine, 440.0, 1200.0, 44100.0);
        assert!(
            (octave_up.phase_inc(0.0) - 2.0 * plain.phase_inc(0.0)).abs() < 1e-10,
            "1200 cents detune should double frequency"
        );
        assert!(
            (plain.phase_inc(-1200.0) - 0.5 * plain.phase_inc(0.0)).abs() < 1e-10,
            "modulation adds to detune"
        );
    }

    #[test]
    fn waveform_names_are_lowercase() {
        let json = serde_json::to_string(&Waveform::Sawtooth).unwrap();
        assert_eq!(json, "\"sawtooth\"");
        let w: Waveform = serde_json::from_str("\"square\"").unwrap();
        assert_eq!(w, Waveform::Square);
    }
}
