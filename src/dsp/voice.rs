//! Note voice: the per-note subgraph of the subtractive synth.
//!
//! Two detuned oscillators are crossfaded, run through a resonant low-pass
//! whose cutoff follows its own envelope, and shaped by an amplitude
//! envelope. An optional sine LFO modulates either cutoff or pitch. All of
//! it is scheduled up front on [`Timeline`]s at construction time, so the
//! render thread only evaluates curves.

use crate::synth::{LfoTarget, SynthParams};

use super::automation::Timeline;
use super::filter::LowpassFilter;
use super::oscillator::{Oscillator, Waveform};

#[derive(Debug, Clone)]
struct Lfo {
    osc: Oscillator,
    depth: Timeline,
    target: LfoTarget,
}

/// A single scheduled note.
#[derive(Debug, Clone)]
pub struct NoteVoice {
    osc1: Oscillator,
    osc2: Oscillator,
    osc1_gain: Timeline,
    osc2_gain: Timeline,
    filter: LowpassFilter,
    cutoff: Timeline,
    lfo: Option<Lfo>,
    amp: Timeline,
    start: f64,
    stop: f64,
    finished: bool,
}

impl NoteVoice {
    /// Schedule a note of `frequency` Hz starting at audio time `now`.
    ///
    /// `duration` is the hold time between the end of the decay stage and
    /// the start of the release stage.
    pub fn new(params: &SynthParams, frequency: f64, duration: f64, now: f64, sample_rate: f64) -> Self {
        let attack = params.env_attack.max(0.0);
        let decay = params.env_decay.max(0.0);
        let release = params.env_release.max(0.0);
        let sustain = params.env_sustain.clamp(0.0, 1.0);
        let duration = duration.max(0.0);

        let attack_end = now + attack;
        let decay_end = attack_end + decay;
        let hold_end = decay_end + duration;
        let stop = hold_end + release;

        let mix = (params.osc_mix / 100.0).clamp(0.0, 1.0);
        let mut osc1_gain = Timeline::new(1.0);
        osc1_gain.set_value_at(1.0 - mix, now);
        let mut osc2_gain = Timeline::new(1.0);
        osc2_gain.set_value_at(mix, now);

        let base = params.filter_cutoff;
        let env_amount = params.filter_env_amt / 100.0 * base;
        let mut cutoff = Timeline::new(base);
        cutoff
            .set_value_at(base, now)
            .linear_ramp_to(base + env_amount, attack_end)
            .linear_ramp_to(base + env_amount * sustain, decay_end)
            .linear_ramp_to(base + env_amount * sustain, hold_end)
            .linear_ramp_to(base, stop);

        let mut filter = LowpassFilter::new(sample_rate);
        filter.set_resonance(params.filter_res);
        filter.set_cutoff(base);

        let lfo = (params.lfo_amount > 0.0).then(|| {
            let depth_value = match params.lfo_target {
                LfoTarget::Filter => params.lfo_amount / 100.0 * base * 0.5,
                LfoTarget::Pitch => params.lfo_amount / 100.0 * 50.0,
            };
            let mut depth = Timeline::new(depth_value);
            depth.set_value_at(depth_value, now);
            Lfo {
                osc: Oscillator::tuned(Waveform::Sine, params.lfo_rate, 0.0, sample_rate),
                depth,
                target: params.lfo_target,
            }
        });

        let mut amp = Timeline::new(0.0);
        amp.set_value_at(0.0, now)
            .linear_ramp_to(1.0, attack_end)
            .linear_ramp_to(sustain, decay_end)
            .linear_ramp_to(sustain, hold_end)
            .linear_ramp_to(0.0, stop);

        NoteVoice {
            osc1: Oscillator::tuned(
                params.osc1_wave,
                frequency * params.osc1_freq,
                params.osc1_detune,
                sample_rate,
            ),
            osc2: Oscillator::tuned(
                params.osc2_wave,
                frequency * params.osc2_freq,
                params.osc2_detune,
                sample_rate,
            ),
            osc1_gain,
            osc2_gain,
            filter,
            cutoff,
            lfo,
            amp,
            start: now,
            stop,
            finished: false,
        }
    }

    /// Audio time at which the oscillators stop.
    pub fn stop_time(&self) -> f64 {
        self.stop
    }

    pub fn has_lfo(&self) -> bool {
        self.lfo.is_some()
    }

    /// Emergency fade: every gain ramps to zero by `at + fade`, and the
    /// oscillators stop no later than that.
    pub fn fade_out(&mut self, at: f64, fade: f64) {
        let end = at + fade;
        for gain in [&mut self.osc1_gain, &mut self.osc2_gain, &mut self.amp] {
            gain.cancel_and_hold(at);
            gain.linear_ramp_to(0.0, end);
        }
        if let Some(lfo) = self.lfo.as_mut() {
            lfo.depth.cancel_and_hold(at);
            lfo.depth.linear_ramp_to(0.0, end);
        }
        self.stop = self.stop.min(end);
    }

    /// Render the sample at audio time `t`.
    pub fn next_sample(&mut self, t: f64) -> f64 {
        if self.finished {
            return 0.0;
        }
        if t >= self.stop {
            self.finished = true;
            return 0.0;
        }
        if t < self.start {
            return 0.0;
        }

        let (cents, cutoff_offset) = match self.lfo.as_mut() {
            Some(lfo) => {
                let v = lfo.osc.next_sample() * lfo.depth.value_at(t);
                match lfo.target {
                    LfoTarget::Pitch => (v, 0.0),
                    LfoTarget::Filter => (0.0, v),
                }
            }
            None => (0.0, 0.0),
        };

        let mixed = self.osc1.next_sample_modulated(cents) * self.osc1_gain.value_at(t)
            + self.osc2.next_sample_modulated(cents) * self.osc2_gain.value_at(t);

        self.filter.set_cutoff(self.cutoff.value_at(t) + cutoff_offset);
        self.filter.process(mixed) * self.amp.value_at(t)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn render(voice: &mut NoteVoice, from: f64, seconds: f64) -> Vec<f64> {
        let n = (seconds * SR) as usize;
        (0..n).map(|i| voice.next_sample(from + i as f64 / SR)).collect()
    }

    fn peak(samples: &[f64]) -> f64 {
        samples.iter().fold(0.0_f64, |m, s| m.max(s.abs()))
    }

    #[test]
    fn produces_sound_then_finishes() {
        let params = SynthParams::default();
        let mut v = NoteVoice::new(&params, 220.0, 0.2, 1.0, SR);
        let expected_stop = 1.0 + 0.1 + 0.3 + 0.2 + 0.5;
        assert!((v.stop_time() - expected_stop).abs() < 1e-9);

        let out = render(&mut v, 1.0, 1.2);
        assert!(peak(&out) > 0.05, "voice should be audible, peak {}", peak(&out));
        assert!(v.is_finished(), "voice should finish after its stop time");
        assert_eq!(v.next_sample(3.0), 0.0);
    }

    #[test]
    fn silent_before_start() {
        let params = SynthParams::default();
        let mut v = NoteVoice::new(&params, 220.0, 0.2, 2.0, SR);
        let out = render(&mut v, 0.0, 0.5);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn amp_envelope_holds_sustain_through_duration() {
        let params = SynthParams::default();
        let v = NoteVoice::new(&params, 220.0, 1.0, 0.0, SR);
        let at = |t: f64| v.amp.value_at(t);
        assert!((at(0.1) - 1.0).abs() < 1e-9, "peak after attack");
        assert!((at(0.4) - 0.7).abs() < 1e-9, "sustain after decay");
        assert!((at(1.2) - 0.7).abs() < 1e-9, "held during duration");
        assert!((at(1.65) - 0.35).abs() < 1e-9, "halfway through release");
    }

    #[test]
    fn filter_envelope_tracks_cutoff() {
        let params = SynthParams::default();
        let v = NoteVoice::new(&params, 220.0, 1.0, 0.0, SR);
        // cutoff 2000, env amount 50% -> +1000 at peak, +700 at sustain
        assert!((v.cutoff.value_at(0.1) - 3000.0).abs() < 1e-6);
        assert!((v.cutoff.value_at(0.8) - 2700.0).abs() < 1e-6);
        assert!((v.cutoff.value_at(5.0) - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn lfo_only_when_amount_positive() {
        let mut params = SynthParams::default();
        assert!(!NoteVoice::new(&params, 220.0, 0.2, 0.0, SR).has_lfo());

        params.lfo_amount = 40.0;
        params.lfo_target = LfoTarget::Pitch;
        let v = NoteVoice::new(&params, 220.0, 0.2, 0.0, SR);
        let lfo = v.lfo.as_ref().unwrap();
        assert!((lfo.depth.value_at(0.0) - 20.0).abs() < 1e-9, "40% of 50 cents");

        params.lfo_target = LfoTarget::Filter;
        let v = NoteVoice::new(&params, 220.0, 0.2, 0.0, SR);
        let lfo = v.lfo.as_ref().unwrap();
        assert!((lfo.depth.value_at(0.0) - 400.0).abs() < 1e-9, "40% of half the cutoff");
    }

    #[test]
    fn fade_out_silences_within_fade() {
        let params = SynthParams::default();
        let mut v = NoteVoice::new(&params, 220.0, 5.0, 0.0, SR);
        let _ = render(&mut v, 0.0, 0.5);
        v.fade_out(0.5, 0.1);
        assert!((v.stop_time() - 0.6).abs() < 1e-9);
        let _ = render(&mut v, 0.5, 0.1);
        assert_eq!(v.next_sample(0.61), 0.0);
        assert!(v.is_finished());
    }
}
