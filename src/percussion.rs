//! Procedural drum synthesis.
//!
//! Each of the eight drum tracks is rendered into a fixed-length mono buffer
//! from a small parametric model: a shared attack/decay/exponential-release
//! envelope and a voice-specific body built from sines and white noise.
//! Rendering is a pure function of the parameters and the noise source.

use std::f64::consts::PI;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsp::sampler::SampleBuffer;
use crate::error::{Result, StudioError};

/// Number of drum tracks.
pub const TRACK_COUNT: usize = 8;

/// Sustain level the envelope falls to after the decay stage.
const SUSTAIN_LEVEL: f64 = 0.3;
/// Shortest buffer ever rendered, in seconds.
const MIN_LENGTH_SECS: f64 = 0.05;
/// Declick fade at the tail, in seconds.
const FADE_SECS: f64 = 0.005;
const HEADROOM: f64 = 0.4;
/// Cutoff at or above which the soft filter leaves the level untouched.
const FILTER_OPEN_HZ: f64 = 8000.0;

/// Accepted `(min, max)` for each sound-design control.
pub const ATTACK_RANGE: (f64, f64) = (0.0, 1.0);
pub const DECAY_RANGE: (f64, f64) = (0.1, 3.0);
pub const RELEASE_RANGE: (f64, f64) = (0.0, 3.0);
pub const PITCH_RANGE: (f64, f64) = (-24.0, 24.0);
pub const FILTER_RANGE: (f64, f64) = (100.0, FILTER_OPEN_HZ);

/// The eight fixed drum voices, in track order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrumVoice {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Crash,
    Perc1,
    Perc2,
    Clap,
}

impl DrumVoice {
    pub const ALL: [DrumVoice; TRACK_COUNT] = [
        DrumVoice::Kick,
        DrumVoice::Snare,
        DrumVoice::ClosedHat,
        DrumVoice::OpenHat,
        DrumVoice::Crash,
        DrumVoice::Perc1,
        DrumVoice::Perc2,
        DrumVoice::Clap,
    ];

    pub fn from_track(track: usize) -> Result<DrumVoice> {
        DrumVoice::ALL.get(track).copied().ok_or(StudioError::TrackOutOfRange {
            index: track,
            len: TRACK_COUNT,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            DrumVoice::Kick => "Kick",
            DrumVoice::Snare => "Snare",
            DrumVoice::ClosedHat => "Hi-Hat",
            DrumVoice::OpenHat => "Open Hat",
            DrumVoice::Crash => "Crash",
            DrumVoice::Perc1 => "Perc 1",
            DrumVoice::Perc2 => "Perc 2",
            DrumVoice::Clap => "Clap",
        }
    }

    /// Nominal duration in seconds, scaled by the `decay` parameter.
    fn base_duration(self) -> f64 {
        match self {
            DrumVoice::Kick => 0.5,
            DrumVoice::Snare => 0.25,
            DrumVoice::ClosedHat => 0.12,
            DrumVoice::OpenHat => 0.6,
            DrumVoice::Crash => 1.8,
            DrumVoice::Perc1 => 0.3,
            DrumVoice::Perc2 => 0.25,
            DrumVoice::Clap => 0.15,
        }
    }

    /// Nominal frequency in Hz, scaled by the `pitch` parameter.
    fn base_frequency(self) -> f64 {
        match self {
            DrumVoice::Kick => 45.0,
            DrumVoice::Snare => 180.0,
            DrumVoice::ClosedHat => 10000.0,
            DrumVoice::OpenHat => 8000.0,
            DrumVoice::Crash => 4000.0,
            DrumVoice::Perc1 => 600.0,
            DrumVoice::Perc2 => 350.0,
            DrumVoice::Clap => 800.0,
        }
    }
}

/// Sound-design parameters for one drum track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundParams {
    /// Seconds.
    pub attack: f64,
    /// Seconds; also scales the buffer length.
    pub decay: f64,
    /// Seconds.
    pub release: f64,
    /// Semitones.
    pub pitch: f64,
    /// Soft filter cutoff in Hz.
    pub filter: f64,
}

impl SoundParams {
    /// Factory sound for a voice.
    pub fn default_for(voice: DrumVoice) -> SoundParams {
        let (decay, release, filter) = match voice {
            DrumVoice::Kick => (0.5, 0.1, 8000.0),
            DrumVoice::Snare => (0.3, 0.1, 6000.0),
            DrumVoice::ClosedHat => (0.15, 0.05, 8000.0),
            DrumVoice::OpenHat => (0.8, 0.2, 7000.0),
            DrumVoice::Crash => (2.0, 0.5, 5000.0),
            DrumVoice::Perc1 => (0.4, 0.1, 4000.0),
            DrumVoice::Perc2 => (0.3, 0.1, 3500.0),
            DrumVoice::Clap => (0.2, 0.05, 6500.0),
        };
        SoundParams {
            attack: 0.01,
            decay,
            release,
            pitch: 0.0,
            filter,
        }
    }

    /// Reject any control outside its editor range, NaN included.
    pub fn validate(&self) -> Result<()> {
        let controls = [
            ("attack", self.attack, ATTACK_RANGE),
            ("decay", self.decay, DECAY_RANGE),
            ("release", self.release, RELEASE_RANGE),
            ("pitch", self.pitch, PITCH_RANGE),
            ("filter", self.filter, FILTER_RANGE),
        ];
        for (name, value, (min, max)) in controls {
            if !(min..=max).contains(&value) {
                return Err(StudioError::SoundParamOutOfRange { name, value, min, max });
            }
        }
        Ok(())
    }
}

/// Factory sounds for all tracks.
pub fn default_sound_params() -> [SoundParams; TRACK_COUNT] {
    DrumVoice::ALL.map(SoundParams::default_for)
}

/// Envelope level at time `t` seconds.
///
/// Linear rise over `attack`, linear fall to 0.3 over `decay`, then an
/// exponential tail with time constant `release / 5`.
pub fn percussion_envelope(t: f64, attack: f64, decay: f64, release: f64) -> f64 {
    if t < attack {
        t / attack
    } else if t < attack + decay {
        let progress = (t - attack) / decay;
        1.0 - progress * (1.0 - SUSTAIN_LEVEL)
    } else if release <= 0.0 {
        0.0
    } else {
        let progress = (t - attack - decay) / release;
        SUSTAIN_LEVEL * (-progress * 5.0).exp()
    }
}

/// Number of samples in a rendered buffer.
pub fn buffer_length(voice: DrumVoice, params: &SoundParams, sample_rate: u32) -> usize {
    let sr = sample_rate as f64;
    let duration = voice.base_duration() * params.decay.min(DECAY_RANGE.1);
    (sr * duration).max(sr * MIN_LENGTH_SECS).floor() as usize
}

#[inline]
fn noise(rng: &mut fastrand::Rng) -> f64 {
    rng.f64() * 2.0 - 1.0
}

/// Render one drum hit.
pub fn render(voice: DrumVoice, params: &SoundParams, sample_rate: u32, rng: &mut fastrand::Rng) -> SampleBuffer {
    let sr = sample_rate as f64;
    let len = buffer_length(voice, params, sample_rate);
    let freq = voice.base_frequency() * 2.0_f64.powf(params.pitch / 12.0);
    let filter_gain = if params.filter < FILTER_OPEN_HZ {
        params.filter / FILTER_OPEN_HZ
    } else {
        1.0
    };

    let mut data = Vec::with_capacity(len);
    for i in 0..len {
        let t = i as f64 / sr;
        let env = percussion_envelope(t, params.attack, params.decay, params.release);

        let body = match voice {
            DrumVoice::Kick => {
                let sweep = freq * (1.0 + (-t * 30.0).exp() * 3.0);
                let mut s = (2.0 * PI * sweep * t).sin() * env;
                if t < 0.005 {
                    s += noise(rng) * env * 2.0;
                }
                s
            }
            DrumVoice::Snare => {
                let n = noise(rng) * 0.8;
                let tone = (2.0 * PI * freq * t).sin() * 0.3;
                (n + tone) * env
            }
            DrumVoice::ClosedHat | DrumVoice::OpenHat | DrumVoice::Crash => {
                let mut s = noise(rng) * env;
                for h in 1..=6 {
                    let h = h as f64;
                    s += (2.0 * PI * freq * h * t).sin() * (1.0 / h) * 0.1 * env;
                }
                s
            }
            DrumVoice::Perc1 | DrumVoice::Perc2 => {
                (2.0 * PI * freq * t).sin() * env + (2.0 * PI * freq * 2.1 * t).sin() * 0.3 * env
            }
            DrumVoice::Clap => {
                let s = noise(rng) * env;
                let slap = t < 0.003 || (t > 0.008 && t < 0.012) || (t > 0.015 && t < 0.020);
                if slap { s * 2.0 } else { s }
            }
        };

        data.push((body * filter_gain * HEADROOM).clamp(-1.0, 1.0) as f32);
    }

    // Linear declick; the final sample lands on exactly zero.
    let fade_len = ((sr * FADE_SECS).floor() as usize).min(len);
    if fade_len > 0 {
        for (k, s) in data[len - fade_len..].iter_mut().enumerate() {
            *s *= (fade_len - 1 - k) as f32 / fade_len as f32;
        }
    }

    SampleBuffer::new(data, sample_rate)
}

/// The current set of rendered drum buffers, one per track.
///
/// The set is replaced as a whole on every regeneration; readers holding an
/// older `Arc` keep a consistent snapshot.
pub struct DrumKit {
    sample_rate: u32,
    buffers: Arc<Vec<Arc<SampleBuffer>>>,
    rng: fastrand::Rng,
}

impl DrumKit {
    /// An empty kit. Nothing plays until [`DrumKit::regenerate_all`] runs.
    pub fn new(sample_rate: u32, rng: fastrand::Rng) -> Self {
        DrumKit {
            sample_rate,
            buffers: Arc::new(Vec::new()),
            rng,
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.buffers.len() == TRACK_COUNT
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.buffers = Arc::new(Vec::new());
        }
    }

    pub fn regenerate_all(&mut self, params: &[SoundParams; TRACK_COUNT]) {
        let buffers = DrumVoice::ALL
            .iter()
            .zip(params)
            .map(|(&voice, p)| Arc::new(render(voice, p, self.sample_rate, &mut self.rng)))
            .collect();
        self.buffers = Arc::new(buffers);
        debug!(sample_rate = self.sample_rate, "rendered all drum buffers");
    }

    /// Re-render one track. Renders everything if the kit is still empty.
    pub fn regenerate_track(&mut self, track: usize, params: &[SoundParams; TRACK_COUNT]) -> Result<()> {
        let voice = DrumVoice::from_track(track)?;
        if !self.is_rendered() {
            self.regenerate_all(params);
            return Ok(());
        }
        let mut buffers: Vec<Arc<SampleBuffer>> = self.buffers.iter().cloned().collect();
        buffers[track] = Arc::new(render(voice, &params[track], self.sample_rate, &mut self.rng));
        self.buffers = Arc::new(buffers);
        debug!(track, voice = voice.name(), "re-rendered drum buffer");
        Ok(())
    }

    /// Latest buffer for a track, if rendered.
    pub fn buffer(&self, track: usize) -> Option<Arc<SampleBuffer>> {
        self.buffers.get(track).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    fn rng() -> fastrand::Rng {
        fastrand::Rng::with_seed(42)
    }

    #[test]
    fn envelope_stages() {
        let (a, d, r) = (0.01, 0.5, 0.1);
        assert_eq!(percussion_envelope(0.0, a, d, r), 0.0);
        assert!((percussion_envelope(0.005, a, d, r) - 0.5).abs() < 1e-9);
        assert!((percussion_envelope(0.01, a, d, r) - 1.0).abs() < 1e-9);
        assert!((percussion_envelope(0.26, a, d, r) - 0.65).abs() < 1e-9);
        assert!((percussion_envelope(0.51, a, d, r) - 0.3).abs() < 1e-9);
        let tail = percussion_envelope(0.61, a, d, r);
        assert!((tail - 0.3 * (-5.0_f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn envelope_survives_zero_stages() {
        assert_eq!(percussion_envelope(0.0, 0.0, 0.2, 0.1), 1.0, "zero attack starts at the peak");
        let v = percussion_envelope(0.0, 0.0, 0.0, 0.1);
        assert!((v - 0.3).abs() < 1e-9, "zero decay goes straight to the tail");
        assert_eq!(percussion_envelope(0.5, 0.0, 0.0, 0.0), 0.0);
        assert!(percussion_envelope(0.0, 0.0, 0.0, 0.0).is_finite());
    }

    #[test]
    fn buffer_length_has_floor() {
        for voice in DrumVoice::ALL {
            for decay in [0.0, 0.001, 0.05, 1.0, 3.0] {
                let params = SoundParams {
                    decay,
                    ..SoundParams::default_for(voice)
                };
                let buf = render(voice, &params, SR, &mut rng());
                assert!(
                    buf.len() >= (SR as f64 * 0.05) as usize,
                    "{voice:?} decay {decay} rendered {} samples",
                    buf.len()
                );
            }
        }
    }

    #[test]
    fn kick_length_follows_decay() {
        let params = SoundParams::default_for(DrumVoice::Kick);
        assert_eq!(buffer_length(DrumVoice::Kick, &params, SR), 11025);
    }

    #[test]
    fn buffer_length_is_capped_at_max_decay() {
        let params = SoundParams {
            decay: 1.0e9,
            ..SoundParams::default_for(DrumVoice::Kick)
        };
        assert_eq!(buffer_length(DrumVoice::Kick, &params, SR), 66150);
    }

    #[test]
    fn factory_sounds_are_in_range() {
        for voice in DrumVoice::ALL {
            let p = SoundParams::default_for(voice);
            assert!(p.validate().is_ok(), "{voice:?} factory sound rejected: {p:?}");
        }
    }

    #[test]
    fn out_of_range_controls_are_named() {
        let base = SoundParams::default_for(DrumVoice::Kick);
        let cases = [
            (SoundParams { decay: 1.0e9, ..base }, "decay"),
            (SoundParams { decay: 0.05, ..base }, "decay"),
            (SoundParams { decay: f64::NAN, ..base }, "decay"),
            (SoundParams { attack: -0.1, ..base }, "attack"),
            (SoundParams { release: 3.5, ..base }, "release"),
            (SoundParams { pitch: 25.0, ..base }, "pitch"),
            (SoundParams { filter: 50.0, ..base }, "filter"),
            (SoundParams { filter: f64::INFINITY, ..base }, "filter"),
        ];
        for (params, expected) in cases {
            match params.validate() {
                Err(StudioError::SoundParamOutOfRange { name, .. }) => assert_eq!(name, expected),
                other => panic!("{expected}: expected a range error, got {other:?}"),
            }
        }

        let edges = SoundParams {
            attack: 1.0,
            decay: 0.1,
            release: 3.0,
            pitch: -24.0,
            filter: 100.0,
        };
        assert!(edges.validate().is_ok(), "range ends are inclusive");
    }

    #[test]
    fn tails_fade_to_zero() {
        let fade = (SR as f64 * 0.005) as usize;
        for voice in DrumVoice::ALL {
            let buf = render(voice, &SoundParams::default_for(voice), SR, &mut rng());
            let tail = &buf.data[buf.len() - fade..];
            assert_eq!(*tail.last().unwrap(), 0.0, "{voice:?} should end on zero");
            // the fade factor falls monotonically; the envelope under it is tiny
            let factors: Vec<f32> = (0..fade).map(|k| (fade - 1 - k) as f32 / fade as f32).collect();
            assert!(factors.windows(2).all(|w| w[1] <= w[0]));
            for (k, s) in tail.iter().enumerate() {
                assert!(s.abs() <= factors[k] + 1e-6, "{voice:?} tail sample {k} = {s}");
            }
        }
    }

    #[test]
    fn output_is_clamped_with_headroom() {
        for voice in DrumVoice::ALL {
            let params = SoundParams {
                attack: 0.0,
                ..SoundParams::default_for(voice)
            };
            let buf = render(voice, &params, SR, &mut rng());
            assert!(buf.data.iter().all(|s| s.abs() <= 1.0), "{voice:?} exceeds unity");
        }
    }

    #[test]
    fn soft_filter_scales_level() {
        let open = SoundParams {
            filter: 8000.0,
            ..SoundParams::default_for(DrumVoice::Perc1)
        };
        let half = SoundParams { filter: 4000.0, ..open };
        let a = render(DrumVoice::Perc1, &open, SR, &mut rng());
        let b = render(DrumVoice::Perc1, &half, SR, &mut rng());
        // perc is noise-free, so the ratio is exact away from the fade
        for i in [100, 500, 2000] {
            assert!((b.data[i] - a.data[i] * 0.5).abs() < 1e-6, "sample {i}");
        }
    }

    /// The noise values a voice drawing once per sample would see.
    fn noise_stream(seed: u64, len: usize) -> Vec<f64> {
        let mut rng = fastrand::Rng::with_seed(seed);
        (0..len).map(|_| rng.f64() * 2.0 - 1.0).collect()
    }

    #[test]
    fn kick_noise_is_confined_to_first_five_ms() {
        let p = SoundParams::default_for(DrumVoice::Kick);
        let a = render(DrumVoice::Kick, &p, SR, &mut fastrand::Rng::with_seed(1));
        let b = render(DrumVoice::Kick, &p, SR, &mut fastrand::Rng::with_seed(2));
        let edge = (SR as f64 * 0.005).ceil() as usize;
        assert!(a.data[..edge] != b.data[..edge], "transient should follow the noise seed");
        assert_eq!(&a.data[edge..], &b.data[edge..], "body after 5 ms is a pure sweep");
    }

    #[test]
    fn clap_doubles_noise_in_three_bursts() {
        let p = SoundParams::default_for(DrumVoice::Clap);
        let buf = render(DrumVoice::Clap, &p, SR, &mut fastrand::Rng::with_seed(5));
        let noise = noise_stream(5, buf.len());
        let scale = p.filter / FILTER_OPEN_HZ * HEADROOM;
        let gain_at = |i: usize| {
            let t = i as f64 / SR as f64;
            let plain = noise[i] * percussion_envelope(t, p.attack, p.decay, p.release) * scale;
            (plain.abs() > 1e-3).then(|| buf.data[i] as f64 / plain)
        };

        // 0-3 ms, 8-12 ms and 15-20 ms are doubled; the gaps are not
        let windows = [
            (10..120, 2.0),
            (160..340, 1.0),
            (360..520, 2.0),
            (540..650, 1.0),
            (670..870, 2.0),
            (900..1500, 1.0),
        ];
        for (range, expected) in windows {
            let gains: Vec<f64> = range.clone().filter_map(&gain_at).collect();
            assert!(gains.len() > range.len() / 2, "too few usable samples in {range:?}");
            for g in gains {
                assert!((g - expected).abs() < 1e-4, "gain {g} in {range:?}, expected {expected}");
            }
        }
    }

    #[test]
    fn hats_carry_six_partials_over_noise() {
        let voice = DrumVoice::ClosedHat;
        let p = SoundParams::default_for(voice);
        let buf = render(voice, &p, SR, &mut fastrand::Rng::with_seed(3));
        let noise = noise_stream(3, buf.len());
        let freq = voice.base_frequency();
        let model = |partials: usize, i: usize| {
            let t = i as f64 / SR as f64;
            let env = percussion_envelope(t, p.attack, p.decay, p.release);
            let tone: f64 = (1..=partials)
                .map(|h| {
                    let h = h as f64;
                    (2.0 * PI * freq * h * t).sin() / h * 0.1
                })
                .sum();
            // filter is fully open at 8 kHz
            (noise[i] + tone) * env * HEADROOM
        };
        let fade = (SR as f64 * FADE_SECS) as usize;
        let body = 0..buf.len() - fade;
        let max_error = |partials: usize| {
            body.clone()
                .map(|i| (buf.data[i] as f64 - model(partials, i)).abs())
                .fold(0.0, f64::max)
        };
        assert!(max_error(6) < 1e-5, "six partials should match, error {}", max_error(6));
        assert!(max_error(5) > 1e-3, "the sixth partial should be audible");
    }

    #[test]
    fn tonal_voices_are_deterministic() {
        let p = SoundParams::default_for(DrumVoice::Perc2);
        let a = render(DrumVoice::Perc2, &p, SR, &mut fastrand::Rng::with_seed(1));
        let b = render(DrumVoice::Perc2, &p, SR, &mut fastrand::Rng::with_seed(2));
        assert_eq!(a, b);
    }

    #[test]
    fn noisy_voices_vary_per_render() {
        let p = SoundParams::default_for(DrumVoice::Snare);
        let mut rng = rng();
        let a = render(DrumVoice::Snare, &p, SR, &mut rng);
        let b = render(DrumVoice::Snare, &p, SR, &mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn kit_swaps_only_the_changed_track() {
        let mut params = default_sound_params();
        let mut kit = DrumKit::new(SR, rng());
        assert!(kit.buffer(0).is_none());
        kit.regenerate_all(&params);
        assert!(kit.is_rendered());

        let kick_before = kit.buffer(0).unwrap();
        let snare_before = kit.buffer(1).unwrap();
        params[1].decay = 1.0;
        kit.regenerate_track(1, &params).unwrap();

        assert!(Arc::ptr_eq(&kick_before, &kit.buffer(0).unwrap()));
        assert!(!Arc::ptr_eq(&snare_before, &kit.buffer(1).unwrap()));
        assert_eq!(kit.buffer(1).unwrap().len(), buffer_length(DrumVoice::Snare, &params[1], SR));
        assert!(kit.regenerate_track(8, &params).is_err());
    }

    #[test]
    fn sound_params_json_shape() {
        let json = serde_json::to_string(&SoundParams::default_for(DrumVoice::Crash)).unwrap();
        assert_eq!(
            json,
            r#"{"attack":0.01,"decay":2.0,"release":0.5,"pitch":0.0,"filter":5000.0}"#
        );
    }
}
