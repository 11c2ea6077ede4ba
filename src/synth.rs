//! Subtractive note synth, control side.
//!
//! [`NoteSynth::play_note`] schedules a [`NoteVoice`] on the render graph and
//! records it in the [`ActiveVoiceSet`], an arena of sounding notes used for
//! the "all notes off" fade. Entries leave the arena on their own once their
//! stop time (plus a short grace) has passed on the audio clock.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::context::AudioContext;
use crate::dsp::oscillator::Waveform;
use crate::dsp::voice::NoteVoice;
use crate::graph::GraphCommand;

/// Lowest and highest selectable octave.
pub const MIN_OCTAVE: u8 = 2;
pub const MAX_OCTAVE: u8 = 5;
pub const DEFAULT_OCTAVE: u8 = 3;

/// Note lengths in seconds.
pub const SEQUENCED_NOTE_SECS: f64 = 0.2;
pub const PREVIEW_NOTE_SECS: f64 = 0.3;
pub const KEYBOARD_NOTE_SECS: f64 = 0.5;

/// Time an expired voice lingers in the arena.
const EXPIRY_GRACE: f64 = 0.1;
/// Fade length used by [`NoteSynth::stop_all_sounds`].
const PANIC_FADE: f64 = 0.1;
/// Delay after which a panic fade empties the arena.
const PANIC_CLEAR: f64 = 0.2;

/// Pitch classes C..B at octave 4.
const PITCH_CLASS_HZ: [f64; 12] = [
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16, 493.88,
];

pub const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Frequency of pitch class `note` (0 = C) in `octave`.
pub fn note_frequency(note: usize, octave: u8) -> Option<f64> {
    let base = PITCH_CLASS_HZ.get(note)?;
    Some(base * 2.0_f64.powi(octave as i32 - 4))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LfoTarget {
    Filter,
    Pitch,
}

/// The shared synth patch. Edits affect only notes triggered afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthParams {
    /// Frequency ratio to the played note.
    pub osc1_freq: f64,
    pub osc1_wave: Waveform,
    /// Cents.
    pub osc1_detune: f64,
    pub osc2_freq: f64,
    pub osc2_wave: Waveform,
    pub osc2_detune: f64,
    /// 0 = all osc1, 100 = all osc2.
    pub osc_mix: f64,
    /// Hz.
    pub filter_cutoff: f64,
    /// dB.
    pub filter_res: f64,
    /// Percent of the cutoff added at the envelope peak.
    pub filter_env_amt: f64,
    pub env_attack: f64,
    pub env_decay: f64,
    pub env_sustain: f64,
    pub env_release: f64,
    /// Hz.
    pub lfo_rate: f64,
    /// 0-100; 0 disables the LFO.
    pub lfo_amount: f64,
    pub lfo_target: LfoTarget,
    /// 0-100.
    pub volume: u8,
}

impl Default for SynthParams {
    fn default() -> Self {
        SynthParams {
            osc1_freq: 1.0,
            osc1_wave: Waveform::Sawtooth,
            osc1_detune: 0.0,
            osc2_freq: 2.0,
            osc2_wave: Waveform::Square,
            osc2_detune: 0.0,
            osc_mix: 50.0,
            filter_cutoff: 2000.0,
            filter_res: 5.0,
            filter_env_amt: 50.0,
            env_attack: 0.1,
            env_decay: 0.3,
            env_sustain: 0.7,
            env_release: 0.5,
            lfo_rate: 2.0,
            lfo_amount: 0.0,
            lfo_target: LfoTarget::Filter,
            volume: 70,
        }
    }
}

impl SynthParams {
    /// Linear gain of the synth bus for this patch's volume.
    pub fn bus_gain(&self, scale: f64) -> f64 {
        self.volume.min(100) as f64 / 100.0 * scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

#[derive(Debug, Clone, Copy)]
struct VoiceEntry {
    stop: f64,
    nodes: usize,
}

/// Arena of currently sounding notes, keyed by [`VoiceId`].
#[derive(Debug, Default)]
pub struct ActiveVoiceSet {
    entries: HashMap<VoiceId, VoiceEntry>,
    next_id: u64,
    /// Audio time at which a pending panic clear empties the arena.
    clear_at: Option<f64>,
}

impl ActiveVoiceSet {
    pub fn insert(&mut self, stop: f64, nodes: usize) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, VoiceEntry { stop, nodes });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Total tracked audio nodes (6 per note, 8 with an LFO).
    pub fn node_count(&self) -> usize {
        self.entries.values().map(|e| e.nodes).sum()
    }

    /// Shorten every entry to stop by `stop`.
    fn truncate_all(&mut self, stop: f64) {
        for entry in self.entries.values_mut() {
            entry.stop = entry.stop.min(stop);
        }
    }

    fn schedule_clear(&mut self, at: f64) {
        self.clear_at = Some(at);
    }

    /// Drop entries whose stop time plus grace has elapsed at `now`, and run
    /// a pending clear. Returns how many entries were removed.
    pub fn collect_expired(&mut self, now: f64) -> usize {
        let before = self.entries.len();
        if self.clear_at.is_some_and(|at| now >= at) {
            self.entries.clear();
            self.clear_at = None;
        } else {
            self.entries.retain(|_, e| now < e.stop + EXPIRY_GRACE);
        }
        before - self.entries.len()
    }
}

/// Control-side handle of the note synth.
#[derive(Debug, Default)]
pub struct NoteSynth {
    voices: ActiveVoiceSet,
}

impl NoteSynth {
    pub fn new() -> Self {
        NoteSynth::default()
    }

    pub fn active_voices(&self) -> &ActiveVoiceSet {
        &self.voices
    }

    /// Schedule a note at the context's current time.
    ///
    /// Silently does nothing until the context is ready.
    pub fn play_note(
        &mut self,
        ctx: &AudioContext,
        params: &SynthParams,
        frequency: f64,
        duration: f64,
    ) -> Option<VoiceId> {
        if !ctx.is_ready() {
            return None;
        }
        let now = ctx.current_time();
        let voice = NoteVoice::new(params, frequency, duration, now, ctx.sample_rate() as f64);
        let nodes = if voice.has_lfo() { 8 } else { 6 };
        let stop = voice.stop_time();
        if !ctx.send(GraphCommand::StartVoice(Box::new(voice))) {
            return None;
        }
        let id = self.voices.insert(stop, nodes);
        trace!(frequency, duration, ?id, "note scheduled");
        Some(id)
    }

    /// Fade every sounding note to silence over 100 ms; the arena empties
    /// 200 ms later.
    pub fn stop_all_sounds(&mut self, ctx: &AudioContext) {
        if !ctx.is_ready() {
            return;
        }
        let now = ctx.current_time();
        ctx.send(GraphCommand::FadeOutVoices {
            at: now,
            fade: PANIC_FADE,
        });
        self.voices.truncate_all(now + PANIC_FADE);
        self.voices.schedule_clear(now + PANIC_CLEAR);
        debug!(voices = self.voices.len(), "fading out all notes");
    }

    /// Housekeeping; call regularly with the audio clock.
    pub fn collect_expired(&mut self, now: f64) -> usize {
        self.voices.collect_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StudioConfig;
    use crate::context::ManualBackend;

    #[test]
    fn note_frequencies() {
        assert_eq!(note_frequency(9, 4), Some(440.0));
        assert!((note_frequency(0, 3).unwrap() - 130.815).abs() < 1e-9);
        assert!((note_frequency(11, 5).unwrap() - 987.76).abs() < 1e-9);
        assert_eq!(note_frequency(12, 4), None);
    }

    #[test]
    fn params_json_uses_persisted_names() {
        let json = serde_json::to_value(SynthParams::default()).unwrap();
        assert_eq!(json["osc1Wave"], "sawtooth");
        assert_eq!(json["lfoTarget"], "filter");
        assert_eq!(json["filterEnvAmt"], 50.0);

        // unknown keys from older sessions are ignored, missing ones defaulted
        let p: SynthParams =
            serde_json::from_str(r#"{"oscMix": 20, "distortion": 10, "lfoTarget": "pitch"}"#).unwrap();
        assert_eq!(p.osc_mix, 20.0);
        assert_eq!(p.lfo_target, LfoTarget::Pitch);
        assert_eq!(p.volume, 70);
    }

    #[test]
    fn bus_gain_scales_volume() {
        let p = SynthParams::default();
        assert!((p.bus_gain(0.3) - 0.21).abs() < 1e-12);
    }

    #[test]
    fn arena_expires_after_grace() {
        let mut set = ActiveVoiceSet::default();
        let a = set.insert(1.0, 6);
        let b = set.insert(2.0, 8);
        assert_eq!(set.node_count(), 14);
        assert_eq!(set.collect_expired(1.05), 0, "still within grace");
        assert_eq!(set.collect_expired(1.1), 1);
        assert!(!set.contains(a) && set.contains(b));
        set.collect_expired(2.2);
        assert!(set.is_empty());
    }

    #[test]
    fn play_note_before_ready_is_a_no_op() {
        let ctx = AudioContext::new(StudioConfig::default());
        let mut synth = NoteSynth::new();
        assert_eq!(synth.play_note(&ctx, &SynthParams::default(), 440.0, 0.2), None);
        assert!(synth.active_voices().is_empty());
        synth.stop_all_sounds(&ctx);
    }

    #[test]
    fn stop_all_sounds_empties_within_200ms() {
        let mut ctx = AudioContext::new(StudioConfig::default());
        let mut backend = ManualBackend::new(44100);
        ctx.initialize(&mut backend).unwrap();
        let mut synth = NoteSynth::new();
        let mut params = SynthParams::default();
        synth.play_note(&ctx, &params, 220.0, 5.0).unwrap();
        params.lfo_amount = 30.0;
        synth.play_note(&ctx, &params, 330.0, 5.0).unwrap();
        assert_eq!(synth.active_voices().len(), 2);
        assert_eq!(synth.active_voices().node_count(), 14);

        synth.stop_all_sounds(&ctx);
        let mut out = vec![0.0_f32; 2 * 8820]; // 200 ms stereo
        backend.render(&mut out);
        synth.collect_expired(ctx.current_time());
        assert!(synth.active_voices().is_empty());
    }
}
