//! The composing layer: one object that wires the clock, the store, the drum
//! kit and the note synth to the audio context.
//!
//! The clock's callbacks do not reach into the rest of the studio. They post
//! [`StepEvent`]s to a channel that [`Studio::poll`] drains right after
//! polling the clock, so every trigger happens in a plain method call.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, info};

use crate::config::StudioConfig;
use crate::context::{AudioBackend, AudioContext};
use crate::dsp::mixer::{ui_pan_to_pan, volume_to_gain};
use crate::dsp::sampler::SampleBuffer;
use crate::error::{Result, StudioError};
use crate::graph::{GraphCommand, MeterLevels};
use crate::pattern::{StepPattern, NOTE_ROWS};
use crate::percussion::{DrumKit, SoundParams, TRACK_COUNT};
use crate::persistence::{self, Storage};
use crate::rhythm::{self, RhythmStyle};
use crate::store::{SessionData, SessionStore, StoreListener};
use crate::synth::{
    note_frequency, NoteSynth, SynthParams, VoiceId, KEYBOARD_NOTE_SECS, PREVIEW_NOTE_SECS,
    SEQUENCED_NOTE_SECS,
};
use crate::transport::{StepCallback, SubscriptionId, TransportClock, TransportState};

/// A step the clock asked to be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    Drum(usize),
    Notes(usize),
}

pub struct Studio {
    config: StudioConfig,
    context: AudioContext,
    transport: TransportClock,
    store: SessionStore,
    kit: DrumKit,
    synth: NoteSynth,
    steps: Receiver<StepEvent>,
    rng: fastrand::Rng,
}

impl Studio {
    /// A studio with a fresh session whose master level comes from `config`.
    pub fn new(config: StudioConfig) -> Self {
        let session = session_defaults(&config);
        Studio::with_rng(config, session, fastrand::Rng::new())
    }

    /// Build a studio around existing session data and a given noise source.
    pub fn with_rng(config: StudioConfig, session: SessionData, mut rng: fastrand::Rng) -> Self {
        let (tx, steps) = unbounded();
        let mut transport = TransportClock::new();

        let drum_tx = tx.clone();
        transport.set_drum_callback(Box::new(move |step| {
            drum_tx.send(StepEvent::Drum(step))?;
            Ok(())
        }));
        transport.subscribe(Box::new(move |state| {
            tx.send(StepEvent::Notes(state.current_step))?;
            Ok(())
        }));

        let kit = DrumKit::new(config.sample_rate, rng.fork());
        Studio {
            context: AudioContext::new(config.clone()),
            config,
            transport,
            store: SessionStore::new(session),
            kit,
            synth: NoteSynth::new(),
            steps,
            rng,
        }
    }

    /// Start audio on `backend`. Must follow a user gesture in a browser.
    ///
    /// Pushes the current mix to the graph and renders every drum buffer.
    pub fn initialize(&mut self, backend: &mut dyn AudioBackend) -> Result<()> {
        if self.context.is_ready() {
            return Ok(());
        }
        self.context.initialize(backend)?;
        self.kit.set_sample_rate(self.context.sample_rate());
        self.kit.regenerate_all(self.store.sound_params());
        self.push_mix();
        info!("studio ready");
        Ok(())
    }

    pub fn is_audio_ready(&self) -> bool {
        self.context.is_ready()
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn session(&self) -> &SessionData {
        self.store.data()
    }

    /// Listen to every store mutation.
    pub fn on_change(&mut self, listener: StoreListener) {
        self.store.subscribe(listener);
    }

    fn push_mix(&self) {
        let data = self.store.data();
        for track in 0..TRACK_COUNT {
            self.context.send(GraphCommand::SetTrackGain {
                track,
                gain: volume_to_gain(data.track_volumes[track]),
            });
            self.context.send(GraphCommand::SetTrackPan {
                track,
                pan: ui_pan_to_pan(data.track_pans[track]),
            });
        }
        self.context.send(GraphCommand::SetSynthGain(
            data.synth_params.bus_gain(self.config.synth_bus_scale),
        ));
        self.context.send(GraphCommand::SetSynthPan(ui_pan_to_pan(data.synth_pan)));
        self.context.send(GraphCommand::SetMasterGain(volume_to_gain(data.master_volume)));
    }

    // Transport

    /// Drive the clock. Call from the host's redraw or timer loop.
    pub fn poll(&mut self, now_ms: f64) -> Option<usize> {
        let step = self.transport.poll(now_ms);
        while let Ok(event) = self.steps.try_recv() {
            match event {
                StepEvent::Drum(step) => self.trigger_drums(step),
                StepEvent::Notes(step) => self.trigger_notes(step),
            }
        }
        self.synth.collect_expired(self.context.current_time());
        step
    }

    pub fn play(&mut self, now_ms: f64) {
        self.transport.play(now_ms);
    }

    /// Stop, rewind, and fade out any sounding notes.
    pub fn stop(&mut self) {
        if self.transport.is_playing() {
            self.transport.stop();
            self.synth.stop_all_sounds(&self.context);
        }
    }

    pub fn set_bpm(&mut self, bpm: u32) -> u32 {
        self.transport.set_bpm(bpm)
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Step-advance notifications, e.g. for a UI playhead.
    pub fn subscribe_steps(&mut self, callback: StepCallback) -> SubscriptionId {
        self.transport.subscribe(callback)
    }

    pub fn unsubscribe_steps(&mut self, id: SubscriptionId) -> bool {
        self.transport.unsubscribe(id)
    }

    fn trigger_drums(&mut self, step: usize) {
        if !self.context.is_ready() {
            return;
        }
        let at = self.context.current_time();
        for track in self.store.drum_pattern().active_rows(step) {
            if let Some(buffer) = self.kit.buffer(track) {
                self.context.send(GraphCommand::PlayBuffer { track, buffer, at });
            }
        }
    }

    fn trigger_notes(&mut self, step: usize) {
        let octave = self.store.octave();
        for note in self.store.note_pattern().active_rows(step) {
            if let Some(freq) = note_frequency(note, octave) {
                self.synth
                    .play_note(&self.context, self.store.synth_params(), freq, SEQUENCED_NOTE_SECS);
            }
        }
    }

    // Patterns

    pub fn drum_pattern(&self) -> &StepPattern {
        self.store.drum_pattern()
    }

    pub fn note_pattern(&self) -> &StepPattern {
        self.store.note_pattern()
    }

    pub fn toggle_drum_step(&mut self, track: usize, step: usize) -> Result<bool> {
        self.store.toggle_drum_step(track, step)
    }

    /// Toggle a note cell; turning one on previews the note.
    pub fn toggle_note_step(&mut self, note: usize, step: usize) -> Result<bool> {
        let on = self.store.toggle_note_step(note, step)?;
        if on {
            self.play_note_for(note, PREVIEW_NOTE_SECS);
        }
        Ok(on)
    }

    pub fn set_drum_pattern(&mut self, pattern: StepPattern) -> Result<()> {
        self.store.set_drum_pattern(pattern)
    }

    pub fn set_note_pattern(&mut self, pattern: StepPattern) -> Result<()> {
        self.store.set_note_pattern(pattern)
    }

    /// Replace the drum grid from a free-text style request.
    pub fn generate_pattern(&mut self, description: &str) -> Result<Option<RhythmStyle>> {
        let (style, pattern) = rhythm::generate(description, &mut self.rng);
        self.store.set_drum_pattern(pattern)?;
        debug!(style = style.map(RhythmStyle::name), "generated drum pattern");
        Ok(style)
    }

    pub fn randomize_drums(&mut self) -> Result<()> {
        let pattern = rhythm::random_pattern(&mut self.rng);
        self.store.set_drum_pattern(pattern)
    }

    pub fn clear_drum_pattern(&mut self) {
        self.store.clear_drum_pattern();
    }

    /// Clear the note grid and fade out anything still sounding.
    pub fn clear_note_pattern(&mut self) {
        self.store.clear_note_pattern();
        self.synth.stop_all_sounds(&self.context);
    }

    // Sound design and mix

    /// Change one drum track's sound and re-render just that track.
    pub fn set_sound_params(&mut self, track: usize, params: SoundParams) -> Result<()> {
        self.store.set_sound_params(track, params)?;
        if self.context.is_ready() {
            self.kit.regenerate_track(track, self.store.sound_params())?;
        }
        Ok(())
    }

    pub fn drum_buffer(&self, track: usize) -> Option<Arc<SampleBuffer>> {
        self.kit.buffer(track)
    }

    /// Takes effect on the next note; sounding notes keep their patch.
    pub fn set_synth_params(&mut self, params: SynthParams) {
        let gain = params.bus_gain(self.config.synth_bus_scale);
        self.store.set_synth_params(params);
        self.context.send(GraphCommand::SetSynthGain(gain));
    }

    pub fn set_track_volume(&mut self, track: usize, volume: u8) -> Result<u8> {
        let volume = self.store.set_track_volume(track, volume)?;
        self.context.send(GraphCommand::SetTrackGain {
            track,
            gain: volume_to_gain(volume),
        });
        Ok(volume)
    }

    pub fn set_track_pan(&mut self, track: usize, pan: i8) -> Result<i8> {
        let pan = self.store.set_track_pan(track, pan)?;
        self.context.send(GraphCommand::SetTrackPan {
            track,
            pan: ui_pan_to_pan(pan),
        });
        Ok(pan)
    }

    pub fn set_master_volume(&mut self, volume: u8) -> u8 {
        let volume = self.store.set_master_volume(volume);
        self.context.send(GraphCommand::SetMasterGain(volume_to_gain(volume)));
        volume
    }

    pub fn set_synth_volume(&mut self, volume: u8) -> u8 {
        let mut params = self.store.synth_params().clone();
        params.volume = volume.min(100);
        let volume = params.volume;
        self.set_synth_params(params);
        volume
    }

    pub fn set_synth_pan(&mut self, pan: i8) -> i8 {
        let pan = self.store.set_synth_pan(pan);
        self.context.send(GraphCommand::SetSynthPan(ui_pan_to_pan(pan)));
        pan
    }

    pub fn set_octave(&mut self, octave: u8) -> u8 {
        self.store.set_octave(octave)
    }

    // Live triggering

    /// Audition a drum track now.
    pub fn play_sound(&mut self, track: usize) -> Result<()> {
        if track >= TRACK_COUNT {
            return Err(StudioError::TrackOutOfRange {
                index: track,
                len: TRACK_COUNT,
            });
        }
        if let Some(buffer) = self.kit.buffer(track) {
            let at = self.context.current_time();
            self.context.send(GraphCommand::PlayBuffer { track, buffer, at });
        }
        Ok(())
    }

    /// Play a keyboard key (pitch class 0-11) in the current octave.
    pub fn play_key(&mut self, note: usize) -> Result<Option<VoiceId>> {
        if note_frequency(note, self.store.octave()).is_none() {
            return Err(StudioError::NoteOutOfRange {
                index: note,
                len: NOTE_ROWS,
            });
        }
        Ok(self.play_note_for(note, KEYBOARD_NOTE_SECS))
    }

    /// Play an arbitrary frequency with the current patch.
    pub fn play_note(&mut self, frequency: f64, duration: f64) -> Option<VoiceId> {
        self.synth
            .play_note(&self.context, self.store.synth_params(), frequency, duration)
    }

    fn play_note_for(&mut self, note: usize, duration: f64) -> Option<VoiceId> {
        let freq = note_frequency(note, self.store.octave())?;
        self.play_note(freq, duration)
    }

    pub fn stop_all_sounds(&mut self) {
        self.synth.stop_all_sounds(&self.context);
    }

    pub fn active_voice_count(&self) -> usize {
        self.synth.active_voices().len()
    }

    pub fn meter_levels(&self) -> MeterLevels {
        self.context.meter_levels()
    }

    // Persistence

    pub fn save_to(&self, storage: &mut dyn Storage) -> Result<()> {
        persistence::save_session(storage, self.store.data())
    }

    /// Replace the session from storage. Never fails; bad entries keep
    /// their defaults, with the master level taken from the config.
    pub fn load_from(&mut self, storage: &dyn Storage) {
        let data = persistence::load_session(storage, session_defaults(&self.config));
        self.store.replace(data);
        if self.context.is_ready() {
            self.kit.regenerate_all(self.store.sound_params());
            self.push_mix();
        }
    }
}

fn session_defaults(config: &StudioConfig) -> SessionData {
    SessionData {
        master_volume: config.master_volume,
        ..SessionData::default()
    }
}
