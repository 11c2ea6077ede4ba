//! In-memory session state with change notification.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::pattern::StepPattern;
use crate::percussion::{default_sound_params, SoundParams, TRACK_COUNT};
use crate::synth::{SynthParams, DEFAULT_OCTAVE, MAX_OCTAVE, MIN_OCTAVE};

pub const DEFAULT_TRACK_VOLUMES: [u8; TRACK_COUNT] = [80, 75, 60, 50, 70, 65, 65, 70];
/// UI pan units, -50..=50.
pub const DEFAULT_TRACK_PANS: [i8; TRACK_COUNT] = [0, 0, -20, 20, 0, -30, 30, 0];
pub const DEFAULT_MASTER_VOLUME: u8 = 85;

/// What changed in a [`SessionStore`] mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    DrumPattern,
    NotePattern,
    TrackVolume { track: usize, volume: u8 },
    TrackPan { track: usize, pan: i8 },
    MasterVolume(u8),
    SoundParams { track: usize },
    SynthParams,
    SynthPan(i8),
    Octave(u8),
    /// Everything was replaced at once (session load).
    Reloaded,
}

pub type StoreListener = Box<dyn FnMut(&StoreChange)>;

/// The persisted part of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub drum_pattern: StepPattern,
    pub note_pattern: StepPattern,
    pub track_volumes: [u8; TRACK_COUNT],
    pub track_pans: [i8; TRACK_COUNT],
    pub master_volume: u8,
    pub sound_params: [SoundParams; TRACK_COUNT],
    pub synth_params: SynthParams,
    pub synth_pan: i8,
    pub octave: u8,
}

impl Default for SessionData {
    fn default() -> Self {
        SessionData {
            drum_pattern: StepPattern::drums(),
            note_pattern: StepPattern::notes(),
            track_volumes: DEFAULT_TRACK_VOLUMES,
            track_pans: DEFAULT_TRACK_PANS,
            master_volume: DEFAULT_MASTER_VOLUME,
            sound_params: default_sound_params(),
            synth_params: SynthParams::default(),
            synth_pan: 0,
            octave: DEFAULT_OCTAVE,
        }
    }
}

fn check_track(track: usize) -> Result<()> {
    if track >= TRACK_COUNT {
        return Err(StudioError::TrackOutOfRange {
            index: track,
            len: TRACK_COUNT,
        });
    }
    Ok(())
}

/// Last-writer-wins state store. Listeners hear about every mutation in
/// registration order.
#[derive(Default)]
pub struct SessionStore {
    data: SessionData,
    listeners: Vec<StoreListener>,
}

impl SessionStore {
    pub fn new(data: SessionData) -> Self {
        SessionStore {
            data,
            listeners: Vec::new(),
        }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn subscribe(&mut self, listener: StoreListener) {
        self.listeners.push(listener);
    }

    fn notify(&mut self, change: StoreChange) {
        for listener in self.listeners.iter_mut() {
            listener(&change);
        }
    }

    pub fn drum_pattern(&self) -> &StepPattern {
        &self.data.drum_pattern
    }

    pub fn note_pattern(&self) -> &StepPattern {
        &self.data.note_pattern
    }

    pub fn toggle_drum_step(&mut self, track: usize, step: usize) -> Result<bool> {
        let on = self.data.drum_pattern.toggle(track, step)?;
        self.notify(StoreChange::DrumPattern);
        Ok(on)
    }

    pub fn toggle_note_step(&mut self, note: usize, step: usize) -> Result<bool> {
        let on = self.data.note_pattern.toggle(note, step)?;
        self.notify(StoreChange::NotePattern);
        Ok(on)
    }

    pub fn set_drum_pattern(&mut self, pattern: StepPattern) -> Result<()> {
        self.data.drum_pattern.replace(pattern)?;
        self.notify(StoreChange::DrumPattern);
        Ok(())
    }

    pub fn set_note_pattern(&mut self, pattern: StepPattern) -> Result<()> {
        self.data.note_pattern.replace(pattern)?;
        self.notify(StoreChange::NotePattern);
        Ok(())
    }

    pub fn clear_drum_pattern(&mut self) {
        self.data.drum_pattern.clear();
        self.notify(StoreChange::DrumPattern);
    }

    pub fn clear_note_pattern(&mut self) {
        self.data.note_pattern.clear();
        self.notify(StoreChange::NotePattern);
    }

    pub fn track_volume(&self, track: usize) -> Option<u8> {
        self.data.track_volumes.get(track).copied()
    }

    /// Volume is clamped to 0..=100.
    pub fn set_track_volume(&mut self, track: usize, volume: u8) -> Result<u8> {
        check_track(track)?;
        let volume = volume.min(100);
        self.data.track_volumes[track] = volume;
        self.notify(StoreChange::TrackVolume { track, volume });
        Ok(volume)
    }

    pub fn track_pan(&self, track: usize) -> Option<i8> {
        self.data.track_pans.get(track).copied()
    }

    /// Pan is clamped to -50..=50.
    pub fn set_track_pan(&mut self, track: usize, pan: i8) -> Result<i8> {
        check_track(track)?;
        let pan = pan.clamp(-50, 50);
        self.data.track_pans[track] = pan;
        self.notify(StoreChange::TrackPan { track, pan });
        Ok(pan)
    }

    pub fn master_volume(&self) -> u8 {
        self.data.master_volume
    }

    pub fn set_master_volume(&mut self, volume: u8) -> u8 {
        let volume = volume.min(100);
        self.data.master_volume = volume;
        self.notify(StoreChange::MasterVolume(volume));
        volume
    }

    pub fn sound_params(&self) -> &[SoundParams; TRACK_COUNT] {
        &self.data.sound_params
    }

    /// Rejects out-of-range controls without touching the stored sound.
    pub fn set_sound_params(&mut self, track: usize, params: SoundParams) -> Result<()> {
        check_track(track)?;
        params.validate()?;
        self.data.sound_params[track] = params;
        self.notify(StoreChange::SoundParams { track });
        Ok(())
    }

    pub fn synth_params(&self) -> &SynthParams {
        &self.data.synth_params
    }

    pub fn set_synth_params(&mut self, params: SynthParams) {
        self.data.synth_params = params;
        self.notify(StoreChange::SynthParams);
    }

    pub fn synth_pan(&self) -> i8 {
        self.data.synth_pan
    }

    pub fn set_synth_pan(&mut self, pan: i8) -> i8 {
        let pan = pan.clamp(-50, 50);
        self.data.synth_pan = pan;
        self.notify(StoreChange::SynthPan(pan));
        pan
    }

    pub fn octave(&self) -> u8 {
        self.data.octave
    }

    /// Octave is clamped to the selectable range.
    pub fn set_octave(&mut self, octave: u8) -> u8 {
        let octave = octave.clamp(MIN_OCTAVE, MAX_OCTAVE);
        self.data.octave = octave;
        self.notify(StoreChange::Octave(octave));
        octave
    }

    /// Replace everything, e.g. after loading a session.
    pub fn replace(&mut self, data: SessionData) {
        self.data = data;
        self.notify(StoreChange::Reloaded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_store() -> (SessionStore, Rc<RefCell<Vec<StoreChange>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut store = SessionStore::default();
        let l = Rc::clone(&log);
        store.subscribe(Box::new(move |c| l.borrow_mut().push(c.clone())));
        (store, log)
    }

    #[test]
    fn defaults() {
        let store = SessionStore::default();
        assert_eq!(store.track_volume(0), Some(80));
        assert_eq!(store.track_pan(5), Some(-30));
        assert_eq!(store.master_volume(), 85);
        assert_eq!(store.octave(), 3);
        assert_eq!(store.drum_pattern().row_count(), 8);
        assert_eq!(store.note_pattern().row_count(), 12);
        assert_eq!(store.sound_params()[4].decay, 2.0);
    }

    #[test]
    fn mutations_notify_in_order() {
        let (mut store, log) = recording_store();
        store.toggle_drum_step(0, 0).unwrap();
        store.set_track_volume(2, 150).unwrap();
        store.set_octave(9);
        assert_eq!(
            *log.borrow(),
            vec![
                StoreChange::DrumPattern,
                StoreChange::TrackVolume { track: 2, volume: 100 },
                StoreChange::Octave(5),
            ]
        );
    }

    #[test]
    fn failed_mutations_do_not_notify() {
        let (mut store, log) = recording_store();
        assert!(store.toggle_note_step(12, 0).is_err());
        assert!(store.set_track_pan(8, 0).is_err());
        assert!(store.set_drum_pattern(StepPattern::notes()).is_err());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn out_of_range_sound_is_rejected_and_kept() {
        let (mut store, log) = recording_store();
        let before = store.sound_params()[0];
        let huge = SoundParams { decay: 1.0e9, ..before };
        assert!(matches!(
            store.set_sound_params(0, huge),
            Err(StudioError::SoundParamOutOfRange { name: "decay", .. })
        ));
        assert_eq!(store.sound_params()[0], before);
        assert!(log.borrow().is_empty());

        let longer = SoundParams { decay: 3.0, ..before };
        store.set_sound_params(0, longer).unwrap();
        assert_eq!(store.sound_params()[0].decay, 3.0);
    }

    #[test]
    fn clamps_pans_and_octave() {
        let mut store = SessionStore::default();
        assert_eq!(store.set_track_pan(0, -90).unwrap(), -50);
        assert_eq!(store.set_synth_pan(77), 50);
        assert_eq!(store.set_octave(0), 2);
    }

    #[test]
    fn session_json_round_trip_keeps_shape() {
        let mut data = SessionData::default();
        data.drum_pattern.set(1, 4, true).unwrap();
        data.octave = 4;
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"trackVolumes\":[80,75,60,50,70,65,65,70]"), "{json}");
        let back: SessionData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }
}
