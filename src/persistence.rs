//! Session persistence over a key-value store.
//!
//! Each piece of session state lives under its own key as a JSON document.
//! Loading never fails: a missing key silently keeps the default, while an
//! unreadable, unparsable or invalid entry logs a warning and keeps the
//! default too.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pattern::{StepPattern, NOTE_ROWS};
use crate::percussion::{SoundParams, TRACK_COUNT};
use crate::store::SessionData;
use crate::synth::{SynthParams, MAX_OCTAVE, MIN_OCTAVE};

/// A string key-value store (browser local storage, a directory, memory).
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Keys under which session state is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    DrumPattern,
    TrackVolumes,
    TrackPans,
    MasterVolume,
    SoundParams,
    SynthParams,
    SynthPan,
    NotePattern,
    Octave,
}

impl StorageKey {
    pub const ALL: [StorageKey; 9] = [
        StorageKey::DrumPattern,
        StorageKey::TrackVolumes,
        StorageKey::TrackPans,
        StorageKey::MasterVolume,
        StorageKey::SoundParams,
        StorageKey::SynthParams,
        StorageKey::SynthPan,
        StorageKey::NotePattern,
        StorageKey::Octave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::DrumPattern => "drumPattern",
            StorageKey::TrackVolumes => "trackVolumes",
            StorageKey::TrackPans => "trackPans",
            StorageKey::MasterVolume => "masterVolume",
            StorageKey::SoundParams => "soundParams",
            StorageKey::SynthParams => "ms20_params",
            StorageKey::SynthPan => "ms20_pan",
            StorageKey::NotePattern => "ms20_pattern",
            StorageKey::Octave => "ms20_octave",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStorage { dir: dir.into() }
    }

    /// Per-user data directory for the application.
    #[cfg(feature = "native")]
    pub fn default_location() -> Option<FileStorage> {
        directories::ProjectDirs::from("", "", "groovebox")
            .map(|dirs| FileStorage::new(dirs.data_dir().join("session")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }
}

/// Read and validate one entry; `None` means "keep the default".
fn load_entry<T, F>(storage: &dyn Storage, key: StorageKey, valid: F) -> Option<T>
where
    T: DeserializeOwned,
    F: FnOnce(&T) -> bool,
{
    let text = match storage.get(key.as_str()) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(err) => {
            warn!(key = key.as_str(), "could not read stored value: {err}");
            return None;
        }
    };
    match serde_json::from_str::<T>(&text) {
        Ok(value) if valid(&value) => Some(value),
        Ok(_) => {
            warn!(key = key.as_str(), "stored value failed validation, using default");
            None
        }
        Err(err) => {
            warn!(key = key.as_str(), "stored value is not valid JSON: {err}");
            None
        }
    }
}

/// Load a session over `base`, falling back to its values entry by entry.
pub fn load_session(storage: &dyn Storage, base: SessionData) -> SessionData {
    let mut data = base;

    if let Some(p) = load_entry::<StepPattern, _>(storage, StorageKey::DrumPattern, |p| {
        p.row_count() == TRACK_COUNT
    }) {
        data.drum_pattern = p;
    }
    if let Some(p) = load_entry::<StepPattern, _>(storage, StorageKey::NotePattern, |p| {
        p.row_count() == NOTE_ROWS
    }) {
        data.note_pattern = p;
    }
    if let Some(v) = load_entry::<[u8; TRACK_COUNT], _>(storage, StorageKey::TrackVolumes, |v| {
        v.iter().all(|&x| x <= 100)
    }) {
        data.track_volumes = v;
    }
    if let Some(v) = load_entry::<[i8; TRACK_COUNT], _>(storage, StorageKey::TrackPans, |v| {
        v.iter().all(|x| (-50..=50).contains(x))
    }) {
        data.track_pans = v;
    }
    if let Some(v) = load_entry::<u8, _>(storage, StorageKey::MasterVolume, |&v| v <= 100) {
        data.master_volume = v;
    }
    if let Some(v) = load_entry::<[SoundParams; TRACK_COUNT], _>(storage, StorageKey::SoundParams, |v| {
        v.iter().all(|p| p.validate().is_ok())
    }) {
        data.sound_params = v;
    }
    if let Some(v) = load_entry::<SynthParams, _>(storage, StorageKey::SynthParams, |p| {
        p.filter_cutoff.is_finite() && p.filter_cutoff > 0.0 && (0.0..=1.0).contains(&p.env_sustain)
    }) {
        data.synth_params = v;
    }
    if let Some(v) = load_entry::<i8, _>(storage, StorageKey::SynthPan, |v| (-50..=50).contains(v)) {
        data.synth_pan = v;
    }
    if let Some(v) = load_entry::<u8, _>(storage, StorageKey::Octave, |v| {
        (MIN_OCTAVE..=MAX_OCTAVE).contains(v)
    }) {
        data.octave = v;
    }

    debug!("session loaded");
    data
}

fn save_entry<T: Serialize>(storage: &mut dyn Storage, key: StorageKey, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    storage.set(key.as_str(), &json)
}

/// Write every entry of a session.
pub fn save_session(storage: &mut dyn Storage, data: &SessionData) -> Result<()> {
    save_entry(storage, StorageKey::DrumPattern, &data.drum_pattern)?;
    save_entry(storage, StorageKey::TrackVolumes, &data.track_volumes)?;
    save_entry(storage, StorageKey::TrackPans, &data.track_pans)?;
    save_entry(storage, StorageKey::MasterVolume, &data.master_volume)?;
    save_entry(storage, StorageKey::SoundParams, &data.sound_params)?;
    save_entry(storage, StorageKey::SynthParams, &data.synth_params)?;
    save_entry(storage, StorageKey::SynthPan, &data.synth_pan)?;
    save_entry(storage, StorageKey::NotePattern, &data.note_pattern)?;
    save_entry(storage, StorageKey::Octave, &data.octave)?;
    debug!("session saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::percussion::default_sound_params;
    use crate::rhythm::RhythmStyle;

    #[test]
    fn empty_storage_gives_defaults() {
        let storage = MemoryStorage::new();
        assert_eq!(load_session(&storage, SessionData::default()), SessionData::default());
    }

    #[test]
    fn save_then_load_restores_session() {
        let mut data = SessionData::default();
        data.drum_pattern = RhythmStyle::Funk.pattern();
        data.note_pattern.set(9, 3, true).unwrap();
        data.track_volumes[3] = 12;
        data.octave = 5;
        data.synth_params.osc_mix = 80.0;

        let mut storage = MemoryStorage::new();
        save_session(&mut storage, &data).unwrap();
        assert!(storage.get("ms20_octave").unwrap().is_some());
        assert_eq!(load_session(&storage, SessionData::default()), data);
    }

    #[test]
    fn corrupt_entries_fall_back_individually() {
        let mut storage = MemoryStorage::new();
        storage.set("drumPattern", "{not json").unwrap();
        storage.set("ms20_octave", "9").unwrap();
        storage.set("ms20_pattern", "[[true]]").unwrap();
        storage.set("trackVolumes", "[1,2,3,4,5,6,7,8]").unwrap();

        let data = load_session(&storage, SessionData::default());
        assert_eq!(data.drum_pattern, StepPattern::drums());
        assert_eq!(data.octave, 3);
        assert_eq!(data.note_pattern, StepPattern::notes());
        assert_eq!(data.track_volumes, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn out_of_range_sounds_fall_back() {
        let mut sounds = default_sound_params();
        sounds[3].decay = 1.0e9;
        let mut storage = MemoryStorage::new();
        storage.set("soundParams", &serde_json::to_string(&sounds).unwrap()).unwrap();
        assert_eq!(load_session(&storage, SessionData::default()).sound_params, default_sound_params());

        sounds[3].decay = 2.5;
        storage.set("soundParams", &serde_json::to_string(&sounds).unwrap()).unwrap();
        assert_eq!(load_session(&storage, SessionData::default()).sound_params[3].decay, 2.5);
    }

    #[test]
    fn missing_entries_keep_the_base() {
        let mut storage = MemoryStorage::new();
        storage.set("ms20_octave", "5").unwrap();
        let base = SessionData {
            master_volume: 20,
            ..SessionData::default()
        };
        let data = load_session(&storage, base);
        assert_eq!(data.master_volume, 20);
        assert_eq!(data.octave, 5);
    }

    #[test]
    fn wrong_row_count_is_rejected() {
        let mut storage = MemoryStorage::new();
        let twelve = serde_json::to_string(&StepPattern::notes()).unwrap();
        storage.set("drumPattern", &twelve).unwrap();
        assert_eq!(load_session(&storage, SessionData::default()).drum_pattern.row_count(), 8);
    }

    #[test]
    fn file_storage_round_trip() {
        let dir = std::env::temp_dir().join(format!("groovebox-test-{}", std::process::id()));
        let mut storage = FileStorage::new(&dir);
        assert_eq!(storage.get("masterVolume").unwrap(), None);

        let mut data = SessionData::default();
        data.master_volume = 40;
        save_session(&mut storage, &data).unwrap();
        assert!(dir.join("masterVolume.json").exists());
        assert_eq!(load_session(&storage, SessionData::default()).master_volume, 40);

        let _ = fs::remove_dir_all(&dir);
    }
}
