pub mod config;
pub mod context;
pub mod dsp;
pub mod error;
pub mod graph;
#[cfg(feature = "native")]
pub mod native;
pub mod pattern;
pub mod percussion;
pub mod persistence;
pub mod renderer;
pub mod rhythm;
pub mod store;
pub mod studio;
pub mod synth;
pub mod transport;

use std::collections::HashMap;
use std::fmt::Display;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::StudioConfig;
use crate::context::ManualBackend;
use crate::dsp::analyser::MeterZone;
use crate::percussion::SoundParams;
use crate::persistence::{MemoryStorage, Storage, StorageKey};
use crate::studio::Studio;
use crate::synth::SynthParams;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the groovebox-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: colour zone for a meter level ("normal", "hot" or "clip").
#[wasm_bindgen(js_name = meterZone)]
pub fn meter_zone(level: f64) -> String {
    MeterZone::classify(level).as_str().to_string()
}

fn js_err(err: impl Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Maps become plain objects rather than `Map`s.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(js_err)
}

/// A studio driven from JavaScript.
///
/// The page calls `initialize` from a user gesture, then pulls audio with
/// `render` from its worklet and calls `poll` from `requestAnimationFrame`.
#[wasm_bindgen]
pub struct WasmStudio {
    studio: Studio,
    backend: ManualBackend,
}

#[wasm_bindgen]
impl WasmStudio {
    /// Create a studio; `config_json` overrides engine settings.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<WasmStudio, JsValue> {
        let config = match config_json {
            Some(json) => StudioConfig::from_json(&json).map_err(js_err)?,
            None => StudioConfig::default(),
        };
        let backend = ManualBackend::new(config.sample_rate);
        Ok(WasmStudio {
            studio: Studio::new(config),
            backend,
        })
    }

    /// Start audio at the page's `AudioContext.sampleRate`.
    pub fn initialize(&mut self, sample_rate: u32) -> Result<(), JsValue> {
        if !self.studio.is_audio_ready() {
            self.backend = ManualBackend::new(sample_rate);
        }
        self.studio.initialize(&mut self.backend).map_err(js_err)
    }

    #[wasm_bindgen(getter, js_name = isAudioReady)]
    pub fn is_audio_ready(&self) -> bool {
        self.studio.is_audio_ready()
    }

    /// Fill an interleaved stereo block. Silent until initialized.
    pub fn render(&mut self, out: &mut [f32]) -> bool {
        self.backend.render(out)
    }

    /// Advance the step clock; returns the new step if it moved.
    pub fn poll(&mut self, now_ms: f64) -> Option<u32> {
        self.studio.poll(now_ms).map(|s| s as u32)
    }

    pub fn play(&mut self, now_ms: f64) {
        self.studio.play(now_ms);
    }

    pub fn stop(&mut self) {
        self.studio.stop();
    }

    #[wasm_bindgen(js_name = setBpm)]
    pub fn set_bpm(&mut self, bpm: u32) -> u32 {
        self.studio.set_bpm(bpm)
    }

    #[wasm_bindgen(getter)]
    pub fn transport(&self) -> Result<JsValue, JsValue> {
        to_js(&self.studio.transport_state())
    }

    #[wasm_bindgen(getter)]
    pub fn session(&self) -> Result<JsValue, JsValue> {
        to_js(self.studio.session())
    }

    #[wasm_bindgen(getter)]
    pub fn meters(&self) -> Result<JsValue, JsValue> {
        to_js(&self.studio.meter_levels())
    }

    #[wasm_bindgen(js_name = toggleDrumStep)]
    pub fn toggle_drum_step(&mut self, track: usize, step: usize) -> Result<bool, JsValue> {
        self.studio.toggle_drum_step(track, step).map_err(js_err)
    }

    #[wasm_bindgen(js_name = toggleNoteStep)]
    pub fn toggle_note_step(&mut self, note: usize, step: usize) -> Result<bool, JsValue> {
        self.studio.toggle_note_step(note, step).map_err(js_err)
    }

    /// Returns the matched style name, or nothing for a random groove.
    #[wasm_bindgen(js_name = generatePattern)]
    pub fn generate_pattern(&mut self, description: &str) -> Result<Option<String>, JsValue> {
        let style = self.studio.generate_pattern(description).map_err(js_err)?;
        Ok(style.map(|s| s.name().to_string()))
    }

    #[wasm_bindgen(js_name = randomizeDrums)]
    pub fn randomize_drums(&mut self) -> Result<(), JsValue> {
        self.studio.randomize_drums().map_err(js_err)
    }

    #[wasm_bindgen(js_name = clearDrumPattern)]
    pub fn clear_drum_pattern(&mut self) {
        self.studio.clear_drum_pattern();
    }

    #[wasm_bindgen(js_name = clearNotePattern)]
    pub fn clear_note_pattern(&mut self) {
        self.studio.clear_note_pattern();
    }

    #[wasm_bindgen(js_name = setSoundParams)]
    pub fn set_sound_params(&mut self, track: usize, params: JsValue) -> Result<(), JsValue> {
        let params: SoundParams = serde_wasm_bindgen::from_value(params).map_err(js_err)?;
        self.studio.set_sound_params(track, params).map_err(js_err)
    }

    #[wasm_bindgen(js_name = setSynthParams)]
    pub fn set_synth_params(&mut self, params: JsValue) -> Result<(), JsValue> {
        let params: SynthParams = serde_wasm_bindgen::from_value(params).map_err(js_err)?;
        self.studio.set_synth_params(params);
        Ok(())
    }

    #[wasm_bindgen(js_name = setTrackVolume)]
    pub fn set_track_volume(&mut self, track: usize, volume: u8) -> Result<u8, JsValue> {
        self.studio.set_track_volume(track, volume).map_err(js_err)
    }

    #[wasm_bindgen(js_name = setTrackPan)]
    pub fn set_track_pan(&mut self, track: usize, pan: i8) -> Result<i8, JsValue> {
        self.studio.set_track_pan(track, pan).map_err(js_err)
    }

    #[wasm_bindgen(js_name = setMasterVolume)]
    pub fn set_master_volume(&mut self, volume: u8) -> u8 {
        self.studio.set_master_volume(volume)
    }

    #[wasm_bindgen(js_name = setSynthVolume)]
    pub fn set_synth_volume(&mut self, volume: u8) -> u8 {
        self.studio.set_synth_volume(volume)
    }

    #[wasm_bindgen(js_name = setSynthPan)]
    pub fn set_synth_pan(&mut self, pan: i8) -> i8 {
        self.studio.set_synth_pan(pan)
    }

    #[wasm_bindgen(js_name = setOctave)]
    pub fn set_octave(&mut self, octave: u8) -> u8 {
        self.studio.set_octave(octave)
    }

    #[wasm_bindgen(js_name = playSound)]
    pub fn play_sound(&mut self, track: usize) -> Result<(), JsValue> {
        self.studio.play_sound(track).map_err(js_err)
    }

    #[wasm_bindgen(js_name = playKey)]
    pub fn play_key(&mut self, note: usize) -> Result<bool, JsValue> {
        Ok(self.studio.play_key(note).map_err(js_err)?.is_some())
    }

    #[wasm_bindgen(js_name = stopAllSounds)]
    pub fn stop_all_sounds(&mut self) {
        self.studio.stop_all_sounds();
    }

    /// Session as `{ storageKey: json }`, ready for `localStorage`.
    #[wasm_bindgen(js_name = exportSession)]
    pub fn export_session(&self) -> Result<JsValue, JsValue> {
        let mut storage = MemoryStorage::new();
        self.studio.save_to(&mut storage).map_err(js_err)?;
        let mut entries = HashMap::new();
        for key in StorageKey::ALL {
            if let Some(value) = storage.get(key.as_str()).map_err(js_err)? {
                entries.insert(key.as_str(), value);
            }
        }
        to_js(&entries)
    }

    /// Load a `{ storageKey: json }` map; bad entries keep their defaults.
    #[wasm_bindgen(js_name = importSession)]
    pub fn import_session(&mut self, entries: JsValue) -> Result<(), JsValue> {
        let entries: HashMap<String, String> =
            serde_wasm_bindgen::from_value(entries).map_err(js_err)?;
        let mut storage = MemoryStorage::new();
        for (key, value) in &entries {
            storage.set(key, value).map_err(js_err)?;
        }
        self.studio.load_from(&storage);
        Ok(())
    }
}
