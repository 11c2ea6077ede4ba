//! Engine configuration.
//!
//! Every field has a default, so a partial JSON document (or `{}`) is a
//! valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// Top-level workstation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudioConfig {
    /// Sample rate used by backends that do not dictate their own.
    pub sample_rate: u32,
    /// Frames rendered per pull by the offline renderer.
    pub block_size: usize,
    /// Master volume (0-100) of a fresh session; a saved level overrides it.
    pub master_volume: u8,
    /// Synth bus gain = volume / 100 * this.
    pub synth_bus_scale: f64,
    /// Capacity of the control -> render command queue.
    pub command_capacity: usize,
    pub meter: MeterConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        StudioConfig {
            sample_rate: 44100,
            block_size: 128,
            master_volume: 85,
            synth_bus_scale: 0.3,
            command_capacity: 1024,
            meter: MeterConfig::default(),
        }
    }
}

/// Spectral meter settings, mirroring an analyser node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeterConfig {
    /// FFT size; must be a power of two.
    pub fft_size: usize,
    /// Spectral smoothing time constant [0, 1).
    pub smoothing: f64,
    pub min_decibels: f64,
    pub max_decibels: f64,
    /// How often meter levels are published, in Hz.
    pub refresh_hz: f64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        MeterConfig {
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            refresh_hz: 60.0,
        }
    }
}

impl StudioConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StudioConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000 {
            return Err(StudioError::Config(format!(
                "sampleRate {} is below 8000",
                self.sample_rate
            )));
        }
        if self.block_size == 0 {
            return Err(StudioError::Config("blockSize must be positive".into()));
        }
        if self.command_capacity == 0 {
            return Err(StudioError::Config("commandCapacity must be positive".into()));
        }
        if self.master_volume > 100 {
            return Err(StudioError::Config(format!(
                "masterVolume {} exceeds 100",
                self.master_volume
            )));
        }
        let m = &self.meter;
        if !m.fft_size.is_power_of_two() || m.fft_size < 32 {
            return Err(StudioError::Config(format!(
                "meter.fftSize {} must be a power of two >= 32",
                m.fft_size
            )));
        }
        if !(0.0..1.0).contains(&m.smoothing) {
            return Err(StudioError::Config("meter.smoothing must be in [0, 1)".into()));
        }
        if m.min_decibels >= m.max_decibels {
            return Err(StudioError::Config(
                "meter.minDecibels must be below meter.maxDecibels".into(),
            ));
        }
        if m.refresh_hz <= 0.0 {
            return Err(StudioError::Config("meter.refreshHz must be positive".into()));
        }
        Ok(())
    }

    /// Master gain as a linear factor.
    pub fn master_gain(&self) -> f64 {
        self.master_volume as f64 / 100.0
    }
}
