use thiserror::Error;

/// Errors surfaced by the workstation core.
///
/// None of these are fatal to a session: callers either retry
/// (engine initialization) or fall back to defaults (storage).
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("audio engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("track index {index} out of range (0..{len})")]
    TrackOutOfRange { index: usize, len: usize },

    #[error("note {index} out of range (0..{len})")]
    NoteOutOfRange { index: usize, len: usize },

    #[error("step index {index} out of range (0..{len})")]
    StepOutOfRange { index: usize, len: usize },

    #[error("sound parameter {name} = {value} out of range ({min}..={max})")]
    SoundParamOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("pattern has {found} rows, expected {expected}")]
    PatternShape { expected: usize, found: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StudioError>;
