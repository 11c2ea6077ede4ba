//! Transport clock: 16-step cursor driven by host polling.
//!
//! The host calls [`TransportClock::poll`] from its redraw or timer loop with
//! a monotonic millisecond timestamp. Whenever at least one step interval has
//! elapsed since the last step, the cursor advances by one and callbacks
//! fire: first the drum callback with the new index, then every step
//! subscriber in registration order. Each callback runs inside its own
//! failure boundary; errors and panics are logged and never stop the clock.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Steps per pattern loop.
pub const STEPS: usize = 16;
pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;
pub const DEFAULT_BPM: u32 = 120;

/// Milliseconds per 16th note at `bpm`.
pub fn step_interval_ms(bpm: u32) -> f64 {
    60_000.0 / bpm as f64 / 4.0
}

/// Snapshot handed to step subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    pub is_playing: bool,
    pub current_step: usize,
    pub bpm: u32,
}

impl Default for TransportState {
    fn default() -> Self {
        TransportState {
            is_playing: false,
            current_step: 0,
            bpm: DEFAULT_BPM,
        }
    }
}

/// Handle returned by [`TransportClock::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type DrumCallback = Box<dyn FnMut(usize) -> anyhow::Result<()>>;
pub type StepCallback = Box<dyn FnMut(&TransportState) -> anyhow::Result<()>>;

pub struct TransportClock {
    state: TransportState,
    /// Timestamp of the last step (or of `play`).
    reference_ms: f64,
    drum_callback: Option<DrumCallback>,
    subscribers: Vec<(SubscriptionId, StepCallback)>,
    next_id: u64,
}

impl Default for TransportClock {
    fn default() -> Self {
        TransportClock::new()
    }
}

impl TransportClock {
    pub fn new() -> Self {
        TransportClock {
            state: TransportState::default(),
            reference_ms: 0.0,
            drum_callback: None,
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn current_step(&self) -> usize {
        self.state.current_step
    }

    pub fn bpm(&self) -> u32 {
        self.state.bpm
    }

    /// Start running from the current step. No-op if already running.
    pub fn play(&mut self, now_ms: f64) {
        if self.state.is_playing {
            return;
        }
        self.state.is_playing = true;
        self.reference_ms = now_ms;
        debug!(bpm = self.state.bpm, "transport started");
    }

    /// Stop and rewind to step 0. No-op if already stopped.
    pub fn stop(&mut self) {
        if !self.state.is_playing {
            return;
        }
        self.state.is_playing = false;
        self.state.current_step = 0;
        debug!("transport stopped");
    }

    /// Change tempo, clamped to [`MIN_BPM`, `MAX_BPM`].
    ///
    /// The step position and the time of the last step are kept, so a
    /// running clock fires its next step on the new cadence.
    pub fn set_bpm(&mut self, bpm: u32) -> u32 {
        self.state.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.state.bpm
    }

    /// Replace the drum trigger callback.
    pub fn set_drum_callback(&mut self, callback: DrumCallback) {
        self.drum_callback = Some(callback);
    }

    pub fn subscribe(&mut self, callback: StepCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, callback));
        id
    }

    /// Returns whether a subscriber was removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Advance at most one step if an interval has elapsed since the last.
    ///
    /// Returns the new step index when the cursor moved.
    pub fn poll(&mut self, now_ms: f64) -> Option<usize> {
        if !self.state.is_playing {
            return None;
        }
        if now_ms - self.reference_ms < step_interval_ms(self.state.bpm) {
            return None;
        }

        let step = (self.state.current_step + 1) % STEPS;
        self.state.current_step = step;
        self.reference_ms = now_ms;

        if let Some(callback) = self.drum_callback.as_mut() {
            guarded("drum", || callback(step));
        }
        let state = self.state;
        for (_, callback) in self.subscribers.iter_mut() {
            guarded("step subscriber", || callback(&state));
        }
        Some(step)
    }
}

/// Run one callback, logging (not propagating) its failure.
fn guarded<F>(kind: &str, f: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!("error in {kind} callback: {err:#}"),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("panic in {kind} callback: {msg}");
        }
    }
}
