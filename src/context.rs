//! Audio engine context.
//!
//! Owns the control end of the render graph: the command queue, the shared
//! frame clock and the meter bank. Nothing produces sound until
//! [`AudioContext::initialize`] succeeds; before that every send is a
//! silent no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::{info, warn};

use crate::config::StudioConfig;
use crate::error::{Result, StudioError};
use crate::graph::{GraphCommand, MeterBank, MeterLevels, MixGraph, Renderer};

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Failed,
}

/// Something that can host a [`Renderer`]: a sound card, a worklet, or a
/// test harness.
pub trait AudioBackend {
    /// Output sample rate. Called before `start`.
    fn sample_rate(&mut self) -> Result<u32>;

    /// Take ownership of the renderer and begin pulling audio from it.
    fn start(&mut self, renderer: Renderer) -> Result<()>;
}

pub struct AudioContext {
    config: StudioConfig,
    state: EngineState,
    sample_rate: u32,
    frames: Arc<AtomicU64>,
    commands: Option<Sender<GraphCommand>>,
    meters: Arc<MeterBank>,
}

impl AudioContext {
    pub fn new(config: StudioConfig) -> Self {
        let sample_rate = config.sample_rate;
        AudioContext {
            config,
            state: EngineState::Uninitialized,
            sample_rate,
            frames: Arc::new(AtomicU64::new(0)),
            commands: None,
            meters: Arc::new(MeterBank::default()),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Bring the engine up on `backend`.
    ///
    /// Idempotent once ready. A failure leaves the context in
    /// [`EngineState::Failed`]; calling again retries.
    pub fn initialize(&mut self, backend: &mut dyn AudioBackend) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }
        match self.start_backend(backend) {
            Ok(()) => {
                self.state = EngineState::Ready;
                info!(sample_rate = self.sample_rate, "audio engine ready");
                Ok(())
            }
            Err(err) => {
                self.state = EngineState::Failed;
                self.commands = None;
                warn!("audio engine failed to start: {err}");
                Err(err)
            }
        }
    }

    fn start_backend(&mut self, backend: &mut dyn AudioBackend) -> Result<()> {
        let sample_rate = backend.sample_rate()?;
        if sample_rate == 0 {
            return Err(StudioError::EngineUnavailable("backend reported a zero sample rate".into()));
        }
        self.sample_rate = sample_rate;

        let (tx, rx) = bounded(self.config.command_capacity);
        self.frames = Arc::new(AtomicU64::new(0));
        self.meters = Arc::new(MeterBank::default());
        let graph = MixGraph::new(sample_rate, &self.config);
        let renderer = Renderer::new(rx, graph, Arc::clone(&self.frames), Arc::clone(&self.meters));
        backend.start(renderer)?;
        self.commands = Some(tx);
        Ok(())
    }

    /// Audio clock in seconds: frames rendered so far over the sample rate.
    pub fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    /// Queue a command for the render side.
    ///
    /// Returns whether it was queued. Not ready, a full queue, or a gone
    /// renderer all drop the command.
    pub fn send(&self, command: GraphCommand) -> bool {
        if !self.is_ready() {
            return false;
        }
        let Some(tx) = self.commands.as_ref() else {
            return false;
        };
        match tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("render command queue full, dropping command");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("renderer is gone, dropping command");
                false
            }
        }
    }

    pub fn meter_levels(&self) -> MeterLevels {
        self.meters.snapshot()
    }
}

/// A backend the host pulls from by hand: WASM audio worklets, offline
/// bounces and tests.
pub struct ManualBackend {
    sample_rate: u32,
    renderer: Option<Renderer>,
    refuse: Option<String>,
}

impl ManualBackend {
    pub fn new(sample_rate: u32) -> Self {
        ManualBackend {
            sample_rate,
            renderer: None,
            refuse: None,
        }
    }

    /// A backend whose start always fails with `reason`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        ManualBackend {
            refuse: Some(reason.into()),
            ..ManualBackend::new(44100)
        }
    }

    /// Allow a previously refusing backend to start.
    pub fn allow(&mut self) {
        self.refuse = None;
    }

    pub fn is_started(&self) -> bool {
        self.renderer.is_some()
    }

    /// Render interleaved stereo into `out`. Zero-fills and returns false
    /// when not started.
    pub fn render(&mut self, out: &mut [f32]) -> bool {
        self.render_channels(out, 2)
    }

    pub fn render_channels(&mut self, out: &mut [f32], channels: usize) -> bool {
        match self.renderer.as_mut() {
            Some(renderer) => {
                renderer.render(out, channels);
                true
            }
            None => {
                out.fill(0.0);
                false
            }
        }
    }
}

impl AudioBackend for ManualBackend {
    fn sample_rate(&mut self) -> Result<u32> {
        match &self.refuse {
            Some(reason) => Err(StudioError::EngineUnavailable(reason.clone())),
            None => Ok(self.sample_rate),
        }
    }

    fn start(&mut self, renderer: Renderer) -> Result<()> {
        self.renderer = Some(renderer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_are_dropped_until_ready() {
        let ctx = AudioContext::new(StudioConfig::default());
        assert_eq!(ctx.state(), EngineState::Uninitialized);
        assert!(!ctx.send(GraphCommand::SetMasterGain(0.5)));
        assert_eq!(ctx.current_time(), 0.0);
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut ctx = AudioContext::new(StudioConfig::default());
        let mut backend = ManualBackend::new(48000);
        ctx.initialize(&mut backend).unwrap();
        assert!(ctx.is_ready());
        assert_eq!(ctx.sample_rate(), 48000);

        let mut out = vec![0.0_f32; 2 * 4800];
        backend.render(&mut out);
        assert!((ctx.current_time() - 0.1).abs() < 1e-12);

        let mut other = ManualBackend::new(22050);
        ctx.initialize(&mut other).unwrap();
        assert!(!other.is_started(), "second initialize must not rebuild the graph");
        assert_eq!(ctx.sample_rate(), 48000);
    }

    #[test]
    fn failure_is_reported_and_retryable() {
        let mut ctx = AudioContext::new(StudioConfig::default());
        let mut backend = ManualBackend::unavailable("blocked by autoplay policy");
        let err = ctx.initialize(&mut backend).unwrap_err();
        assert!(matches!(err, StudioError::EngineUnavailable(_)));
        assert_eq!(ctx.state(), EngineState::Failed);
        assert!(!ctx.send(GraphCommand::SetMasterGain(0.5)));

        backend.allow();
        ctx.initialize(&mut backend).unwrap();
        assert!(ctx.is_ready());
        assert!(ctx.send(GraphCommand::SetMasterGain(0.5)));
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let config = StudioConfig {
            command_capacity: 2,
            ..StudioConfig::default()
        };
        let mut ctx = AudioContext::new(config);
        let mut backend = ManualBackend::new(44100);
        ctx.initialize(&mut backend).unwrap();
        assert!(ctx.send(GraphCommand::SetMasterGain(0.1)));
        assert!(ctx.send(GraphCommand::SetMasterGain(0.2)));
        assert!(!ctx.send(GraphCommand::SetMasterGain(0.3)));

        let mut out = vec![0.0_f32; 2];
        backend.render(&mut out);
        assert!(ctx.send(GraphCommand::SetMasterGain(0.3)), "render drains the queue");
    }

    #[test]
    fn unstarted_manual_backend_renders_silence() {
        let mut backend = ManualBackend::new(44100);
        let mut out = vec![1.0_f32; 8];
        assert!(!backend.render(&mut out));
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
