//! Sound-card output through cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::context::AudioBackend;
use crate::error::{Result, StudioError};
use crate::graph::Renderer;

fn unavailable(err: impl std::fmt::Display) -> StudioError {
    StudioError::EngineUnavailable(err.to_string())
}

/// The default output device. Keeps the stream alive while it lives.
#[derive(Default)]
pub struct CpalBackend {
    config: Option<cpal::SupportedStreamConfig>,
    device: Option<cpal::Device>,
    stream: Option<cpal::Stream>,
}

impl CpalBackend {
    pub fn new() -> Self {
        CpalBackend::default()
    }

    fn open(&mut self) -> Result<(&cpal::Device, &cpal::SupportedStreamConfig)> {
        if self.device.is_none() {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| unavailable("no default output device"))?;
            let config = device.default_output_config().map_err(unavailable)?;
            if config.sample_format() != cpal::SampleFormat::F32 {
                return Err(unavailable(format!(
                    "unsupported sample format {:?}, only f32 output is supported",
                    config.sample_format()
                )));
            }
            self.device = Some(device);
            self.config = Some(config);
        }
        match (self.device.as_ref(), self.config.as_ref()) {
            (Some(device), Some(config)) => Ok((device, config)),
            _ => Err(unavailable("output device went away")),
        }
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}

impl AudioBackend for CpalBackend {
    fn sample_rate(&mut self) -> Result<u32> {
        let (_, config) = self.open()?;
        Ok(config.sample_rate().0)
    }

    fn start(&mut self, mut renderer: Renderer) -> Result<()> {
        let (device, config) = self.open()?;
        let channels = config.channels() as usize;
        let stream_config: cpal::StreamConfig = config.clone().into();

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    renderer.render(data, channels);
                },
                |err| error!("audio output stream error: {err}"),
                None,
            )
            .map_err(unavailable)?;
        stream.play().map_err(unavailable)?;
        info!(channels, "output stream started");
        self.stream = Some(stream);
        Ok(())
    }
}
