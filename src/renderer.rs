//! Offline bounce: run a studio against a manual backend faster than real
//! time and collect the output, optionally as a WAV file.

use tracing::debug;

use crate::context::ManualBackend;
use crate::studio::Studio;

/// Play `studio` from the top for `seconds` and return interleaved stereo.
///
/// The transport is polled once per block with a millisecond clock derived
/// from the rendered frame count, so timing is sample-accurate to the block.
pub fn bounce(studio: &mut Studio, backend: &mut ManualBackend, seconds: f64) -> Vec<f32> {
    let sample_rate = studio.context().sample_rate();
    let block = studio.config().block_size.max(1);
    let total = (seconds.max(0.0) * sample_rate as f64).round() as usize;

    let mut out = vec![0.0_f32; total * 2];
    studio.play(0.0);
    let mut frame = 0;
    while frame < total {
        let now_ms = frame as f64 / sample_rate as f64 * 1000.0;
        studio.poll(now_ms);
        let n = block.min(total - frame);
        backend.render(&mut out[frame * 2..(frame + n) * 2]);
        frame += n;
    }
    studio.stop();
    debug!(frames = total, "bounce finished");
    out
}

/// Length of `bars` 16-step bars at `bpm`, in seconds.
pub fn bars_to_seconds(bars: u32, bpm: u32) -> f64 {
    let steps = bars as f64 * crate::transport::STEPS as f64;
    steps * crate::transport::step_interval_ms(bpm) / 1000.0
}

/// Encode interleaved stereo f32 as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let channels: u16 = 2;
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;

    let mut buf = Vec::with_capacity(44 + data_size as usize);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &s in samples {
        let pcm = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        buf.extend_from_slice(&pcm.to_le_bytes());
    }
    buf
}
