//! One-shot buffer playback.
//!
//! Rendered percussion buffers are immutable and shared behind an `Arc`;
//! a [`BufferPlayer`] holds its own reference, so swapping the kit while a
//! hit is still ringing never cuts it short.

use std::sync::Arc;

/// An immutable mono PCM buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> Self {
        SampleBuffer { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.sample_rate as f64
    }

    /// Read a sample with linear interpolation at a fractional position.
    pub fn read_interpolated(&self, position: f64) -> f64 {
        if self.data.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= self.data.len() - 1 {
            return self.data.get(idx).copied().unwrap_or(0.0) as f64;
        }

        let frac = position - idx as f64;
        self.data[idx] as f64 * (1.0 - frac) + self.data[idx + 1] as f64 * frac
    }
}

/// A scheduled one-shot playback of a buffer on a mixer track.
#[derive(Debug, Clone)]
pub struct BufferPlayer {
    pub track: usize,
    buffer: Arc<SampleBuffer>,
    /// Output frame at which playback begins.
    start_frame: u64,
    position: f64,
    /// Buffer frames advanced per output frame.
    step: f64,
    finished: bool,
}

impl BufferPlayer {
    pub fn new(track: usize, buffer: Arc<SampleBuffer>, start_frame: u64, output_rate: f64) -> Self {
        let step = buffer.sample_rate as f64 / output_rate;
        BufferPlayer {
            track,
            buffer,
            start_frame,
            position: 0.0,
            step,
            finished: false,
        }
    }

    /// Sample for output frame `frame`. Silent before the start frame.
    pub fn next_sample(&mut self, frame: u64) -> f64 {
        if self.finished || frame < self.start_frame {
            return 0.0;
        }
        if self.position >= self.buffer.len() as f64 {
            self.finished = true;
            return 0.0;
        }
        let s = self.buffer.read_interpolated(self.position);
        self.position += self.step;
        s
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
