//! Render side of the mixing graph.
//!
//! The control thread never touches audio state directly: it sends
//! [`GraphCommand`]s over a bounded channel and the [`Renderer`] applies them
//! at the start of each render call. Meter levels flow back through the
//! lock-free [`MeterBank`].

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::Serialize;

use crate::config::StudioConfig;
use crate::dsp::analyser::Analyser;
use crate::dsp::mixer::ChannelStrip;
use crate::dsp::sampler::{BufferPlayer, SampleBuffer};
use crate::dsp::voice::NoteVoice;
use crate::percussion::TRACK_COUNT;

/// Meter slots: one per drum track, then the synth bus, then master.
pub const METER_COUNT: usize = TRACK_COUNT + 2;
pub const SYNTH_METER: usize = TRACK_COUNT;
pub const MASTER_METER: usize = TRACK_COUNT + 1;

/// Instructions from the control side to the render side.
#[derive(Debug)]
pub enum GraphCommand {
    /// Play a drum buffer on a track at audio time `at` (seconds).
    PlayBuffer {
        track: usize,
        buffer: Arc<SampleBuffer>,
        at: f64,
    },
    StartVoice(Box<NoteVoice>),
    /// Fade every sounding note to silence over `fade` seconds from `at`.
    FadeOutVoices { at: f64, fade: f64 },
    SetTrackGain { track: usize, gain: f64 },
    SetTrackPan { track: usize, pan: f64 },
    SetSynthGain(f64),
    SetSynthPan(f64),
    SetMasterGain(f64),
}

/// Latest meter levels, written by the render thread, read anywhere.
#[derive(Debug, Default)]
pub struct MeterBank {
    levels: [AtomicU32; METER_COUNT],
}

impl MeterBank {
    pub fn store(&self, slot: usize, level: f64) {
        if let Some(cell) = self.levels.get(slot) {
            cell.store((level as f32).to_bits(), Ordering::Relaxed);
        }
    }

    pub fn load(&self, slot: usize) -> f64 {
        self.levels
            .get(slot)
            .map(|cell| f32::from_bits(cell.load(Ordering::Relaxed)) as f64)
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> MeterLevels {
        MeterLevels {
            tracks: std::array::from_fn(|i| self.load(i)),
            synth: self.load(SYNTH_METER),
            master: self.load(MASTER_METER),
        }
    }
}

/// Meter levels (0-100) for every strip.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MeterLevels {
    pub tracks: [f64; TRACK_COUNT],
    pub synth: f64,
    pub master: f64,
}

/// Strips, sources and meter taps.
pub struct MixGraph {
    sample_rate: f64,
    tracks: [ChannelStrip; TRACK_COUNT],
    synth: ChannelStrip,
    master_gain: f64,
    players: Vec<BufferPlayer>,
    voices: Vec<NoteVoice>,
    analysers: Vec<Analyser>,
    meter_interval: u64,
    since_meter: u64,
}

impl MixGraph {
    pub fn new(sample_rate: u32, config: &StudioConfig) -> Self {
        let sr = sample_rate as f64;
        MixGraph {
            sample_rate: sr,
            tracks: [ChannelStrip::default(); TRACK_COUNT],
            synth: ChannelStrip::default(),
            master_gain: config.master_gain(),
            players: Vec::with_capacity(64),
            voices: Vec::with_capacity(32),
            analysers: (0..METER_COUNT).map(|_| Analyser::new(&config.meter)).collect(),
            meter_interval: ((sr / config.meter.refresh_hz).round() as u64).max(1),
            since_meter: 0,
        }
    }

    pub fn apply(&mut self, command: GraphCommand) {
        match command {
            GraphCommand::PlayBuffer { track, buffer, at } => {
                if track < TRACK_COUNT {
                    let start = (at * self.sample_rate).round().max(0.0) as u64;
                    self.players.push(BufferPlayer::new(track, buffer, start, self.sample_rate));
                }
            }
            GraphCommand::StartVoice(voice) => self.voices.push(*voice),
            GraphCommand::FadeOutVoices { at, fade } => {
                for voice in self.voices.iter_mut() {
                    voice.fade_out(at, fade);
                }
            }
            GraphCommand::SetTrackGain { track, gain } => {
                if let Some(strip) = self.tracks.get_mut(track) {
                    strip.gain = gain;
                }
            }
            GraphCommand::SetTrackPan { track, pan } => {
                if let Some(strip) = self.tracks.get_mut(track) {
                    strip.set_pan(pan);
                }
            }
            GraphCommand::SetSynthGain(gain) => self.synth.gain = gain,
            GraphCommand::SetSynthPan(pan) => self.synth.set_pan(pan),
            GraphCommand::SetMasterGain(gain) => self.master_gain = gain,
        }
    }

    pub fn active_sources(&self) -> usize {
        self.players.len() + self.voices.len()
    }

    /// Render output frame `frame`; returns clamped (left, right).
    pub fn render_frame(&mut self, frame: u64, meters: &MeterBank) -> (f64, f64) {
        let t = frame as f64 / self.sample_rate;

        let mut track_in = [0.0; TRACK_COUNT];
        for player in self.players.iter_mut() {
            track_in[player.track] += player.next_sample(frame);
        }
        self.players.retain(|p| !p.is_finished());

        let (mut left, mut right) = (0.0, 0.0);
        for (i, strip) in self.tracks.iter().enumerate() {
            let gained = strip.gained(track_in[i]);
            self.analysers[i].push(gained);
            let (l, r) = strip.pan_sample(gained);
            left += l;
            right += r;
        }

        let mut synth_in = 0.0;
        for voice in self.voices.iter_mut() {
            synth_in += voice.next_sample(t);
        }
        self.voices.retain(|v| !v.is_finished());
        let gained = self.synth.gained(synth_in);
        self.analysers[SYNTH_METER].push(gained);
        let (l, r) = self.synth.pan_sample(gained);
        left += l;
        right += r;

        left *= self.master_gain;
        right *= self.master_gain;
        self.analysers[MASTER_METER].push(0.5 * (left + right));

        self.since_meter += 1;
        if self.since_meter >= self.meter_interval {
            self.since_meter = 0;
            for (slot, analyser) in self.analysers.iter_mut().enumerate() {
                meters.store(slot, analyser.level());
            }
        }

        (left.clamp(-1.0, 1.0), right.clamp(-1.0, 1.0))
    }
}

/// Owned by whatever drives audio output; pulls frames from the graph.
pub struct Renderer {
    commands: Receiver<GraphCommand>,
    graph: MixGraph,
    frames: Arc<AtomicU64>,
    meters: Arc<MeterBank>,
}

impl Renderer {
    pub fn new(
        commands: Receiver<GraphCommand>,
        graph: MixGraph,
        frames: Arc<AtomicU64>,
        meters: Arc<MeterBank>,
    ) -> Self {
        Renderer {
            commands,
            graph,
            frames,
            meters,
        }
    }

    /// Fill `out` with interleaved frames of `channels` channels.
    ///
    /// Mono output gets the left/right average; channels beyond the first
    /// two are silent.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        for command in self.commands.try_iter() {
            self.graph.apply(command);
        }

        let channels = channels.max(1);
        let start = self.frames.load(Ordering::Acquire);
        let mut rendered = 0;
        for frame in out.chunks_mut(channels) {
            let (l, r) = self.graph.render_frame(start + rendered, &self.meters);
            match frame {
                [mono] => *mono = (0.5 * (l + r)) as f32,
                [left, right, rest @ ..] => {
                    *left = l as f32;
                    *right = r as f32;
                    rest.fill(0.0);
                }
                [] => {}
            }
            rendered += 1;
        }
        self.frames.store(start + rendered, Ordering::Release);
    }

    pub fn graph(&self) -> &MixGraph {
        &self.graph
    }
}
