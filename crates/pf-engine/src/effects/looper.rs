//! Stereo looper
//!
//! A five-state machine decides which buffer receives writes:
//!
//! | state     | loop buffer                       | output              |
//! |-----------|-----------------------------------|---------------------|
//! | Idle      | untouched (empty)                 | dry                 |
//! | Recording | input written at the head         | dry                 |
//! | Playing   | read                              | dry + loop · level  |
//! | Overdub   | `hard_clip(loop · decay + input)` | dry + loop · level  |
//! | Paused    | held                              | dry                 |
//!
//! Transport commands are events, not levels, so they do not travel in the
//! parameter map: a `LooperControl` pushes them over an `rtrb` ring and
//! reads the state back from atomics the audio thread publishes per block.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample};
use pf_dsp::saturation::hard_clip;
use rtrb::{Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};

use super::{EffectKind, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_LEVEL: ParamId = ParamId(0);
pub const PARAM_DECAY: ParamId = ParamId(1);

pub const MAX_LOOP_SECONDS: f64 = 120.0;
const COMMAND_QUEUE: usize = 16;

static PARAMS: [ParamSpec; 2] = [
    ParamSpec::new(0, "level", "", ParamRange::linear(0.0, 1.0, 1.0)),
    ParamSpec::new(1, "decay", "", ParamRange::linear(0.0, 1.0, 1.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Looper",
    kind: EffectKind::Looper,
    params: &PARAMS,
    capabilities: Capabilities::NONE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LooperState {
    #[default]
    Idle = 0,
    Recording = 1,
    Playing = 2,
    Overdub = 3,
    Paused = 4,
}

impl LooperState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LooperState::Recording,
            2 => LooperState::Playing,
            3 => LooperState::Overdub,
            4 => LooperState::Paused,
            _ => LooperState::Idle,
        }
    }
}

/// Transport events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LooperCommand {
    /// Start a new loop, discarding any existing one
    Record,
    /// Close a recording, or resume playback
    Play,
    /// Layer input on top of the loop
    Overdub,
    /// Hold the playhead
    Pause,
    /// Back to Idle with an empty loop
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LooperConfig {
    /// Buffer length allocated at prepare
    pub max_seconds: f64,
    /// Loop playback gain
    pub level: f64,
    /// Gain applied to existing material on each overdub pass
    pub decay: f64,
}

impl LooperConfig {
    pub fn set_max_seconds(&mut self, seconds: f64) {
        self.max_seconds = clamp_or(seconds, 0.1, MAX_LOOP_SECONDS, 30.0);
    }

    pub fn set_level(&mut self, level: f64) {
        self.level = clamp_or(level, 0.0, 1.0, 1.0);
    }

    pub fn set_decay(&mut self, decay: f64) {
        self.decay = clamp_or(decay, 0.0, 1.0, 1.0);
    }
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            max_seconds: 30.0,
            level: 1.0,
            decay: 1.0,
        }
    }
}

/// State published by the audio thread once per block
#[derive(Debug, Default)]
struct LooperShared {
    state: AtomicU8,
    length: AtomicUsize,
    position: AtomicUsize,
}

/// Control-thread handle: sends commands, observes the transport
pub struct LooperControl {
    commands: Producer<LooperCommand>,
    shared: Arc<LooperShared>,
}

impl LooperControl {
    /// Queue a command for the next block. False when the queue is full.
    pub fn send(&mut self, command: LooperCommand) -> bool {
        self.commands.push(command).is_ok()
    }

    pub fn record(&mut self) -> bool {
        self.send(LooperCommand::Record)
    }

    pub fn play(&mut self) -> bool {
        self.send(LooperCommand::Play)
    }

    pub fn overdub(&mut self) -> bool {
        self.send(LooperCommand::Overdub)
    }

    pub fn pause(&mut self) -> bool {
        self.send(LooperCommand::Pause)
    }

    pub fn clear(&mut self) -> bool {
        self.send(LooperCommand::Clear)
    }

    /// State as of the last processed block
    pub fn state(&self) -> LooperState {
        LooperState::from_u8(self.shared.state.load(Ordering::Relaxed))
    }

    /// Loop length in frames (0 while empty or still recording)
    pub fn loop_length(&self) -> usize {
        self.shared.length.load(Ordering::Relaxed)
    }

    pub fn position(&self) -> usize {
        self.shared.position.load(Ordering::Relaxed)
    }
}

pub struct Looper {
    config: LooperConfig,
    state: LooperState,
    buffers: [Vec<Sample>; 2],
    /// Frames of recorded material
    length: usize,
    position: usize,
    commands: Option<Consumer<LooperCommand>>,
    shared: Arc<LooperShared>,
}

impl Looper {
    pub fn new() -> Self {
        Self::with_config(LooperConfig::default())
    }

    pub fn with_config(mut config: LooperConfig) -> Self {
        config.set_max_seconds(config.max_seconds);
        Self {
            config,
            state: LooperState::Idle,
            buffers: [Vec::new(), Vec::new()],
            length: 0,
            position: 0,
            commands: None,
            shared: Arc::new(LooperShared::default()),
        }
    }

    pub fn config(&self) -> &LooperConfig {
        &self.config
    }

    pub fn state(&self) -> LooperState {
        self.state
    }

    pub fn loop_length(&self) -> usize {
        match self.state {
            LooperState::Recording => 0,
            _ => self.length,
        }
    }

    /// Attach a control handle. Replaces any earlier one.
    pub fn control(&mut self) -> LooperControl {
        let (commands, consumer) = RingBuffer::new(COMMAND_QUEUE);
        self.commands = Some(consumer);
        LooperControl {
            commands,
            shared: Arc::clone(&self.shared),
        }
    }

    fn capacity(&self) -> usize {
        self.buffers[0].len()
    }

    /// Apply one transport event
    pub fn command(&mut self, command: LooperCommand) {
        use LooperState::*;

        self.state = match (command, self.state) {
            (LooperCommand::Clear, _) => {
                self.length = 0;
                self.position = 0;
                Idle
            }
            (LooperCommand::Record, _) => {
                if self.capacity() == 0 {
                    Idle
                } else {
                    self.length = 0;
                    self.position = 0;
                    Recording
                }
            }
            (LooperCommand::Play, Recording) => self.close_recording(Playing),
            (LooperCommand::Overdub, Recording) => self.close_recording(Overdub),
            (LooperCommand::Pause, Recording) => self.close_recording(Paused),
            (LooperCommand::Play, Overdub | Paused) => Playing,
            (LooperCommand::Overdub, Playing | Paused) => Overdub,
            (LooperCommand::Pause, Playing | Overdub) => Paused,
            // Nothing to resume from Idle, or already there
            (_, state) => state,
        };
    }

    /// End a take. An empty take leaves nothing to play.
    fn close_recording(&mut self, next: LooperState) -> LooperState {
        self.length = self.position;
        self.position = 0;
        if self.length == 0 { LooperState::Idle } else { next }
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.as_mut().and_then(|c| c.pop().ok()) {
            self.command(command);
        }
    }

    fn publish(&self) {
        self.shared.state.store(self.state as u8, Ordering::Relaxed);
        self.shared.length.store(self.loop_length(), Ordering::Relaxed);
        self.shared.position.store(self.position, Ordering::Relaxed);
    }
}

impl Default for Looper {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Looper {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        let frames = (self.config.max_seconds * spec.sample_rate).ceil() as usize;
        self.buffers = [vec![0.0; frames], vec![0.0; frames]];
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_LEVEL => self.config.set_level(value),
            PARAM_DECAY => self.config.set_decay(value),
            _ => {}
        }
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.drain_commands();

        let level = self.config.level;
        let decay = self.config.decay;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let pos = self.position;
            match self.state {
                LooperState::Idle | LooperState::Paused => {}
                LooperState::Recording => {
                    self.buffers[0][pos] = *l;
                    self.buffers[1][pos] = *r;
                    self.position += 1;
                    if self.position == self.capacity() {
                        // Out of room: the take becomes the loop
                        self.state = self.close_recording(LooperState::Playing);
                    }
                }
                LooperState::Playing | LooperState::Overdub => {
                    let loop_l = self.buffers[0][pos];
                    let loop_r = self.buffers[1][pos];
                    if self.state == LooperState::Overdub {
                        self.buffers[0][pos] = hard_clip(loop_l * decay + *l);
                        self.buffers[1][pos] = hard_clip(loop_r * decay + *r);
                    }
                    *l += loop_l * level;
                    *r += loop_r * level;
                    self.position += 1;
                    if self.position >= self.length {
                        self.position = 0;
                    }
                }
            }
        }

        self.publish();
    }

    fn reset(&mut self) {
        self.state = LooperState::Idle;
        self.length = 0;
        self.position = 0;
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looper(max_seconds: f64) -> Looper {
        let mut looper = Looper::with_config(LooperConfig {
            max_seconds,
            ..LooperConfig::default()
        });
        looper.prepare(&ProcessSpec::new(1000.0, 64));
        looper
    }

    fn run(looper: &mut Looper, input: &[f64]) -> Vec<f64> {
        let mut l = input.to_vec();
        let mut r = input.to_vec();
        looper.process_stereo(&mut l, &mut r);
        l
    }

    #[test]
    fn test_record_then_play_loops() {
        let mut lp = looper(1.0);
        lp.command(LooperCommand::Record);
        let take: Vec<f64> = (0..10).map(|i| i as f64 * 0.01).collect();
        assert_eq!(run(&mut lp, &take), take);

        lp.command(LooperCommand::Play);
        assert_eq!(lp.state(), LooperState::Playing);
        assert_eq!(lp.loop_length(), 10);

        let out = run(&mut lp, &[0.0; 25]);
        for (i, &v) in out.iter().enumerate() {
            assert_eq!(v, take[i % 10]);
        }
    }

    #[test]
    fn test_overdub_layers() {
        let mut lp = looper(1.0);
        lp.command(LooperCommand::Record);
        run(&mut lp, &[0.25; 4]);
        lp.command(LooperCommand::Overdub);
        assert_eq!(lp.state(), LooperState::Overdub);

        // First pass hears the original, second hears both layers
        assert_eq!(run(&mut lp, &[0.5; 4]), vec![0.75; 4]);
        lp.command(LooperCommand::Play);
        assert_eq!(run(&mut lp, &[0.0; 4]), vec![0.75; 4]);
    }

    #[test]
    fn test_overdub_is_clipped() {
        let mut lp = looper(1.0);
        lp.command(LooperCommand::Record);
        run(&mut lp, &[0.9; 4]);
        lp.command(LooperCommand::Overdub);
        for _ in 0..10 {
            run(&mut lp, &[0.9; 4]);
        }
        lp.command(LooperCommand::Play);
        assert_eq!(run(&mut lp, &[0.0; 4]), vec![1.0; 4]);
    }

    #[test]
    fn test_pause_holds_position() {
        let mut lp = looper(1.0);
        lp.command(LooperCommand::Record);
        let take: Vec<f64> = (1..=8).map(|i| i as f64 * 0.1).collect();
        run(&mut lp, &take);
        lp.command(LooperCommand::Play);
        run(&mut lp, &[0.0; 3]);

        lp.command(LooperCommand::Pause);
        assert_eq!(run(&mut lp, &[0.0; 5]), vec![0.0; 5]);
        lp.command(LooperCommand::Play);
        assert_eq!(run(&mut lp, &[0.0; 1]), vec![take[3]]);
    }

    #[test]
    fn test_recording_stops_at_capacity() {
        let mut lp = looper(0.1);
        lp.command(LooperCommand::Record);
        run(&mut lp, &[0.5; 150]);
        assert_eq!(lp.state(), LooperState::Playing);
        assert_eq!(lp.loop_length(), 100);
    }

    #[test]
    fn test_commands_without_loop_are_ignored() {
        let mut lp = looper(1.0);
        for cmd in [LooperCommand::Play, LooperCommand::Overdub, LooperCommand::Pause] {
            lp.command(cmd);
            assert_eq!(lp.state(), LooperState::Idle);
        }
        lp.command(LooperCommand::Record);
        lp.command(LooperCommand::Play);
        // Empty take
        assert_eq!(lp.state(), LooperState::Idle);
    }

    #[test]
    fn test_control_handle_round_trip() {
        let mut lp = looper(1.0);
        let mut control = lp.control();
        assert!(control.record());
        run(&mut lp, &[0.1; 20]);
        assert_eq!(control.state(), LooperState::Recording);
        assert_eq!(control.loop_length(), 0);

        assert!(control.play());
        run(&mut lp, &[0.0; 5]);
        assert_eq!(control.state(), LooperState::Playing);
        assert_eq!(control.loop_length(), 20);
        assert_eq!(control.position(), 5);

        assert!(control.clear());
        run(&mut lp, &[0.0; 1]);
        assert_eq!(control.state(), LooperState::Idle);
    }
}
