//! Portal ring audio
//!
//! Movement sounds run alongside positioning: one random start clip, then
//! random movement clips back to back until stopped, then a linear fade.
//! The host plays the queued commands; nothing here waits on playback.

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::AUDIO_RNG_STREAM;
use crate::sim::state::RngState;

/// A playable clip and its length in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    pub length: f32,
}

impl Clip {
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Clips assigned to a portal ring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioClips {
    pub start_moving: Vec<Clip>,
    pub movement: Vec<Clip>,
    pub spin_up: Option<Clip>,
}

/// Playback instructions for the host audio source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AudioCommand {
    /// Overlapping one-shot
    PlayOneShot(String),
    /// Replace the source clip and play it
    Play(String),
    SetVolume(f32),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MovementState {
    Silent,
    /// Start clip playing, seconds left
    StartCue(f32),
    /// Movement clip playing, seconds left
    Looping(f32),
    /// Fading out at the given volume
    Fading(f32),
}

/// Movement sound sub-sequence for one ring
#[derive(Debug, Clone)]
pub struct MovementAudio {
    clips: AudioClips,
    fade_out_duration: f32,
    volume: f32,
    state: MovementState,
    rng: Pcg32,
    pending: Vec<AudioCommand>,
}

impl MovementAudio {
    pub fn new(clips: AudioClips, fade_out_duration: f32, seed: u64) -> Self {
        Self {
            clips,
            fade_out_duration,
            volume: 1.0,
            state: MovementState::Silent,
            rng: RngState::with_stream(seed, AUDIO_RNG_STREAM).to_rng(),
            pending: Vec::new(),
        }
    }

    /// Whether movement sounds or their fade are still running
    pub fn is_active(&self) -> bool {
        self.state != MovementState::Silent
    }

    /// (Re)start the movement sounds from the start cue
    pub fn start(&mut self) {
        if let MovementState::Fading(_) = self.state {
            self.pending.push(AudioCommand::SetVolume(self.volume));
        }
        match self.pick(ClipSet::StartMoving) {
            Some(clip) => {
                self.pending.push(AudioCommand::PlayOneShot(clip.name));
                self.state = MovementState::StartCue(clip.length);
            }
            None => self.state = MovementState::Looping(0.0),
        }
    }

    /// Stop looping and fade out
    pub fn stop(&mut self) {
        match self.state {
            MovementState::Silent | MovementState::Fading(_) => {}
            _ => self.state = MovementState::Fading(self.volume),
        }
    }

    /// Spin-up cue; replaces whatever the source was playing
    pub fn play_spin_up(&mut self) {
        if let Some(clip) = &self.clips.spin_up {
            self.pending.push(AudioCommand::Play(clip.name.clone()));
        }
    }

    pub fn tick(&mut self, dt: f32) {
        match self.state {
            MovementState::Silent => {}
            MovementState::StartCue(remaining) => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.state = MovementState::StartCue(remaining);
                } else {
                    self.next_loop_clip(dt);
                }
            }
            MovementState::Looping(remaining) => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.state = MovementState::Looping(remaining);
                } else {
                    self.next_loop_clip(dt);
                }
            }
            MovementState::Fading(volume) => {
                let step = if self.fade_out_duration > 0.0 {
                    self.volume * dt / self.fade_out_duration
                } else {
                    volume
                };
                let volume = volume - step;
                if volume > 0.0 {
                    self.pending.push(AudioCommand::SetVolume(volume));
                    self.state = MovementState::Fading(volume);
                } else {
                    self.pending.push(AudioCommand::Stop);
                    self.pending.push(AudioCommand::SetVolume(self.volume));
                    self.state = MovementState::Silent;
                }
            }
        }
    }

    /// Take the commands queued since the last drain
    pub fn drain(&mut self) -> Vec<AudioCommand> {
        std::mem::take(&mut self.pending)
    }

    fn next_loop_clip(&mut self, dt: f32) {
        match self.pick(ClipSet::Movement) {
            Some(clip) => {
                self.pending.push(AudioCommand::Play(clip.name));
                self.state = MovementState::Looping(clip.length.max(dt));
            }
            None => self.state = MovementState::Looping(0.0),
        }
    }

    fn pick(&mut self, set: ClipSet) -> Option<Clip> {
        let clips = match set {
            ClipSet::StartMoving => &self.clips.start_moving,
            ClipSet::Movement => &self.clips.movement,
        };
        if clips.is_empty() {
            return None;
        }
        let i = self.rng.random_range(0..clips.len());
        Some(clips[i].clone())
    }
}

#[derive(Debug, Clone, Copy)]
enum ClipSet {
    StartMoving,
    Movement,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clips() -> AudioClips {
        AudioClips {
            start_moving: vec![Clip::new("start_a", 1.0), Clip::new("start_b", 1.0)],
            movement: vec![Clip::new("hum_a", 2.0), Clip::new("hum_b", 2.0)],
            spin_up: Some(Clip::new("spin", 3.0)),
        }
    }

    #[test]
    fn test_start_then_loop() {
        let mut audio = MovementAudio::new(clips(), 1.0, 42);
        audio.start();
        let cmds = audio.drain();
        assert!(matches!(cmds.as_slice(), [AudioCommand::PlayOneShot(name)] if name.starts_with("start_")));

        // Start clip is 1s; first loop clip follows it
        for _ in 0..4 {
            audio.tick(0.25);
        }
        let cmds = audio.drain();
        assert!(matches!(cmds.as_slice(), [AudioCommand::Play(name)] if name.starts_with("hum_")));

        // Loops keep coming every 2s
        for _ in 0..8 {
            audio.tick(0.25);
        }
        assert_eq!(audio.drain().len(), 1);
    }

    #[test]
    fn test_stop_fades_and_restores_volume() {
        let mut audio = MovementAudio::new(clips(), 1.0, 42);
        audio.start();
        audio.tick(0.25);
        audio.drain();

        audio.stop();
        for _ in 0..4 {
            audio.tick(0.25);
        }
        let cmds = audio.drain();
        assert_eq!(
            cmds,
            vec![
                AudioCommand::SetVolume(0.75),
                AudioCommand::SetVolume(0.5),
                AudioCommand::SetVolume(0.25),
                AudioCommand::Stop,
                AudioCommand::SetVolume(1.0),
            ]
        );
        assert!(!audio.is_active());
    }

    #[test]
    fn test_empty_clip_lists_are_silent() {
        let mut audio = MovementAudio::new(AudioClips::default(), 1.0, 1);
        audio.start();
        audio.play_spin_up();
        for _ in 0..20 {
            audio.tick(0.1);
        }
        assert!(audio.drain().is_empty());
        audio.stop();
        for _ in 0..20 {
            audio.tick(0.1);
        }
        assert_eq!(audio.drain().last(), Some(&AudioCommand::SetVolume(1.0)));
    }

    #[test]
    fn test_picks_are_seeded() {
        let mut a = MovementAudio::new(clips(), 1.0, 9);
        let mut b = MovementAudio::new(clips(), 1.0, 9);
        for _ in 0..5 {
            a.start();
            b.start();
        }
        assert_eq!(a.drain(), b.drain());
    }
}
