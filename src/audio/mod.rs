//! Ambient and positional audio.
//!
//! The rig tracks what should be audible: which sources hold a buffer, which
//! are playing and at what gain. It does not decode or mix samples. Every
//! change becomes an [`AudioCommand`] that is drained into an [`AudioOutput`]
//! once per frame; [`playback`] turns those commands into sound.

use cgmath::{InnerSpace, Vector3, Zero};

use crate::{error::SceneError, resources::AudioBuffer};

#[cfg(all(feature = "playback", not(target_arch = "wasm32")))]
mod native;
pub mod playback;
#[cfg(target_arch = "wasm32")]
mod web;

pub use playback::{Mixer, MixerOutput, Voice, default_output};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(usize);

/// Distance attenuation of a positional source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Positional {
    /// Distance below which the source plays at full volume.
    pub ref_distance: f32,
    pub rolloff: f32,
    pub position: Vector3<f32>,
}

impl Positional {
    pub fn new(ref_distance: f32, rolloff: f32) -> Self {
        Self {
            ref_distance,
            rolloff,
            position: Vector3::zero(),
        }
    }

    /// Inverse distance model:
    /// `ref / (ref + rolloff * (max(d, ref) - ref))`.
    pub fn gain_at(&self, listener: Vector3<f32>) -> f32 {
        let distance = (self.position - listener).magnitude().max(self.ref_distance);
        let denom = self.ref_distance + self.rolloff * (distance - self.ref_distance);
        if denom <= 0.0 {
            return 1.0;
        }
        self.ref_distance / denom
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioSource {
    pub name: String,
    pub buffer: Option<AudioBuffer>,
    pub looping: bool,
    pub volume: f32,
    pub positional: Option<Positional>,
    playing: bool,
}

impl AudioSource {
    pub fn ambient(name: impl Into<String>, volume: f32) -> Self {
        Self {
            name: name.into(),
            buffer: None,
            looping: true,
            volume,
            positional: None,
            playing: false,
        }
    }

    pub fn positional(name: impl Into<String>, volume: f32, positional: Positional) -> Self {
        Self {
            positional: Some(positional),
            looping: false,
            ..Self::ambient(name, volume)
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Gain heard at `listener` with the listener's master gain applied.
    pub fn gain(&self, master: f32, listener: Vector3<f32>) -> f32 {
        let distance = self.positional.map_or(1.0, |p| p.gain_at(listener));
        self.volume * master * distance
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AudioCommand {
    Play {
        source: SourceId,
        buffer: AudioBuffer,
        looping: bool,
        gain: f32,
    },
    Stop {
        source: SourceId,
    },
    SetGain {
        source: SourceId,
        gain: f32,
    },
}

/// Where audio commands end up.
pub trait AudioOutput {
    fn submit(&mut self, command: AudioCommand);
}

/// Output that only logs what would be played. Used when no audio device can
/// be opened.
#[derive(Debug, Default)]
pub struct LogOutput;

impl AudioOutput for LogOutput {
    fn submit(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Play {
                source,
                buffer,
                looping,
                gain,
            } => log::info!("audio {:?}: play {:?} (loop {}, gain {:.4})", source, buffer, looping, gain),
            AudioCommand::Stop { source } => log::info!("audio {:?}: stop", source),
            AudioCommand::SetGain { source, gain } => {
                log::trace!("audio {:?}: gain {:.4}", source, gain)
            }
        }
    }
}

/// The listener and every source it hears.
#[derive(Debug)]
pub struct AudioRig {
    master_gain: f32,
    listener: Vector3<f32>,
    sources: Vec<AudioSource>,
    gains: Vec<f32>,
    pending: Vec<AudioCommand>,
}

impl Default for AudioRig {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioRig {
    pub fn new() -> Self {
        Self {
            master_gain: 1.0,
            listener: Vector3::zero(),
            sources: Vec::new(),
            gains: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn add(&mut self, source: AudioSource) -> SourceId {
        self.sources.push(source);
        self.gains.push(0.0);
        SourceId(self.sources.len() - 1)
    }

    pub fn source(&self, id: SourceId) -> Option<&AudioSource> {
        self.sources.get(id.0)
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Flips the master gain between 0 and 1.
    pub fn toggle_mute(&mut self) -> f32 {
        self.master_gain = if self.master_gain == 1.0 { 0.0 } else { 1.0 };
        self.refresh_gains();
        self.master_gain
    }

    /// Attaches a loaded buffer and optionally starts playback.
    pub fn set_buffer(&mut self, id: SourceId, buffer: AudioBuffer, autoplay: bool) {
        let Some(source) = self.sources.get_mut(id.0) else {
            return;
        };
        source.buffer = Some(buffer);
        if autoplay {
            if let Err(e) = self.play(id) {
                log::warn!("{e}");
            }
        }
    }

    pub fn play(&mut self, id: SourceId) -> Result<(), SceneError> {
        let gain = self.gain_of(id);
        let source = self
            .sources
            .get_mut(id.0)
            .ok_or_else(|| SceneError::missing("audio source"))?;
        let buffer = source
            .buffer
            .clone()
            .ok_or_else(|| SceneError::missing(format!("audio buffer of {}", source.name)))?;
        source.playing = true;
        self.gains[id.0] = gain;
        self.pending.push(AudioCommand::Play {
            source: id,
            buffer,
            looping: source.looping,
            gain,
        });
        Ok(())
    }

    pub fn stop(&mut self, id: SourceId) {
        if let Some(source) = self.sources.get_mut(id.0) {
            if source.playing {
                source.playing = false;
                self.pending.push(AudioCommand::Stop { source: id });
            }
        }
    }

    /// Play if stopped, stop if playing. Returns whether the source now plays.
    pub fn toggle(&mut self, id: SourceId) -> Result<bool, SceneError> {
        if self.source(id).is_some_and(AudioSource::is_playing) {
            self.stop(id);
            Ok(false)
        } else {
            self.play(id)?;
            Ok(true)
        }
    }

    pub fn set_source_position(&mut self, id: SourceId, position: Vector3<f32>) {
        if let Some(p) = self
            .sources
            .get_mut(id.0)
            .and_then(|source| source.positional.as_mut())
        {
            p.position = position;
        }
    }

    /// Moves the listener and re-evaluates positional gains.
    pub fn set_listener(&mut self, position: Vector3<f32>) {
        self.listener = position;
        self.refresh_gains();
    }

    fn gain_of(&self, id: SourceId) -> f32 {
        self.sources
            .get(id.0)
            .map_or(0.0, |s| s.gain(self.master_gain, self.listener))
    }

    fn refresh_gains(&mut self) {
        for idx in 0..self.sources.len() {
            if !self.sources[idx].playing {
                continue;
            }
            let gain = self.gain_of(SourceId(idx));
            if (gain - self.gains[idx]).abs() > 1e-6 {
                self.gains[idx] = gain;
                self.pending.push(AudioCommand::SetGain {
                    source: SourceId(idx),
                    gain,
                });
            }
        }
    }

    /// Hands every queued command to `output`.
    pub fn drain(&mut self, output: &mut dyn AudioOutput) {
        for command in self.pending.drain(..) {
            output.submit(command);
        }
    }

    /// Stops every playing source.
    pub fn stop_all(&mut self) {
        for idx in 0..self.sources.len() {
            self.stop(SourceId(idx));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn buffer(name: &str) -> AudioBuffer {
        AudioBuffer {
            name: name.to_string(),
            bytes: Arc::from(vec![1u8, 2, 3]),
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<AudioCommand>);

    impl AudioOutput for Recorder {
        fn submit(&mut self, command: AudioCommand) {
            self.0.push(command);
        }
    }

    #[test]
    fn inverse_distance_gain() {
        let mut radio = Positional::new(10.0, 1.0);
        radio.position = Vector3::new(30.0, 0.0, 0.0);
        assert_eq!(radio.gain_at(Vector3::new(25.0, 0.0, 0.0)), 1.0);
        assert!((radio.gain_at(Vector3::zero()) - 10.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn toggling_without_a_buffer_fails() {
        let mut rig = AudioRig::new();
        let radio = rig.add(AudioSource::positional("radio", 0.1, Positional::new(10.0, 1.0)));
        assert!(rig.toggle(radio).is_err());
        rig.set_buffer(radio, buffer("trendybeatz.mp3"), false);
        assert_eq!(rig.toggle(radio), Ok(true));
        assert_eq!(rig.toggle(radio), Ok(false));
    }

    #[test]
    fn mute_sends_gain_changes_to_playing_sources() {
        let mut rig = AudioRig::new();
        let ambient = rig.add(AudioSource::ambient("ambient", 0.01));
        rig.set_buffer(ambient, buffer("ambient.mp3"), true);
        rig.toggle_mute();
        let mut out = Recorder::default();
        rig.drain(&mut out);
        assert!(matches!(out.0[0], AudioCommand::Play { gain, .. } if (gain - 0.01).abs() < 1e-9));
        assert_eq!(out.0[1], AudioCommand::SetGain { source: ambient, gain: 0.0 });
    }
}
