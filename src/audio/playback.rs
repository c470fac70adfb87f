//! Audible outputs.
//!
//! A [`Mixer`] starts decoded playback of an encoded buffer and hands back a
//! [`Voice`] that can still be turned down or stopped. [`MixerOutput`] keeps
//! one voice per source and routes the rig's commands to it. Native builds mix
//! through rodio, the browser through Web Audio.

use std::collections::HashMap;

use crate::resources::AudioBuffer;

use super::{AudioCommand, AudioOutput, LogOutput, SourceId};

/// A sound that was started and can still be adjusted.
pub trait Voice {
    fn set_gain(&mut self, gain: f32);
    fn stop(&mut self);
}

/// Decodes and plays buffers.
pub trait Mixer {
    type Voice: Voice;

    fn start(&mut self, buffer: &AudioBuffer, looping: bool, gain: f32) -> anyhow::Result<Self::Voice>;
}

/// Plays the rig's commands through a [`Mixer`].
pub struct MixerOutput<M: Mixer> {
    mixer: M,
    voices: HashMap<SourceId, M::Voice>,
}

impl<M: Mixer> MixerOutput<M> {
    pub fn new(mixer: M) -> Self {
        Self {
            mixer,
            voices: HashMap::new(),
        }
    }

    pub fn is_playing(&self, source: SourceId) -> bool {
        self.voices.contains_key(&source)
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }
}

impl<M: Mixer> AudioOutput for MixerOutput<M> {
    fn submit(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Play {
                source,
                buffer,
                looping,
                gain,
            } => {
                // a source restarts from the beginning
                if let Some(mut voice) = self.voices.remove(&source) {
                    voice.stop();
                }
                match self.mixer.start(&buffer, looping, gain) {
                    Ok(voice) => {
                        log::info!("audio {source:?}: playing {buffer:?}");
                        self.voices.insert(source, voice);
                    }
                    Err(e) => log::error!("audio {source:?}: cannot play {buffer:?}: {e:#}"),
                }
            }
            AudioCommand::Stop { source } => {
                if let Some(mut voice) = self.voices.remove(&source) {
                    voice.stop();
                }
            }
            AudioCommand::SetGain { source, gain } => {
                if let Some(voice) = self.voices.get_mut(&source) {
                    voice.set_gain(gain);
                }
            }
        }
    }
}

impl<M: Mixer> Drop for MixerOutput<M> {
    fn drop(&mut self) {
        for (_, mut voice) in self.voices.drain() {
            voice.stop();
        }
    }
}

/// The output sound goes to: the platform mixer when one can be opened,
/// otherwise a [`LogOutput`].
pub fn default_output() -> Box<dyn AudioOutput> {
    #[cfg(all(feature = "playback", not(target_arch = "wasm32")))]
    {
        match super::native::RodioMixer::open() {
            Ok(mixer) => return Box::new(MixerOutput::new(mixer)),
            Err(e) => log::warn!("no audio device, sound is only logged: {e:#}"),
        }
    }
    #[cfg(target_arch = "wasm32")]
    {
        match super::web::WebMixer::new() {
            Ok(mixer) => return Box::new(MixerOutput::new(mixer)),
            Err(e) => log::warn!("no audio context, sound is only logged: {e:#}"),
        }
    }
    #[cfg(all(not(feature = "playback"), not(target_arch = "wasm32")))]
    {
        log::info!("built without the playback feature, sound is only logged");
    }
    Box::new(LogOutput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc, sync::Arc};

    #[derive(Debug, Default)]
    struct VoiceLog {
        gain: f32,
        stopped: bool,
    }

    struct FakeVoice(Rc<RefCell<VoiceLog>>);

    impl Voice for FakeVoice {
        fn set_gain(&mut self, gain: f32) {
            self.0.borrow_mut().gain = gain;
        }

        fn stop(&mut self) {
            self.0.borrow_mut().stopped = true;
        }
    }

    /// Starts voices whose state stays inspectable, refusing empty buffers.
    #[derive(Default)]
    struct FakeMixer {
        started: Vec<(String, bool, Rc<RefCell<VoiceLog>>)>,
    }

    impl Mixer for FakeMixer {
        type Voice = FakeVoice;

        fn start(&mut self, buffer: &AudioBuffer, looping: bool, gain: f32) -> anyhow::Result<FakeVoice> {
            anyhow::ensure!(!buffer.bytes.is_empty(), "{} is empty", buffer.name);
            let log = Rc::new(RefCell::new(VoiceLog { gain, stopped: false }));
            self.started.push((buffer.name.clone(), looping, log.clone()));
            Ok(FakeVoice(log))
        }
    }

    fn play(source: usize, name: &str, bytes: Vec<u8>) -> AudioCommand {
        AudioCommand::Play {
            source: SourceId(source),
            buffer: AudioBuffer {
                name: name.to_string(),
                bytes: Arc::from(bytes),
            },
            looping: true,
            gain: 0.01,
        }
    }

    #[test]
    fn gain_changes_reach_the_playing_voice() {
        let mut output = MixerOutput::new(FakeMixer::default());
        output.submit(play(0, "ambient.mp3", vec![1, 2, 3]));
        output.submit(AudioCommand::SetGain {
            source: SourceId(0),
            gain: 0.0,
        });

        let (name, looping, voice) = &output.mixer().started[0];
        assert_eq!(name, "ambient.mp3");
        assert!(*looping);
        assert_eq!(voice.borrow().gain, 0.0);
    }

    #[test]
    fn replaying_a_source_stops_its_old_voice() {
        let mut output = MixerOutput::new(FakeMixer::default());
        output.submit(play(1, "radio.mp3", vec![1]));
        output.submit(play(1, "radio.mp3", vec![1]));

        let started = &output.mixer().started;
        assert_eq!(started.len(), 2);
        assert!(started[0].2.borrow().stopped);
        assert!(!started[1].2.borrow().stopped);
        assert!(output.is_playing(SourceId(1)));
    }

    #[test]
    fn stop_releases_the_voice() {
        let mut output = MixerOutput::new(FakeMixer::default());
        output.submit(play(0, "ambient.mp3", vec![1]));
        output.submit(AudioCommand::Stop { source: SourceId(0) });
        assert!(!output.is_playing(SourceId(0)));
        assert!(output.mixer().started[0].2.borrow().stopped);

        // gains for silent sources go nowhere
        output.submit(AudioCommand::SetGain {
            source: SourceId(0),
            gain: 1.0,
        });
        assert_eq!(output.mixer().started[0].2.borrow().gain, 0.01);
    }

    #[test]
    fn undecodable_buffers_leave_the_source_silent() {
        let mut output = MixerOutput::new(FakeMixer::default());
        output.submit(play(0, "broken.mp3", Vec::new()));
        assert!(!output.is_playing(SourceId(0)));
    }
}
