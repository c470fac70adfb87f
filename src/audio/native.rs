use std::io::Cursor;

use anyhow::Context as _;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::resources::AudioBuffer;

use super::playback::{Mixer, Voice};

/// The default output device. Every voice is a sink of its own.
pub struct RodioMixer {
    // playback ends when the stream is dropped
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioMixer {
    pub fn open() -> anyhow::Result<Self> {
        let (stream, handle) = OutputStream::try_default().context("failed to open the audio device")?;
        log::info!("audio device opened");
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl Mixer for RodioMixer {
    type Voice = Sink;

    fn start(&mut self, buffer: &AudioBuffer, looping: bool, gain: f32) -> anyhow::Result<Sink> {
        let decoder = Decoder::new(Cursor::new(buffer.bytes.clone()))
            .with_context(|| format!("failed to decode {}", buffer.name))?;
        let sink = Sink::try_new(&self.handle)?;
        sink.set_volume(gain);
        if looping {
            sink.append(decoder.repeat_infinite());
        } else {
            sink.append(decoder);
        }
        Ok(sink)
    }
}

impl Voice for Sink {
    fn set_gain(&mut self, gain: f32) {
        self.set_volume(gain);
    }

    fn stop(&mut self) {
        Sink::stop(self);
    }
}
