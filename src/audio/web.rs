use std::{cell::RefCell, rc::Rc};

use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AudioBufferSourceNode, AudioContext, GainNode};

use crate::resources::AudioBuffer;

use super::playback::{Mixer, Voice};

fn js_error(e: wasm_bindgen::JsValue) -> anyhow::Error {
    anyhow::anyhow!("{e:?}")
}

/// A Web Audio context; each voice is a buffer source feeding its own gain node.
pub struct WebMixer {
    context: AudioContext,
}

impl WebMixer {
    pub fn new() -> anyhow::Result<Self> {
        let context = AudioContext::new().map_err(js_error)?;
        Ok(Self { context })
    }
}

#[derive(Default)]
struct Playing {
    source: Option<AudioBufferSourceNode>,
    stopped: bool,
}

/// Decoding is asynchronous, so the source node arrives after the voice is
/// handed out. A voice stopped before then never starts.
pub struct WebVoice {
    gain: GainNode,
    playing: Rc<RefCell<Playing>>,
}

impl Mixer for WebMixer {
    type Voice = WebVoice;

    fn start(&mut self, buffer: &AudioBuffer, looping: bool, gain: f32) -> anyhow::Result<WebVoice> {
        // browsers keep a context suspended until the page saw a user gesture
        let _ = self.context.resume();

        let gain_node = self.context.create_gain().map_err(js_error)?;
        gain_node.gain().set_value(gain);
        gain_node
            .connect_with_audio_node(&self.context.destination())
            .map_err(js_error)?;

        let bytes = js_sys::Uint8Array::from(&buffer.bytes[..]);
        let decoding = self
            .context
            .decode_audio_data(&bytes.buffer())
            .map_err(js_error)?;

        let playing = Rc::new(RefCell::new(Playing::default()));
        let context = self.context.clone();
        let output = gain_node.clone();
        let state = playing.clone();
        let name = buffer.name.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let decoded = match JsFuture::from(decoding).await {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::error!("failed to decode {name}: {e:?}");
                    return;
                }
            };
            let Ok(decoded) = decoded.dyn_into::<web_sys::AudioBuffer>() else {
                log::error!("{name} did not decode to an audio buffer");
                return;
            };
            if state.borrow().stopped {
                return;
            }
            let started = context.create_buffer_source().and_then(|source| {
                source.set_buffer(Some(&decoded));
                source.set_loop(looping);
                source.connect_with_audio_node(&output)?;
                source.start()?;
                Ok(source)
            });
            match started {
                Ok(source) => state.borrow_mut().source = Some(source),
                Err(e) => log::error!("failed to start {name}: {e:?}"),
            }
        });

        Ok(WebVoice {
            gain: gain_node,
            playing,
        })
    }
}

impl Voice for WebVoice {
    fn set_gain(&mut self, gain: f32) {
        self.gain.gain().set_value(gain);
    }

    fn stop(&mut self) {
        let mut playing = self.playing.borrow_mut();
        playing.stopped = true;
        if let Some(source) = playing.source.take() {
            if let Err(e) = source.stop() {
                log::warn!("failed to stop a source: {e:?}");
            }
        }
        let _ = self.gain.disconnect();
    }
}
