use crate::session;
use crate::state::AppState;
use leptos::prelude::*;
use sonoscope_core::audio::{AudioInput, FileAudioInput};
use sonoscope_core::SonoscopeError;
use wasm_bindgen_futures::JsFuture;

/// Read a picked file, decode it and show its spectrogram.
pub async fn load_file(file: web_sys::File, state: AppState) {
    let name = file.name();
    state.busy.set(true);
    state.status.set(format!("Loading {name}..."));

    let bytes = match JsFuture::from(file.array_buffer()).await {
        Ok(buffer) => js_sys::Uint8Array::new(&buffer).to_vec(),
        Err(e) => {
            session::report(state, SonoscopeError::Decode(format!("cannot read {name}: {e:?}")));
            state.busy.set(false);
            return;
        }
    };

    let mut input = FileAudioInput::new();
    input.set_file(name.clone(), bytes);
    match input.load_audio() {
        Ok(audio) => {
            if session::show_audio(&audio, state) {
                state.status.set(format!(
                    "{name}: {:.2}s at {} Hz",
                    audio.duration_secs(),
                    audio.sample_rate()
                ));
            }
        }
        Err(e) => session::report(state, e),
    }
    state.busy.set(false);
}
