use crate::session;
use crate::state::AppState;
use leptos::prelude::*;
use sonoscope_core::audio::{AudioStream, StreamingInput};
use sonoscope_core::AudioSamples;
use std::cell::RefCell;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::AudioContext;

/// Longest capture kept; older samples are dropped first.
const MAX_CAPTURE_SECS: f64 = 30.0;
const BLOCK_SIZE: u32 = 4096;

thread_local! {
    static MIC_CTX: RefCell<Option<AudioContext>> = RefCell::new(None);
    static MIC_STREAM: RefCell<Option<web_sys::MediaStream>> = RefCell::new(None);
    static MIC_PROCESSOR: RefCell<Option<web_sys::ScriptProcessorNode>> = RefCell::new(None);
    static MIC_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::AudioProcessingEvent)>>> = RefCell::new(None);
    static MIC_INPUT: RefCell<Option<StreamingInput>> = RefCell::new(None);
    static CAPTURE: RefCell<Vec<f32>> = RefCell::new(Vec::new());
}

pub async fn toggle_listen(state: &AppState) {
    if state.mic_listening.get_untracked() {
        disarm(state);
    } else {
        arm(state).await;
    }
}

/// Request microphone permission and start capturing. The spectrogram is
/// computed once, when [`disarm`] stops the capture.
pub async fn arm(state: &AppState) {
    let window = match web_sys::window() {
        Some(w) => w,
        None => {
            log::error!("No window object");
            return;
        }
    };
    let media_devices = match window.navigator().media_devices() {
        Ok(md) => md,
        Err(e) => {
            log::error!("No media devices: {:?}", e);
            state.status.set("Microphone capture is not supported here".into());
            return;
        }
    };

    let constraints = web_sys::MediaStreamConstraints::new();
    constraints.set_audio(&JsValue::TRUE);

    let promise = match media_devices.get_user_media_with_constraints(&constraints) {
        Ok(p) => p,
        Err(e) => {
            log::error!("getUserMedia failed: {:?}", e);
            return;
        }
    };

    let stream: web_sys::MediaStream = match JsFuture::from(promise).await.map(|s| s.dyn_into()) {
        Ok(Ok(s)) => s,
        Ok(Err(_)) => {
            log::error!("Failed to cast MediaStream");
            return;
        }
        Err(e) => {
            log::error!("Mic permission denied: {:?}", e);
            state.status.set("Microphone permission denied".into());
            return;
        }
    };

    let ctx = match AudioContext::new() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to create AudioContext: {:?}", e);
            return;
        }
    };
    let sample_rate = ctx.sample_rate() as u32;

    let mut input = match StreamingInput::new(sample_rate) {
        Ok(i) => i,
        Err(e) => {
            session::report(*state, e);
            return;
        }
    };
    let state_cb = *state;
    let max_len = (MAX_CAPTURE_SECS * sample_rate as f64) as usize;
    input.add_listener(Box::new(move |chunk: &AudioSamples| {
        let captured = CAPTURE.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.extend_from_slice(chunk.samples());
            if buf.len() > max_len {
                let excess = buf.len() - max_len;
                buf.drain(..excess);
            }
            buf.len()
        });
        let secs = captured as f64 / chunk.sample_rate() as f64;
        state_cb.status.set(format!("Listening... {:.1}s", secs));
    }));

    let source = match ctx.create_media_stream_source(&stream) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to create MediaStreamSource: {:?}", e);
            return;
        }
    };
    let processor = match ctx.create_script_processor_with_buffer_size_and_number_of_input_channels_and_number_of_output_channels(BLOCK_SIZE, 1, 1) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Failed to create ScriptProcessorNode: {:?}", e);
            return;
        }
    };
    if let Err(e) = source.connect_with_audio_node(&processor) {
        log::error!("Failed to connect source -> processor: {:?}", e);
        return;
    }
    // The node only runs while connected to a destination; its output stays silent.
    if let Err(e) = processor.connect_with_audio_node(&ctx.destination()) {
        log::error!("Failed to connect processor -> destination: {:?}", e);
        return;
    }

    let handler = Closure::<dyn FnMut(web_sys::AudioProcessingEvent)>::new(
        move |ev: web_sys::AudioProcessingEvent| {
            let Ok(input_buffer) = ev.input_buffer() else { return };
            let Ok(samples) = input_buffer.get_channel_data(0) else { return };
            MIC_INPUT.with(|i| {
                if let Some(input) = i.borrow_mut().as_mut() {
                    if let Err(e) = input.push_chunk(samples) {
                        log::warn!("Dropped mic block: {e}");
                    }
                }
            });
        },
    );
    processor.set_onaudioprocess(Some(handler.as_ref().unchecked_ref()));

    if let Err(e) = input.start() {
        session::report(*state, e);
        return;
    }

    CAPTURE.with(|buf| buf.borrow_mut().clear());
    MIC_INPUT.with(|i| *i.borrow_mut() = Some(input));
    MIC_CTX.with(|c| *c.borrow_mut() = Some(ctx));
    MIC_STREAM.with(|s| *s.borrow_mut() = Some(stream));
    MIC_PROCESSOR.with(|p| *p.borrow_mut() = Some(processor));
    MIC_HANDLER.with(|h| *h.borrow_mut() = Some(handler));

    state.mic_listening.set(true);
    state.status.set(format!("Listening at {} Hz", sample_rate));
    log::info!("Mic armed at {} Hz", sample_rate);
}

/// Stop all tracks, drop the processor and close the context, then show
/// the captured audio.
pub fn disarm(state: &AppState) {
    let sample_rate = MIC_INPUT.with(|i| {
        i.borrow_mut().take().map(|mut input| {
            input.stop();
            input.sample_rate()
        })
    });

    MIC_STREAM.with(|s| {
        if let Some(stream) = s.borrow_mut().take() {
            let tracks = stream.get_tracks();
            for i in 0..tracks.length() {
                if let Ok(track) = tracks.get(i).dyn_into::<web_sys::MediaStreamTrack>() {
                    track.stop();
                }
            }
        }
    });

    MIC_PROCESSOR.with(|p| {
        if let Some(proc) = p.borrow_mut().take() {
            proc.set_onaudioprocess(None);
            let _ = proc.disconnect();
        }
    });

    MIC_HANDLER.with(|h| {
        h.borrow_mut().take();
    });

    MIC_CTX.with(|c| {
        if let Some(ctx) = c.borrow_mut().take() {
            let _ = ctx.close();
        }
    });

    state.mic_listening.set(false);
    log::info!("Mic disarmed");

    let samples = CAPTURE.with(|buf| std::mem::take(&mut *buf.borrow_mut()));
    let Some(sample_rate) = sample_rate else { return };
    if samples.is_empty() {
        state.status.set("Nothing was captured".into());
        return;
    }
    match AudioSamples::new(samples, sample_rate) {
        Ok(audio) => {
            if session::show_audio(&audio, *state) {
                state.status.set(format!(
                    "Microphone: {:.2}s at {} Hz",
                    audio.duration_secs(),
                    sample_rate
                ));
            }
        }
        Err(e) => session::report(*state, e),
    }
}
