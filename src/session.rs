//! Per-page objects that cannot live in signals: the raster renderer bound to
//! the visible canvas, the annotation store and overlay, the drag controller
//! and the STFT worker.

use crate::canvas::web_canvas::WebCanvas;
use crate::state::AppState;
use leptos::prelude::*;
use sonoscope_core::annotation::drag::DragController;
use sonoscope_core::annotation::store::AnnotationStore;
use sonoscope_core::annotation::vector::VectorLayer;
use sonoscope_core::render::raster::RasterRenderer;
use sonoscope_core::worker::{
    into_spectrogram, AudioPayload, ProcessPayload, StftWorker, WorkerMessage,
};
use sonoscope_core::{AudioSamples, Result, SonoscopeError, Spectrogram, StftParams};
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    pub static RENDERER: RefCell<Option<RasterRenderer<WebCanvas>>> = RefCell::new(None);
    pub static OVERLAY: RefCell<VectorLayer> = RefCell::new(VectorLayer::default());
    pub static STORE: RefCell<AnnotationStore> = RefCell::new(AnnotationStore::new());
    pub static DRAG: RefCell<DragController> = RefCell::new(DragController::new());
    static WORKER: RefCell<StftWorker> = RefCell::new(StftWorker::default());
}

/// Keep the overlay and the renderer's copy in step with the store.
pub fn connect_store(state: AppState) {
    STORE.with(|store| {
        store.borrow_mut().subscribe(move |store| {
            let all = store.annotations();
            OVERLAY.with(|layer| layer.borrow_mut().sync(all.iter().copied()));
            RENDERER.with(|r| {
                if let Some(renderer) = r.borrow_mut().as_mut() {
                    renderer.sync_annotations(all.iter().copied());
                    renderer.rerender();
                }
            });
            state.annotations_version.update(|v| *v += 1);
        });
    });
}

/// Bind the renderer to `canvas` on first use.
pub fn ensure_renderer(canvas: &web_sys::HtmlCanvasElement) -> bool {
    RENDERER.with(|r| {
        let mut slot = r.borrow_mut();
        if slot.is_some() {
            return true;
        }
        match WebCanvas::new(canvas.clone()) {
            Ok(surface) => {
                let mut renderer = RasterRenderer::new(surface);
                STORE.with(|s| renderer.sync_annotations(s.borrow().annotations()));
                *slot = Some(renderer);
                true
            }
            Err(e) => {
                log::error!("Canvas unavailable: {e}");
                false
            }
        }
    })
}

/// Round-trip one request through the worker protocol.
pub fn compute_spectrogram(audio: &AudioSamples, params: &StftParams) -> Result<Spectrogram> {
    let request = WorkerMessage::Process(ProcessPayload {
        audio_buffer: AudioPayload {
            samples: audio.samples().to_vec(),
            sample_rate: audio.sample_rate(),
        },
        params: params.clone(),
    });
    let request = serde_json::to_string(&request)?;
    let reply = WORKER.with(|w| w.borrow_mut().handle_json(&request));
    let reply: WorkerMessage = serde_json::from_str(&reply)?;
    into_spectrogram(reply)
}

/// Process `audio` with the current parameters and publish the result.
/// Returns false if the failure was reported instead.
pub fn show_audio(audio: &AudioSamples, state: AppState) -> bool {
    let params = state.stft_params.get_untracked();
    match compute_spectrogram(audio, &params) {
        Ok(spectrogram) => {
            log::info!(
                "Spectrogram {}x{} ({:.2}s)",
                spectrogram.n_freq_bins(),
                spectrogram.n_time_frames(),
                spectrogram.duration()
            );
            // Annotations belong to the audio they were drawn on
            STORE.with(|s| s.borrow_mut().clear());
            state.spectrogram.set(Some(Arc::new(spectrogram)));
            true
        }
        Err(e) => {
            report(state, e);
            false
        }
    }
}

pub fn report(state: AppState, error: SonoscopeError) {
    log::error!("{error}");
    state.status.set(error.to_string());
}
