use leptos::prelude::*;
use sonoscope_core::{RenderOptions, Spectrogram, StftParams};
use std::sync::Arc;

/// What a click on the overlay does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Select,
    Text,
    Arrow,
    Rectangle,
}

/// Reactive UI state shared through context. Non-`Send` objects (renderer,
/// annotation store, worker) live in [`crate::session`].
#[derive(Clone, Copy)]
pub struct AppState {
    pub spectrogram: RwSignal<Option<Arc<Spectrogram>>>,
    pub render_options: RwSignal<RenderOptions>,
    pub stft_params: RwSignal<StftParams>,
    pub status: RwSignal<String>,
    pub busy: RwSignal<bool>,
    pub mic_listening: RwSignal<bool>,
    pub tool: RwSignal<Tool>,
    pub annotation_text: RwSignal<String>,
    pub annotation_color: RwSignal<String>,
    /// Bumped on every annotation store change so the overlay re-mirrors.
    pub annotations_version: RwSignal<u64>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            spectrogram: RwSignal::new(None),
            render_options: RwSignal::new(RenderOptions::default()),
            stft_params: RwSignal::new(StftParams::default()),
            status: RwSignal::new(String::from("Open an audio file or start the microphone")),
            busy: RwSignal::new(false),
            mic_listening: RwSignal::new(false),
            tool: RwSignal::new(Tool::Select),
            annotation_text: RwSignal::new(String::from("Note")),
            annotation_color: RwSignal::new(String::from("#ff3b30")),
            annotations_version: RwSignal::new(0),
        }
    }
}
