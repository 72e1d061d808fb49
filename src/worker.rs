//! Entry point for running the STFT pipeline inside a dedicated Web Worker.
//!
//! The worker script instantiates a [`WorkerHost`] and forwards each
//! `message` event's JSON string to [`WorkerHost::handle`], posting the
//! returned string back to the page.

use sonoscope_core::worker::StftWorker;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WorkerHost {
    inner: StftWorker,
}

#[wasm_bindgen]
impl WorkerHost {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WorkerHost {
        WorkerHost {
            inner: StftWorker::default(),
        }
    }

    /// Handle one `{type, payload}` request and return the reply.
    pub fn handle(&mut self, request: &str) -> String {
        self.inner.handle_json(request)
    }
}

impl Default for WorkerHost {
    fn default() -> Self {
        Self::new()
    }
}
