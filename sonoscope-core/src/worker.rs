//! Message protocol for running spectral processing off the UI thread.
//!
//! Every message is an envelope `{ "type": ..., "payload": ... }`. The UI
//! sends `init` and `process`; the worker answers `ready`, `result` or
//! `error`.

use crate::dsp::postprocess::{EngineHandle, PostProcessConfig, SpectralProcessor};
use crate::error::{Result, SonoscopeError};
use crate::types::{AudioSamples, Spectrogram, StftParams};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioPayload {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPayload {
    pub audio_buffer: AudioPayload,
    pub params: StftParams,
}

/// Flat, frequency-major spectrogram as it crosses the worker boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrogramPayload {
    pub data: Vec<f32>,
    pub n_freq_bins: usize,
    pub n_time_frames: usize,
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
}

impl From<&Spectrogram> for SpectrogramPayload {
    fn from(s: &Spectrogram) -> Self {
        Self {
            data: s.data().to_vec(),
            n_freq_bins: s.n_freq_bins(),
            n_time_frames: s.n_time_frames(),
            sample_rate: s.sample_rate(),
            n_fft: s.n_fft(),
            hop_length: s.hop_length(),
        }
    }
}

impl TryFrom<SpectrogramPayload> for Spectrogram {
    type Error = SonoscopeError;

    fn try_from(p: SpectrogramPayload) -> Result<Self> {
        Spectrogram::new(
            p.data,
            p.n_freq_bins,
            p.n_time_frames,
            p.sample_rate,
            p.n_fft,
            p.hop_length,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum WorkerMessage {
    Init,
    Process(ProcessPayload),
    Ready,
    Result(SpectrogramPayload),
    Error(String),
}

/// Worker-side state: the engine slot and a processor built on first use.
pub struct StftWorker {
    handle: EngineHandle,
    processor: Option<SpectralProcessor>,
    config: PostProcessConfig,
}

impl Default for StftWorker {
    fn default() -> Self {
        Self::new(EngineHandle::new(), PostProcessConfig::default())
    }
}

impl StftWorker {
    pub fn new(handle: EngineHandle, config: PostProcessConfig) -> Self {
        Self {
            handle,
            processor: None,
            config,
        }
    }

    fn processor(&mut self) -> Result<&mut SpectralProcessor> {
        if self.processor.is_none() {
            self.handle.load_default()?;
            self.processor = Some(SpectralProcessor::new(&self.handle, self.config.clone())?);
        }
        self.processor
            .as_mut()
            .ok_or_else(|| SonoscopeError::EngineUnavailable("processor missing".into()))
    }

    /// Handle one request. Failures become `error` replies.
    pub fn handle(&mut self, message: WorkerMessage) -> WorkerMessage {
        let reply = match message {
            WorkerMessage::Init => self.processor().map(|_| WorkerMessage::Ready),
            WorkerMessage::Process(payload) => self.process(payload),
            other => Err(SonoscopeError::Protocol(format!(
                "Unknown message type: {}",
                message_type(&other)
            ))),
        };
        reply.unwrap_or_else(|e| {
            log::error!("Worker request failed: {e}");
            WorkerMessage::Error(e.to_string())
        })
    }

    fn process(&mut self, payload: ProcessPayload) -> Result<WorkerMessage> {
        let audio = AudioSamples::new(payload.audio_buffer.samples, payload.audio_buffer.sample_rate)?;
        let spectrogram = self.processor()?.process(&audio, &payload.params)?;
        Ok(WorkerMessage::Result(SpectrogramPayload::from(&spectrogram)))
    }

    /// JSON in, JSON out. Unparseable input is answered with an `error`.
    pub fn handle_json(&mut self, request: &str) -> String {
        let reply = match serde_json::from_str::<WorkerMessage>(request) {
            Ok(message) => self.handle(message),
            Err(e) => WorkerMessage::Error(SonoscopeError::from(e).to_string()),
        };
        serde_json::to_string(&reply).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","payload":"{}"}}"#, e.to_string().replace('"', "'"))
        })
    }
}

fn message_type(message: &WorkerMessage) -> &'static str {
    match message {
        WorkerMessage::Init => "init",
        WorkerMessage::Process(_) => "process",
        WorkerMessage::Ready => "ready",
        WorkerMessage::Result(_) => "result",
        WorkerMessage::Error(_) => "error",
    }
}

/// UI-side decoding of a worker reply.
pub fn into_spectrogram(reply: WorkerMessage) -> Result<Spectrogram> {
    match reply {
        WorkerMessage::Result(payload) => Spectrogram::try_from(payload),
        WorkerMessage::Error(msg) => Err(SonoscopeError::Engine(msg)),
        other => Err(SonoscopeError::Protocol(format!(
            "expected a result, got {}",
            message_type(&other)
        ))),
    }
}
