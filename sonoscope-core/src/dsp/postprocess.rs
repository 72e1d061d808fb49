//! Spectral post-processing: engine orchestration, dB referencing, frequency
//! remaps, shape reconciliation and the time-major to frequency-major flip.

use crate::dsp::engine::{
    spectrum_to_db, DbScale, FrameTransform, RealFftEngine, TransformConfig, TransformEngine,
};
use crate::error::{Result, SonoscopeError};
use crate::types::{AudioSamples, MagnitudeKind, Spectrogram, StftParams};
use std::cell::OnceCell;
use std::rc::Rc;

/// Lazily initialised engine slot.
///
/// The engine is loaded at most once per handle; every processor built from
/// the handle shares that instance. A failed load leaves the slot empty so a
/// later call may try again.
#[derive(Default)]
pub struct EngineHandle {
    engine: OnceCell<Rc<dyn TransformEngine>>,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that is already initialised with `engine`.
    pub fn with_engine(engine: Rc<dyn TransformEngine>) -> Self {
        let handle = Self::new();
        let _ = handle.engine.set(engine);
        handle
    }

    pub fn get(&self) -> Option<Rc<dyn TransformEngine>> {
        self.engine.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.get().is_some()
    }

    pub fn get_or_load<F>(&self, load: F) -> Result<Rc<dyn TransformEngine>>
    where
        F: FnOnce() -> Result<Rc<dyn TransformEngine>>,
    {
        if let Some(engine) = self.engine.get() {
            return Ok(engine.clone());
        }
        let engine = load()?;
        log::info!("Transform engine loaded");
        Ok(self.engine.get_or_init(|| engine).clone())
    }

    /// Load the built-in realfft engine if nothing is loaded yet.
    pub fn load_default(&self) -> Result<Rc<dyn TransformEngine>> {
        self.get_or_load(|| Ok(Rc::new(RealFftEngine::load()?)))
    }
}

/// Thresholds and remap bounds that are tuned rather than derived.
#[derive(Clone, Debug, PartialEq)]
pub struct PostProcessConfig {
    /// Engine dB output whose finite spread is below this is recomputed locally.
    pub degenerate_tolerance: f32,
    pub mel_fmin: f32,
    /// Upper mel edge, `None` means Nyquist.
    pub mel_fmax: Option<f32>,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            degenerate_tolerance: 1e-3,
            mel_fmin: 0.0,
            mel_fmax: None,
        }
    }
}

pub struct SpectralProcessor {
    engine: Rc<dyn TransformEngine>,
    transform: Option<Box<dyn FrameTransform>>,
    config: PostProcessConfig,
}

impl SpectralProcessor {
    /// Fails with `EngineUnavailable` if the handle was never loaded.
    pub fn new(handle: &EngineHandle, config: PostProcessConfig) -> Result<Self> {
        let engine = handle.get().ok_or_else(|| {
            SonoscopeError::EngineUnavailable("engine handle has not been loaded".into())
        })?;
        Ok(Self {
            engine,
            transform: None,
            config,
        })
    }

    pub fn config(&self) -> &PostProcessConfig {
        &self.config
    }

    /// Config of the cached frame transform, if one exists.
    pub fn cached_transform(&self) -> Option<TransformConfig> {
        self.transform.as_ref().map(|t| t.config())
    }

    fn transform_for(&mut self, wanted: TransformConfig) -> Result<&mut Box<dyn FrameTransform>> {
        let stale = self.transform.as_ref().map(|t| t.config() != wanted).unwrap_or(true);
        if stale {
            log::debug!(
                "Creating frame transform: n_fft={} hop={} window={:?}",
                wanted.n_fft,
                wanted.hop_length,
                wanted.window
            );
            self.transform = Some(self.engine.create_transform(wanted)?);
        }
        self.transform
            .as_mut()
            .ok_or_else(|| SonoscopeError::Engine("frame transform missing after creation".into()))
    }

    pub fn process(&mut self, samples: &AudioSamples, params: &StftParams) -> Result<Spectrogram> {
        params.validate()?;
        if samples.is_empty() {
            return Err(SonoscopeError::InvalidParams("no samples to process".into()));
        }
        let sample_rate = samples.sample_rate();
        let remap_rate = params.sample_rate.unwrap_or(sample_rate);

        let wanted = TransformConfig {
            n_fft: params.n_fft,
            hop_length: params.hop_length,
            window: params.window,
        };
        let transform = self.transform_for(wanted)?;
        let mut spectrum = transform.process(samples.samples(), sample_rate)?;

        let scale = match params.magnitude {
            MagnitudeKind::Magnitude => DbScale::Amplitude,
            MagnitudeKind::Power => {
                for v in spectrum.iter_mut() {
                    *v *= *v;
                }
                DbScale::Power
            }
        };

        let mut db = transform.to_db(
            &spectrum,
            scale,
            params.ref_db,
            params.top_db,
            params.db_min,
            params.db_max,
        );
        if let Some(spread) = degenerate_spread(&db, self.config.degenerate_tolerance) {
            log::warn!(
                "Engine dB output is degenerate (spread {spread:?}), recomputing from the spectrum"
            );
            // Reference the data's own maximum: a caller reference may be what saturated it.
            db = spectrum_to_db(
                &spectrum,
                scale,
                0.0,
                params.top_db,
                params.db_min,
                params.db_max,
            );
        }

        let n_freq_bins = params.n_freq_bins();
        let n_time_frames = samples.len().div_ceil(params.hop_length);

        let (remapped, final_bins) = match params.mel_bands {
            Some(n_bands) => {
                let fmax = self.config.mel_fmax.unwrap_or(remap_rate as f32 / 2.0);
                let bank = self.engine.mel_filter_bank(
                    n_bands,
                    params.n_fft,
                    remap_rate,
                    self.config.mel_fmin,
                    fmax,
                );
                let mel = apply_mel_filter_bank(
                    &db,
                    &bank,
                    n_freq_bins,
                    n_bands,
                    n_time_frames,
                    params.db_min,
                );
                (mel, n_bands)
            }
            None if params.log_frequency => {
                let remapped = self.engine.log_frequency_scale(
                    &db,
                    n_freq_bins,
                    n_time_frames,
                    remap_rate,
                    params.n_fft,
                );
                (remapped, n_freq_bins)
            }
            None => (db, n_freq_bins),
        };

        let time_major = reconcile_shape(remapped, final_bins * n_time_frames, params.db_min);
        let data = time_major_to_freq_major(&time_major, final_bins, n_time_frames);

        Spectrogram::new(
            data,
            final_bins,
            n_time_frames,
            sample_rate,
            params.n_fft,
            params.hop_length,
        )
    }
}

/// `Some(spread)` when a dB buffer should not be trusted: empty, containing
/// non-finite values, or with all values within `tolerance` of each other.
/// `spread` is `None` for the empty/non-finite cases.
pub fn degenerate_spread(db: &[f32], tolerance: f32) -> Option<Option<f32>> {
    if db.is_empty() || db.iter().any(|v| !v.is_finite()) {
        return Some(None);
    }
    let (min, max) = db
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let spread = max - min;
    if spread < tolerance {
        Some(Some(spread))
    } else {
        None
    }
}

/// Weighted sum of each frame's dB values through every mel filter.
///
/// Input and output are time-major. Missing input cells read as `fill`, and
/// a band whose filter has no weights gets `fill`.
pub fn apply_mel_filter_bank(
    db: &[f32],
    bank: &[f32],
    n_freq_bins: usize,
    n_bands: usize,
    n_time_frames: usize,
    fill: f32,
) -> Vec<f32> {
    let bank_bins = if n_bands == 0 { 0 } else { bank.len() / n_bands };
    let usable_bins = n_freq_bins.min(bank_bins);

    let filters: Vec<&[f32]> = (0..n_bands)
        .map(|m| &bank[m * bank_bins..m * bank_bins + usable_bins])
        .collect();

    let mut out = Vec::with_capacity(n_bands * n_time_frames);
    for t in 0..n_time_frames {
        let frame_start = t * n_freq_bins;
        for &filter in &filters {
            if filter.iter().all(|&w| w == 0.0) {
                out.push(fill);
                continue;
            }
            let sum: f32 = filter
                .iter()
                .enumerate()
                .filter(|&(_, &w)| w != 0.0)
                .map(|(f, &w)| db.get(frame_start + f).copied().unwrap_or(fill) * w)
                .sum();
            out.push(sum);
        }
    }
    out
}

/// Force `data` to exactly `expected` cells; missing cells are `fill`.
pub fn reconcile_shape(data: Vec<f32>, expected: usize, fill: f32) -> Vec<f32> {
    if data.len() == expected {
        return data;
    }
    log::debug!("Reconciling spectrum length {} -> {}", data.len(), expected);
    let mut corrected = vec![fill; expected];
    let n = data.len().min(expected);
    corrected[..n].copy_from_slice(&data[..n]);
    corrected
}

/// `[frame][bin]` to `[bin][frame]`.
pub fn time_major_to_freq_major(data: &[f32], n_bins: usize, n_frames: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; n_bins * n_frames];
    for frame in 0..n_frames {
        for bin in 0..n_bins {
            out[bin * n_frames + frame] = data[frame * n_bins + bin];
        }
    }
    out
}
