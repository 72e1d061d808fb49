//! Transform engine boundary and the built-in realfft implementation.
//!
//! The post-processor only talks to the traits in this module. Engines emit
//! flat `f32` buffers in time-major order (`[frame][bin]`); callers reconcile
//! shapes themselves because an engine's output length is not trusted.

use crate::error::{Result, SonoscopeError};
use crate::types::WindowKind;
use realfft::{RealFftPlanner, RealToComplex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

thread_local! {
    static FFT_PLANNER: RefCell<RealFftPlanner<f32>> = RefCell::new(RealFftPlanner::new());
    static WINDOW_CACHE: RefCell<HashMap<(usize, WindowKind), Vec<f32>>> = RefCell::new(HashMap::new());
}

/// The `(n_fft, hop_length, window)` triple a frame transform is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransformConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub window: WindowKind,
}

/// How a spectrum's values relate to signal level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbScale {
    /// `20 * log10(x)`
    Amplitude,
    /// `10 * log10(x)`
    Power,
}

impl DbScale {
    pub fn multiplier(self) -> f32 {
        match self {
            DbScale::Amplitude => 20.0,
            DbScale::Power => 10.0,
        }
    }
}

/// A configured STFT processor owned by the caller.
pub trait FrameTransform {
    fn config(&self) -> TransformConfig;

    /// Magnitude spectrum, time-major, `ceil(len / hop)` frames of `n_fft / 2 + 1` bins.
    fn process(&mut self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>>;

    fn to_db(
        &self,
        spectrum: &[f32],
        scale: DbScale,
        ref_db: f32,
        top_db: f32,
        db_min: f32,
        db_max: f32,
    ) -> Vec<f32>;
}

/// Engine-level services: processor construction and frequency remaps.
pub trait TransformEngine {
    fn create_transform(&self, config: TransformConfig) -> Result<Box<dyn FrameTransform>>;

    /// Triangular filters flattened as `[band][bin]`, `n_fft / 2 + 1` bins per band.
    fn mel_filter_bank(
        &self,
        n_bands: usize,
        n_fft: usize,
        sample_rate: u32,
        fmin: f32,
        fmax: f32,
    ) -> Vec<f32>;

    /// Resample every frame of a time-major buffer onto log-spaced bins.
    fn log_frequency_scale(
        &self,
        data: &[f32],
        n_freq_bins: usize,
        n_time_frames: usize,
        sample_rate: u32,
        n_fft: usize,
    ) -> Vec<f32>;
}

pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Convert a magnitude or power spectrum to dB.
///
/// With `ref_db == 0` the spectrum's own maximum is the 0 dB reference.
/// Values are floored at `-top_db` relative to the reference and then clamped
/// into `[db_min, db_max]`. Non-positive and non-finite inputs map to `db_min`.
pub fn spectrum_to_db(
    spectrum: &[f32],
    scale: DbScale,
    ref_db: f32,
    top_db: f32,
    db_min: f32,
    db_max: f32,
) -> Vec<f32> {
    let mult = scale.multiplier();
    let max_value = spectrum
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max);
    let reference = if ref_db == 0.0 {
        if max_value > 0.0 {
            max_value
        } else {
            1.0
        }
    } else {
        10f32.powf(ref_db / mult)
    };
    let floor = -top_db;

    spectrum
        .iter()
        .map(|&x| {
            if !(x > 0.0) || !x.is_finite() {
                return db_min;
            }
            let db = mult * (x / reference).log10();
            db.max(floor).min(db_max).max(db_min)
        })
        .collect()
}

fn build_window(size: usize, kind: WindowKind) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    let n = (size - 1) as f32;
    let two_pi = 2.0 * std::f32::consts::PI;
    (0..size)
        .map(|i| {
            let phase = two_pi * i as f32 / n;
            match kind {
                WindowKind::Hann => 0.5 * (1.0 - phase.cos()),
                WindowKind::Hamming => 0.54 - 0.46 * phase.cos(),
                WindowKind::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
            }
        })
        .collect()
}

pub fn window(size: usize, kind: WindowKind) -> Vec<f32> {
    WINDOW_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry((size, kind))
            .or_insert_with(|| build_window(size, kind))
            .clone()
    })
}

/// Frame transform backed by `realfft`.
pub struct RealFftTransform {
    config: TransformConfig,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl RealFftTransform {
    pub fn new(config: TransformConfig) -> Result<Self> {
        if config.n_fft == 0 || config.hop_length == 0 {
            return Err(SonoscopeError::InvalidParams(format!(
                "n_fft and hop_length must be positive (n_fft={}, hop_length={})",
                config.n_fft, config.hop_length
            )));
        }
        let fft = FFT_PLANNER.with(|p| p.borrow_mut().plan_fft_forward(config.n_fft));
        Ok(Self {
            window: window(config.n_fft, config.window),
            config,
            fft,
        })
    }
}

impl FrameTransform for RealFftTransform {
    fn config(&self) -> TransformConfig {
        self.config
    }

    fn process(&mut self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        let TransformConfig { n_fft, hop_length, .. } = self.config;
        let n_bins = n_fft / 2 + 1;
        let n_frames = samples.len().div_ceil(hop_length);

        // Reusable buffers, the tail frames are zero padded.
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut output = Vec::with_capacity(n_frames * n_bins);

        for frame in 0..n_frames {
            let start = frame * hop_length;
            let end = (start + n_fft).min(samples.len());
            input.fill(0.0);
            for (inp, (&s, &w)) in input
                .iter_mut()
                .zip(samples[start..end].iter().zip(self.window.iter()))
            {
                *inp = s * w;
            }
            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|e| SonoscopeError::Engine(e.to_string()))?;
            output.extend(spectrum.iter().map(|c| c.norm()));
        }

        Ok(output)
    }

    fn to_db(
        &self,
        spectrum: &[f32],
        scale: DbScale,
        ref_db: f32,
        top_db: f32,
        db_min: f32,
        db_max: f32,
    ) -> Vec<f32> {
        spectrum_to_db(spectrum, scale, ref_db, top_db, db_min, db_max)
    }
}

/// The built-in engine. Stateless apart from the thread-local FFT planner.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealFftEngine;

impl RealFftEngine {
    pub fn load() -> Result<Self> {
        Ok(RealFftEngine)
    }
}

impl TransformEngine for RealFftEngine {
    fn create_transform(&self, config: TransformConfig) -> Result<Box<dyn FrameTransform>> {
        Ok(Box::new(RealFftTransform::new(config)?))
    }

    fn mel_filter_bank(
        &self,
        n_bands: usize,
        n_fft: usize,
        sample_rate: u32,
        fmin: f32,
        fmax: f32,
    ) -> Vec<f32> {
        let n_bins = n_fft / 2 + 1;
        let mut bank = vec![0.0f32; n_bands * n_bins];
        if n_bands == 0 || n_fft == 0 || sample_rate == 0 {
            return bank;
        }

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let bin_points: Vec<usize> = (0..n_bands + 2)
            .map(|i| {
                let mel = mel_min + (mel_max - mel_min) * i as f32 / (n_bands + 1) as f32;
                let hz = mel_to_hz(mel);
                ((hz / sample_rate as f32) * n_fft as f32).floor().max(0.0) as usize
            })
            .collect();

        for band in 0..n_bands {
            let filter = &mut bank[band * n_bins..(band + 1) * n_bins];
            let (left, center, right) = (bin_points[band], bin_points[band + 1], bin_points[band + 2]);

            for bin in left..center.min(n_bins) {
                filter[bin] = (bin - left) as f32 / (center - left) as f32;
            }
            for bin in center..right.min(n_bins) {
                filter[bin] = 1.0 - (bin - center) as f32 / (right - center) as f32;
            }
            // Collapsed triangles (narrow bands at low n_fft) keep their peak.
            if center == right && center < n_bins {
                filter[center] = 1.0;
            }
        }

        bank
    }

    fn log_frequency_scale(
        &self,
        data: &[f32],
        n_freq_bins: usize,
        n_time_frames: usize,
        sample_rate: u32,
        n_fft: usize,
    ) -> Vec<f32> {
        if n_freq_bins < 2 || n_fft == 0 || sample_rate == 0 {
            return data.to_vec();
        }
        let resolution = sample_rate as f64 / n_fft as f64;
        let f_lo = resolution;
        let f_hi = (resolution * (n_freq_bins - 1) as f64).max(f_lo);
        let ratio = f_hi / f_lo;
        let last = (n_freq_bins - 1) as f64;

        // Fractional source bin for each output row.
        let positions: Vec<f64> = (0..n_freq_bins)
            .map(|i| {
                let freq = f_lo * ratio.powf(i as f64 / last);
                (freq / resolution).clamp(0.0, last)
            })
            .collect();

        let mut out = Vec::with_capacity(n_freq_bins * n_time_frames);
        for frame in 0..n_time_frames {
            let row_start = frame * n_freq_bins;
            let Some(row) = data.get(row_start..row_start + n_freq_bins) else {
                break;
            };
            for &pos in &positions {
                let lo = pos.floor() as usize;
                let hi = (lo + 1).min(n_freq_bins - 1);
                let t = (pos - lo as f64) as f32;
                out.push(row[lo] * (1.0 - t) + row[hi] * t);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn windows_have_expected_shape() {
        let hann = window(1024, WindowKind::Hann);
        assert_eq!(hann.len(), 1024);
        assert!(hann[0].abs() < 1e-3);
        assert!((hann[512] - 1.0).abs() < 0.01);
        assert!(hann[1023].abs() < 1e-3);

        let hamming = window(64, WindowKind::Hamming);
        assert!((hamming[0] - 0.08).abs() < 1e-4);

        let blackman = window(64, WindowKind::Blackman);
        assert!(blackman[0].abs() < 1e-4);
        assert_eq!(window(1, WindowKind::Blackman), vec![1.0]);
    }

    #[test]
    fn stft_frame_count_and_peak() {
        let sample_rate = 44100;
        let samples = sine(440.0, sample_rate, 44100);
        let engine = RealFftEngine::load().unwrap();
        let mut stft = engine
            .create_transform(TransformConfig {
                n_fft: 2048,
                hop_length: 512,
                window: WindowKind::Hann,
            })
            .unwrap();
        let spectrum = stft.process(&samples, sample_rate).unwrap();

        let n_bins = 1025;
        assert_eq!(spectrum.len(), 87 * n_bins);

        let frame = &spectrum[10 * n_bins..11 * n_bins];
        let peak_bin = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        let peak_freq = peak_bin as f32 * sample_rate as f32 / 2048.0;
        assert!((peak_freq - 440.0).abs() < 2.0 * 21.6, "peak at {peak_freq} Hz");
    }

    #[test]
    fn empty_input_gives_empty_spectrum() {
        let mut stft = RealFftTransform::new(TransformConfig {
            n_fft: 256,
            hop_length: 128,
            window: WindowKind::Hamming,
        })
        .unwrap();
        assert!(stft.process(&[], 8000).unwrap().is_empty());
    }

    #[test]
    fn db_uses_max_as_reference_and_clips() {
        let db = spectrum_to_db(&[1.0, 0.1, 1e-6, 0.0], DbScale::Amplitude, 0.0, 80.0, -100.0, 0.0);
        assert!(db[0].abs() < 1e-5);
        assert!((db[1] + 20.0).abs() < 1e-4);
        // -120 dB is floored at -top_db
        assert!((db[2] + 80.0).abs() < 1e-4);
        assert_eq!(db[3], -100.0);

        let power = spectrum_to_db(&[1.0, 0.1], DbScale::Power, 0.0, 80.0, -80.0, 0.0);
        assert!((power[1] + 10.0).abs() < 1e-4);
    }

    #[test]
    fn db_with_explicit_reference() {
        // 10^(20/20) = 10 is the reference, so 1.0 sits 20 dB below it.
        let db = spectrum_to_db(&[1.0, 10.0], DbScale::Amplitude, 20.0, 80.0, -80.0, 0.0);
        assert!((db[0] + 20.0).abs() < 1e-4);
        assert!(db[1].abs() < 1e-4);
    }

    #[test]
    fn mel_round_trip_and_filter_bank_shape() {
        let hz = 1000.0;
        assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.5);

        let bank = RealFftEngine.mel_filter_bank(10, 2048, 44100, 0.0, 22050.0);
        assert_eq!(bank.len(), 10 * 1025);
        for band in 0..10 {
            let filter = &bank[band * 1025..(band + 1) * 1025];
            let peak = filter.iter().copied().fold(0.0f32, f32::max);
            assert!(peak > 0.5 && peak <= 1.0, "band {band} peak {peak}");
            assert!(filter.iter().all(|&w| (0.0..=1.0).contains(&w)));
        }
    }

    #[test]
    fn log_frequency_keeps_row_count_and_endpoints() {
        let n_bins = 9;
        let frames = 3;
        let data: Vec<f32> = (0..frames)
            .flat_map(|f| (0..n_bins).map(move |b| (f * 100 + b) as f32))
            .collect();
        let out = RealFftEngine.log_frequency_scale(&data, n_bins, frames, 16, 16);
        assert_eq!(out.len(), data.len());
        for f in 0..frames {
            let row = &out[f * n_bins..(f + 1) * n_bins];
            assert!((row[0] - (f * 100 + 1) as f32).abs() < 1e-4);
            assert!((row[n_bins - 1] - (f * 100 + n_bins - 1) as f32).abs() < 1e-3);
            assert!(row.windows(2).all(|w| w[1] >= w[0]));
        }
    }
}
