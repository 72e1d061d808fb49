use crate::error::{Result, SonoscopeError};
use crate::render::colormap::Colormap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mono audio as produced by the decode/capture layer.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSamples {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl AudioSamples {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SonoscopeError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            samples: Arc::new(samples),
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Dense spectrogram matrix, frequency-major:
/// `data[bin * n_time_frames + frame]`.
///
/// Never mutated after construction. Every pre-pass or remap produces a new
/// value so a render pass can hold one stable snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrogram {
    data: Vec<f32>,
    n_freq_bins: usize,
    n_time_frames: usize,
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
}

impl Spectrogram {
    pub fn new(
        data: Vec<f32>,
        n_freq_bins: usize,
        n_time_frames: usize,
        sample_rate: u32,
        n_fft: usize,
        hop_length: usize,
    ) -> Result<Self> {
        if n_freq_bins == 0 || n_time_frames == 0 {
            return Err(SonoscopeError::InvalidDimensions {
                freq_bins: n_freq_bins,
                time_frames: n_time_frames,
            });
        }
        let expected = n_freq_bins * n_time_frames;
        if data.len() != expected {
            return Err(SonoscopeError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        if sample_rate == 0 {
            return Err(SonoscopeError::InvalidSampleRate(sample_rate));
        }
        if n_fft == 0 || hop_length == 0 {
            return Err(SonoscopeError::InvalidParams(format!(
                "n_fft and hop_length must be positive (n_fft={n_fft}, hop_length={hop_length})"
            )));
        }
        Ok(Self {
            data,
            n_freq_bins,
            n_time_frames,
            sample_rate,
            n_fft,
            hop_length,
        })
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn n_freq_bins(&self) -> usize {
        self.n_freq_bins
    }

    pub fn n_time_frames(&self) -> usize {
        self.n_time_frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Value at `(bin, frame)`, or 0.0 for any out-of-range coordinate.
    pub fn value(&self, bin: isize, frame: isize) -> f32 {
        if bin < 0 || frame < 0 {
            return 0.0;
        }
        let (bin, frame) = (bin as usize, frame as usize);
        if bin >= self.n_freq_bins || frame >= self.n_time_frames {
            return 0.0;
        }
        self.data[bin * self.n_time_frames + frame]
    }

    /// Seconds between the first and last frame.
    pub fn duration(&self) -> f64 {
        (self.n_time_frames - 1) as f64 * self.hop_length as f64 / self.sample_rate as f64
    }

    /// Hz per linear bin.
    pub fn frequency_resolution(&self) -> f64 {
        self.sample_rate as f64 / self.n_fft as f64
    }

    pub fn frequency_of(&self, bin: f64) -> f64 {
        bin * self.sample_rate as f64 / self.n_fft as f64
    }

    pub fn time_of(&self, frame: f64) -> f64 {
        frame * self.hop_length as f64 / self.sample_rate as f64
    }

    /// Finite (min, max) over the matrix, `None` when nothing is finite.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in self.data.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
        if min.is_finite() && max.is_finite() {
            Some((min, max))
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Hann,
    Hamming,
    Blackman,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagnitudeKind {
    #[default]
    Magnitude,
    Power,
}

/// Inputs to one post-processing call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StftParams {
    pub n_fft: usize,
    pub hop_length: usize,
    pub window: WindowKind,
    pub magnitude: MagnitudeKind,
    pub db_min: f32,
    pub db_max: f32,
    /// 0 uses the signal's own maximum as the 0 dB reference.
    pub ref_db: f32,
    /// Width of the clip window below the reference.
    pub top_db: f32,
    /// Band count for a mel remap. Takes priority over `log_frequency`.
    pub mel_bands: Option<usize>,
    pub log_frequency: bool,
    /// Overrides the sample rate of the input for frequency remaps.
    pub sample_rate: Option<u32>,
}

impl Default for StftParams {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            window: WindowKind::Hann,
            magnitude: MagnitudeKind::Magnitude,
            db_min: -80.0,
            db_max: 0.0,
            ref_db: 0.0,
            top_db: 80.0,
            mel_bands: None,
            log_frequency: false,
            sample_rate: None,
        }
    }
}

impl StftParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_fft == 0 || self.hop_length == 0 {
            return Err(SonoscopeError::InvalidParams(format!(
                "n_fft and hop_length must be positive (n_fft={}, hop_length={})",
                self.n_fft, self.hop_length
            )));
        }
        if !(self.db_min < self.db_max) {
            return Err(SonoscopeError::InvalidParams(format!(
                "db_min ({}) must be below db_max ({})",
                self.db_min, self.db_max
            )));
        }
        if self.top_db < 0.0 || !self.top_db.is_finite() {
            return Err(SonoscopeError::InvalidParams(format!(
                "top_db must be a non-negative finite width, got {}",
                self.top_db
            )));
        }
        if self.mel_bands == Some(0) {
            return Err(SonoscopeError::InvalidParams("mel_bands must be positive".into()));
        }
        Ok(())
    }

    /// Expected linear bin count for this transform size.
    pub fn n_freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }
}

/// Display settings for one render pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub colormap: Colormap,
    pub brightness: f32,
    pub contrast: f32,
    pub gamma: f32,
    pub show_axes: bool,
    pub show_colorbar: bool,
    pub db_min: f32,
    pub db_max: f32,
    /// Blend weight of the 3x3 blur, 0 disables.
    pub smoothing: f32,
    pub oversample: bool,
    pub time_min: Option<f64>,
    pub time_max: Option<f64>,
    pub freq_min: Option<f64>,
    pub freq_max: Option<f64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            colormap: Colormap::Viridis,
            brightness: 1.0,
            contrast: 1.0,
            gamma: 1.0,
            show_axes: true,
            show_colorbar: true,
            db_min: -80.0,
            db_max: 0.0,
            smoothing: 0.0,
            oversample: false,
            time_min: None,
            time_max: None,
            freq_min: None,
            freq_max: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(bins: usize, frames: usize) -> Spectrogram {
        let data = (0..bins * frames).map(|i| i as f32).collect();
        Spectrogram::new(data, bins, frames, 44100, 2048, 512).unwrap()
    }

    #[test]
    fn audio_rejects_zero_sample_rate() {
        assert_eq!(
            AudioSamples::new(vec![0.0; 4], 0),
            Err(SonoscopeError::InvalidSampleRate(0))
        );
        let audio = AudioSamples::new(vec![0.0; 22050], 44100).unwrap();
        assert_eq!(audio.len(), 22050);
        assert!((audio.duration_secs() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn spectrogram_rejects_mismatched_length() {
        let err = Spectrogram::new(vec![0.0; 5], 2, 3, 44100, 2048, 512).unwrap_err();
        assert_eq!(err, SonoscopeError::DataLength { expected: 6, actual: 5 });
        assert!(Spectrogram::new(vec![], 0, 3, 44100, 2048, 512).is_err());
        assert!(Spectrogram::new(vec![], 3, 0, 44100, 2048, 512).is_err());
        for (bins, frames) in [(1, 1), (3, 7), (1025, 87)] {
            let s = grid(bins, frames);
            assert_eq!(s.data().len(), bins * frames);
        }
    }

    #[test]
    fn value_is_frequency_major_and_zero_outside() {
        let s = grid(3, 4);
        assert_eq!(s.value(0, 0), 0.0);
        assert_eq!(s.value(1, 2), 6.0);
        assert_eq!(s.value(2, 3), 11.0);
        assert_eq!(s.value(-1, 0), 0.0);
        assert_eq!(s.value(0, -1), 0.0);
        assert_eq!(s.value(3, 0), 0.0);
        assert_eq!(s.value(0, 4), 0.0);
    }

    #[test]
    fn derived_quantities() {
        let s = grid(1025, 87);
        assert!((s.frequency_resolution() - 21.533203125).abs() < 1e-9);
        assert!((s.duration() - 86.0 * 512.0 / 44100.0).abs() < 1e-12);
        assert!((s.frequency_of(100.0) - 2153.3203125).abs() < 1e-9);
        assert!((s.time_of(10.0) - 5120.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn finite_range_skips_non_finite() {
        let s = Spectrogram::new(vec![f32::NAN, -3.0, 2.0, f32::INFINITY], 2, 2, 8000, 4, 2)
            .unwrap();
        assert_eq!(s.finite_range(), Some((-3.0, 2.0)));
        let empty = Spectrogram::new(vec![f32::NAN; 2], 1, 2, 8000, 4, 2).unwrap();
        assert_eq!(empty.finite_range(), None);
    }

    #[test]
    fn params_wire_names_are_camel_case() {
        let json = serde_json::to_value(StftParams::default()).unwrap();
        assert_eq!(json["nFft"], 2048);
        assert_eq!(json["hopLength"], 512);
        assert_eq!(json["window"], "hann");
        let parsed: StftParams =
            serde_json::from_str(r#"{"nFft":1024,"magnitude":"power","melBands":40}"#).unwrap();
        assert_eq!(parsed.n_fft, 1024);
        assert_eq!(parsed.hop_length, 512);
        assert_eq!(parsed.magnitude, MagnitudeKind::Power);
        assert_eq!(parsed.mel_bands, Some(40));
    }

    #[test]
    fn params_validation() {
        assert!(StftParams::default().validate().is_ok());
        let bad = StftParams { hop_length: 0, ..StftParams::default() };
        assert!(bad.validate().is_err());
        let inverted = StftParams { db_min: 0.0, db_max: -80.0, ..StftParams::default() };
        assert!(inverted.validate().is_err());
    }
}
