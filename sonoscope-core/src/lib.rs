//! Annotated spectrogram core: STFT post-processing, color mapping, raster
//! rendering, annotation model and export. Browser bindings live in the
//! `sonoscope` crate; everything here runs natively.

pub mod annotation;
pub mod audio;
pub mod dsp;
pub mod error;
pub mod export;
pub mod render;
pub mod types;
pub mod worker;

pub use error::{Result, SonoscopeError};
pub use types::{AudioSamples, MagnitudeKind, RenderOptions, Spectrogram, StftParams, WindowKind};
