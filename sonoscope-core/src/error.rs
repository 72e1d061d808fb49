use std::fmt;

/// Top-level error type for the sonoscope-core public API.
#[derive(Debug, Clone, PartialEq)]
pub enum SonoscopeError {
    /// Sample rate was zero.
    InvalidSampleRate(u32),
    /// A spectrogram was requested with a zero-sized axis.
    InvalidDimensions { freq_bins: usize, time_frames: usize },
    /// Flat data length does not match `freq_bins * time_frames`.
    DataLength { expected: usize, actual: usize },
    /// Canvas or export surface with no pixels.
    InvalidCanvas { width: u32, height: u32 },
    /// STFT or render parameters that cannot be honoured.
    InvalidParams(String),
    /// The transform engine could not be created.
    EngineUnavailable(String),
    /// The transform engine failed while running.
    Engine(String),
    /// Audio decoding failure.
    Decode(String),
    /// Image encoding or export composition failure.
    Export(String),
    /// Malformed worker message.
    Protocol(String),
}

impl fmt::Display for SonoscopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SonoscopeError::InvalidSampleRate(sr) => {
                write!(f, "sample rate must be positive, got {}", sr)
            }
            SonoscopeError::InvalidDimensions { freq_bins, time_frames } => write!(
                f,
                "spectrogram dimensions must be positive, got {} bins x {} frames",
                freq_bins, time_frames
            ),
            SonoscopeError::DataLength { expected, actual } => write!(
                f,
                "data length {} does not match n_freq_bins * n_time_frames = {}",
                actual, expected
            ),
            SonoscopeError::InvalidCanvas { width, height } => {
                write!(f, "canvas must have non-zero size, got {}x{}", width, height)
            }
            SonoscopeError::InvalidParams(msg) => write!(f, "invalid parameters: {}", msg),
            SonoscopeError::EngineUnavailable(msg) => {
                write!(f, "transform engine unavailable: {}", msg)
            }
            SonoscopeError::Engine(msg) => write!(f, "transform engine error: {}", msg),
            SonoscopeError::Decode(msg) => write!(f, "decode error: {}", msg),
            SonoscopeError::Export(msg) => write!(f, "export error: {}", msg),
            SonoscopeError::Protocol(msg) => write!(f, "worker protocol error: {}", msg),
        }
    }
}

impl std::error::Error for SonoscopeError {}

impl From<serde_json::Error> for SonoscopeError {
    fn from(e: serde_json::Error) -> Self {
        SonoscopeError::Protocol(e.to_string())
    }
}

impl From<image::ImageError> for SonoscopeError {
    fn from(e: image::ImageError) -> Self {
        SonoscopeError::Export(e.to_string())
    }
}

/// Convenience alias so callers can write `Result<T>` instead of `Result<T, SonoscopeError>`.
pub type Result<T> = std::result::Result<T, SonoscopeError>;
