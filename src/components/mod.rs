pub mod app;
pub mod spectrogram;
pub mod toolbar;
