pub mod engine;
pub mod noise;
pub mod postprocess;
