pub mod file;
pub mod microphone;
