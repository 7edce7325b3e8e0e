//! ClipSync Core - locate an audio clip inside a longer recording
//!
//! The engine stores a reference ("base") recording and answers where a
//! shorter track begins inside it, using FFT cross-correlation. Inputs may
//! come in any of several sample formats and rates; results are expressed
//! in samples at the base's original rate.
//!
//! This crate has no I/O of its own beyond optional config loading. The
//! `clipsync_ffi` crate exposes it over a C ABI.

pub mod alloc;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod peak;
pub mod resample;
pub mod signal;
pub mod spectrum;

pub use config::EngineSettings;
pub use engine::{Correlation, Synchronizer};
pub use error::{error_message, SyncError, SyncResult};
pub use peak::AudioRange;
pub use signal::{SampleFormat, Samples};
pub use spectrum::{BandPass, Gain, PhaseTransform, PreEmphasis, SpectralFilter};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
