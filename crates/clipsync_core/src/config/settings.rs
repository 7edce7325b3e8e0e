//! Engine settings with TOML-based sections.
//!
//! Top-level keys configure the engine itself; `[resampler]` tunes the
//! windowed-sinc rate converter and `[logging]` the tracing subscriber.
//! Every key is optional and falls back to its default.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Rate (Hz) at which the base signal is stored and correlated.
    #[serde(default = "default_processing_sample_rate")]
    pub processing_sample_rate: f64,

    /// Worker count for normalization, spectral multiply and resampling.
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Rate converter tuning.
    #[serde(default)]
    pub resampler: ResamplerSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_processing_sample_rate() -> f64 {
    44100.0
}

fn default_thread_count() -> usize {
    1
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            processing_sample_rate: default_processing_sample_rate(),
            thread_count: default_thread_count(),
            resampler: ResamplerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Windowed-sinc resampler parameters.
///
/// The defaults favour speed over ultimate quality: a short sinc with
/// linear interpolation of the oversampled sinc table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResamplerSettings {
    /// Length of the windowed sinc filter (rounded up to a multiple of 8).
    #[serde(default = "default_sinc_len")]
    pub sinc_len: usize,

    /// Cutoff relative to the Nyquist frequency of the lower rate, in (0, 1].
    #[serde(default = "default_f_cutoff")]
    pub f_cutoff: f32,

    /// Number of intermediate sinc points per sample.
    #[serde(default = "default_oversampling_factor")]
    pub oversampling_factor: usize,

    /// Interpolation between sinc table points.
    #[serde(default)]
    pub interpolation: Interpolation,

    /// Window applied to the sinc.
    #[serde(default)]
    pub window: Window,
}

fn default_sinc_len() -> usize {
    64
}

fn default_f_cutoff() -> f32 {
    0.95
}

fn default_oversampling_factor() -> usize {
    128
}

impl Default for ResamplerSettings {
    fn default() -> Self {
        Self {
            sinc_len: default_sinc_len(),
            f_cutoff: default_f_cutoff(),
            oversampling_factor: default_oversampling_factor(),
            interpolation: Interpolation::default(),
            window: Window::default(),
        }
    }
}

/// Interpolation mode for the oversampled sinc table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
    Quadratic,
    Cubic,
}

/// Window function applied to the sinc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Blackman,
    Blackman2,
    BlackmanHarris,
    #[default]
    BlackmanHarris2,
    Hann,
    Hann2,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,
}
