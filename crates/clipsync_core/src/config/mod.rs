//! Configuration for the alignment engine.
//!
//! Settings are plain TOML. Every key is optional:
//!
//! ```toml
//! processing_sample_rate = 44100.0
//! thread_count = 4
//!
//! [resampler]
//! sinc_len = 64
//! interpolation = "linear"
//!
//! [logging]
//! level = "debug"
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigResult};
pub use settings::{EngineSettings, Interpolation, LoggingSettings, ResamplerSettings, Window};
