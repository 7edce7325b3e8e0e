//! Time-domain sample handling: format conversion, normalization, padding.

mod format;
mod normalize;
mod pad;

pub use format::{SampleFormat, Samples};
pub use normalize::normalize;
pub use pad::{common_size, pad};
