//! Frequency-domain stages: transforms, filters and the cross power spectrum.

mod correlate;
pub mod filter;
mod transform;

pub use correlate::cross_power_spectrum;
pub use filter::{BandPass, FilterChain, Gain, PhaseTransform, PreEmphasis, SpectralFilter};
pub use transform::Transform;

/// Complex bin type used by every spectrum buffer.
pub type Bin = realfft::num_complex::Complex<f32>;
