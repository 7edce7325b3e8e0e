//! Frequency-domain filters applied before correlation.
//!
//! A filter rewrites a half spectrum (`n / 2 + 1` bins of a length-`n`
//! real transform) in place. The engine runs the same chain over the track
//! spectrum and the base spectrum, so any weighting a filter applies shows
//! up squared in the correlation.

use std::f32::consts::PI;
use std::fmt;

use realfft::num_complex::Complex;

use crate::error::{SyncError, SyncResult};

/// A frequency-domain filter.
///
/// Anything with captured state and an `apply` over the spectrum qualifies;
/// closures of type `Fn(&mut [Complex<f32>]) + Send + Sync` implement it.
pub trait SpectralFilter: Send + Sync {
    /// Rewrite the spectrum bins in place.
    fn apply(&self, spectrum: &mut [Complex<f32>]);

    /// Name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> SpectralFilter for F
where
    F: Fn(&mut [Complex<f32>]) + Send + Sync,
{
    fn apply(&self, spectrum: &mut [Complex<f32>]) {
        self(spectrum)
    }
}

/// Ordered, append-only list of filters.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn SpectralFilter>>,
}

impl FilterChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter after every filter already registered.
    pub fn append(&mut self, filter: Box<dyn SpectralFilter>) -> SyncResult<()> {
        self.filters
            .try_reserve(1)
            .map_err(|_| SyncError::Allocation {
                elements: self.filters.len() + 1,
            })?;
        self.filters.push(filter);
        Ok(())
    }

    /// Number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if no filter is registered.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter over `spectrum` in registration order.
    pub fn apply(&self, spectrum: &mut [Complex<f32>]) {
        for filter in &self.filters {
            filter.apply(spectrum);
        }
    }

    /// Names of the registered filters, in order.
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Multiply every bin by a constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain(pub f32);

impl SpectralFilter for Gain {
    fn apply(&self, spectrum: &mut [Complex<f32>]) {
        for bin in spectrum.iter_mut() {
            *bin *= self.0;
        }
    }

    fn name(&self) -> &str {
        "gain"
    }
}

/// Zero every bin whose centre frequency lies outside `[low_hz, high_hz]`.
///
/// `sample_rate` is the rate of the transformed signal, which inside the
/// engine is the processing rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPass {
    pub low_hz: f32,
    pub high_hz: f32,
    pub sample_rate: f32,
}

impl BandPass {
    /// Create a band-pass filter.
    pub fn new(low_hz: f32, high_hz: f32, sample_rate: f32) -> Self {
        Self {
            low_hz,
            high_hz,
            sample_rate,
        }
    }

    /// Telephone-band dialogue filter, 300-3400 Hz.
    pub fn dialogue(sample_rate: f32) -> Self {
        Self::new(300.0, 3400.0, sample_rate)
    }
}

impl SpectralFilter for BandPass {
    fn apply(&self, spectrum: &mut [Complex<f32>]) {
        let Some(n) = transform_len(spectrum.len()) else {
            return;
        };
        let bin_hz = self.sample_rate / n as f32;
        for (k, bin) in spectrum.iter_mut().enumerate() {
            let freq = k as f32 * bin_hz;
            if freq < self.low_hz || freq > self.high_hz {
                *bin = Complex::new(0.0, 0.0);
            }
        }
    }

    fn name(&self) -> &str {
        "band-pass"
    }
}

/// Phase transform (PHAT) whitening.
///
/// Divides each bin by its magnitude, keeping only phase. Correlating
/// whitened spectra sharpens the peak and makes it robust to level and
/// reverberation differences between recordings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTransform;

/// Bins at or below this magnitude are left untouched.
const PHAT_EPSILON: f32 = 1e-9;

impl SpectralFilter for PhaseTransform {
    fn apply(&self, spectrum: &mut [Complex<f32>]) {
        for bin in spectrum.iter_mut() {
            let mag = bin.norm();
            if mag > PHAT_EPSILON {
                *bin /= mag;
            }
        }
    }

    fn name(&self) -> &str {
        "phat"
    }
}

/// First-order emphasis `|1 - a·e^{-jω}|` applied as a magnitude weight.
///
/// A positive coefficient tilts the spectrum towards high frequencies
/// (pre-emphasis); a negative one towards low frequencies (de-emphasis).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreEmphasis {
    pub coefficient: f32,
}

impl PreEmphasis {
    /// Create an emphasis filter.
    pub fn new(coefficient: f32) -> Self {
        Self { coefficient }
    }
}

impl Default for PreEmphasis {
    fn default() -> Self {
        Self::new(0.97)
    }
}

impl SpectralFilter for PreEmphasis {
    fn apply(&self, spectrum: &mut [Complex<f32>]) {
        let Some(n) = transform_len(spectrum.len()) else {
            return;
        };
        let a = self.coefficient;
        for (k, bin) in spectrum.iter_mut().enumerate() {
            let omega = 2.0 * PI * k as f32 / n as f32;
            let weight = (1.0 - 2.0 * a * omega.cos() + a * a).max(0.0).sqrt();
            *bin *= weight;
        }
    }

    fn name(&self) -> &str {
        "pre-emphasis"
    }
}

/// Time-domain length of a half spectrum with `bins` bins.
fn transform_len(bins: usize) -> Option<usize> {
    if bins < 2 {
        None
    } else {
        Some(2 * (bins - 1))
    }
}
