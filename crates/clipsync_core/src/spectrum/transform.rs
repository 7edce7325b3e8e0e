//! Real-input DFT of a fixed length.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::alloc;
use crate::error::{SyncError, SyncResult};

/// Forward and inverse real transforms of one length `n`.
///
/// Built once per query and dropped with it. The inverse is unnormalized:
/// `inverse(forward(x)) == n * x`.
pub struct Transform {
    len: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Transform {
    /// Plan transforms of length `len` (must be > 0 and even).
    pub fn new(len: usize) -> SyncResult<Self> {
        if len == 0 || len % 2 != 0 {
            return Err(SyncError::invalid(format!(
                "transform length must be even and non-zero, got {}",
                len
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_scratch_len()
            .max(inverse.get_scratch_len());

        Ok(Self {
            len,
            forward,
            inverse,
            scratch: alloc::zeroed(scratch_len)?,
        })
    }

    /// Time-domain length `n`.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of bins in a spectrum: `n / 2 + 1`.
    pub fn spectrum_len(&self) -> usize {
        self.len / 2 + 1
    }

    /// Real-to-complex transform. `samples` must hold exactly `n` values.
    pub fn forward(&mut self, samples: &[f32]) -> SyncResult<Vec<Complex<f32>>> {
        if samples.len() != self.len {
            return Err(SyncError::invalid(format!(
                "expected {} samples, got {}",
                self.len,
                samples.len()
            )));
        }

        // realfft uses its input as scratch space.
        let mut input = alloc::copied(samples)?;
        let mut spectrum = alloc::zeroed(self.spectrum_len())?;
        self.forward
            .process_with_scratch(&mut input, &mut spectrum, &mut self.scratch)
            .map_err(|e| SyncError::invalid(format!("forward transform failed: {}", e)))?;
        Ok(spectrum)
    }

    /// Complex-to-real transform, unnormalized.
    ///
    /// The spectrum is consumed. The imaginary parts of the DC and Nyquist
    /// bins cannot be represented in a real signal and are discarded.
    pub fn inverse(&mut self, mut spectrum: Vec<Complex<f32>>) -> SyncResult<Vec<f32>> {
        if spectrum.len() != self.spectrum_len() {
            return Err(SyncError::invalid(format!(
                "expected {} bins, got {}",
                self.spectrum_len(),
                spectrum.len()
            )));
        }

        spectrum[0].im = 0.0;
        let last = spectrum.len() - 1;
        spectrum[last].im = 0.0;

        let mut output = alloc::zeroed(self.len)?;
        self.inverse
            .process_with_scratch(&mut spectrum, &mut output, &mut self.scratch)
            .map_err(|e| SyncError::invalid(format!("inverse transform failed: {}", e)))?;
        Ok(output)
    }
}
