//! Sample-rate conversion.
//!
//! Wraps rubato's windowed-sinc resampler as a one-shot converter: the whole
//! buffer is pushed through in a single chunk and the tail is flushed with
//! silence. The resampler already compensates its sinc delay internally;
//! what remains is a lag of about `ratio - 1` output samples, which is
//! trimmed or padded with silence so sample 0 of the output
//! lines up with sample 0 of the input to within half a sample.
//!
//! [`RateConverter::convert`] picks between a single pass and the chunked
//! path. The chunked path resamples `threads` contiguous slices
//! independently and concatenates them. This is an approximation: the sinc
//! filter sees silence instead of the neighbouring slice at every boundary,
//! so the samples around each seam differ from a single pass over the whole
//! buffer. Alignment only needs the coarse shape of the signal, which the
//! seams do not move.

use rayon::prelude::*;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::alloc;
use crate::config::{Interpolation, ResamplerSettings, Window};
use crate::error::{SyncError, SyncResult};

/// Allowed relative ratio change. The ratio is fixed here, so no headroom.
const MAX_RELATIVE_RATIO: f64 = 1.0;

/// Converts mono `f32` buffers between sample rates.
#[derive(Debug, Clone, Default)]
pub struct RateConverter {
    settings: ResamplerSettings,
}

impl RateConverter {
    /// Create a converter with the given sinc parameters.
    pub fn new(settings: ResamplerSettings) -> Self {
        Self { settings }
    }

    /// The sinc parameters in use.
    pub fn settings(&self) -> &ResamplerSettings {
        &self.settings
    }

    /// Resample `input` by `ratio` (target rate / source rate).
    ///
    /// `estimate` caps the output length; the returned vector's length is
    /// the number of samples actually generated. With `threads > 1` the
    /// chunked path is used on the current rayon pool.
    pub fn convert(
        &self,
        input: &[f32],
        ratio: f64,
        estimate: usize,
        threads: usize,
    ) -> SyncResult<Vec<f32>> {
        if threads > 1 {
            self.resample_chunked(input, ratio, threads)
        } else {
            self.resample(input, ratio, estimate)
        }
    }

    /// Single-pass resampling of the whole buffer.
    pub fn resample(&self, input: &[f32], ratio: f64, estimate: usize) -> SyncResult<Vec<f32>> {
        check_ratio(ratio)?;
        let wanted = estimate.min(natural_len(input.len(), ratio));
        if input.is_empty() || wanted == 0 {
            return Ok(Vec::new());
        }

        let mut resampler = SincFixedIn::<f32>::new(
            ratio,
            MAX_RELATIVE_RATIO,
            self.interpolation_parameters(),
            input.len(),
            1,
        )
        .map_err(|e| SyncError::invalid(format!("cannot build resampler: {}", e)))?;

        let lag = stream_lag(ratio, self.settings.oversampling_factor);
        let skip = lag.max(0) as usize;
        let lead = (-lag).max(0) as usize;
        // Samples `generated` must hold, leading silence included.
        let needed = skip + wanted;

        let mut generated = alloc::with_capacity(needed + input.len())?;
        generated.resize(lead, 0.0);

        let wave_in = [input];
        let first = resampler
            .process(&wave_in[..], None)
            .map_err(|e| SyncError::invalid(format!("resampling failed: {}", e)))?;
        generated.extend_from_slice(&first[0]);

        // Each flush pushes one chunk of silence through the filter. Output
        // stops about a sinc length short of the data fed so far, so the
        // first flushes of a short buffer may produce nothing.
        let fed_needed = needed as f64 / ratio
            + 2.0 * self.settings.sinc_len as f64
            + (1.0 / ratio).ceil()
            + 16.0;
        let mut flushes_left = (fed_needed / input.len() as f64).ceil() as usize + 1;
        while generated.len() < needed && flushes_left > 0 {
            let tail = resampler
                .process_partial(None::<&[&[f32]]>, None)
                .map_err(|e| SyncError::invalid(format!("resampler flush failed: {}", e)))?;
            generated.extend_from_slice(&tail[0]);
            flushes_left -= 1;
        }

        let end = needed.min(generated.len());
        let start = skip.min(end);
        let out = alloc::copied(&generated[start..end])?;
        tracing::trace!(
            input = input.len(),
            output = out.len(),
            ratio,
            lag,
            "resampled buffer"
        );
        Ok(out)
    }

    /// Resample `threads` contiguous slices concurrently and concatenate.
    ///
    /// All slices but the last have `len / threads` samples; the last takes
    /// the remainder. Each slice gets an estimate of
    /// `ceil(slice_len * ratio)`, and the output length is the sum of what
    /// the slices produced.
    pub fn resample_chunked(
        &self,
        input: &[f32],
        ratio: f64,
        threads: usize,
    ) -> SyncResult<Vec<f32>> {
        check_ratio(ratio)?;
        let threads = threads.max(1);
        let slice_size = input.len() / threads;

        let slices: Vec<&[f32]> = (0..threads)
            .map(|i| {
                let start = i * slice_size;
                let end = if i == threads - 1 {
                    input.len()
                } else {
                    start + slice_size
                };
                &input[start..end]
            })
            .collect();

        let parts: Vec<Vec<f32>> = slices
            .par_iter()
            .map(|slice| {
                let estimate = (slice.len() as f64 * ratio).ceil() as usize;
                self.resample(slice, ratio, estimate)
            })
            .collect::<SyncResult<_>>()?;

        let total: usize = parts.iter().map(Vec::len).sum();
        let mut out = alloc::with_capacity(total)?;
        for part in &parts {
            out.extend_from_slice(part);
        }
        tracing::trace!(
            slices = threads,
            input = input.len(),
            output = total,
            "resampled in slices"
        );
        Ok(out)
    }

    fn interpolation_parameters(&self) -> SincInterpolationParameters {
        SincInterpolationParameters {
            sinc_len: self.settings.sinc_len,
            f_cutoff: self.settings.f_cutoff,
            oversampling_factor: self.settings.oversampling_factor,
            interpolation: match self.settings.interpolation {
                Interpolation::Nearest => SincInterpolationType::Nearest,
                Interpolation::Linear => SincInterpolationType::Linear,
                Interpolation::Quadratic => SincInterpolationType::Quadratic,
                Interpolation::Cubic => SincInterpolationType::Cubic,
            },
            window: match self.settings.window {
                Window::Blackman => WindowFunction::Blackman,
                Window::Blackman2 => WindowFunction::Blackman2,
                Window::BlackmanHarris => WindowFunction::BlackmanHarris,
                Window::BlackmanHarris2 => WindowFunction::BlackmanHarris2,
                Window::Hann => WindowFunction::Hann,
                Window::Hann2 => WindowFunction::Hann2,
            },
        }
    }
}

fn check_ratio(ratio: f64) -> SyncResult<()> {
    if ratio.is_finite() && ratio > 0.0 {
        Ok(())
    } else {
        Err(SyncError::invalid(format!(
            "resampling ratio must be positive, got {}",
            ratio
        )))
    }
}

/// Output samples by which `SincFixedIn`'s stream trails the ideal grid.
///
/// The resampler emits sample `n` at input time `(n + 1) / ratio - 1 +
/// 1 / oversampling` (its sinc table peaks one tap before the centre), so
/// input time `t` lands at output `ratio * t + ratio - 1 - ratio /
/// oversampling`. A negative lag is made up by leading silence.
fn stream_lag(ratio: f64, oversampling_factor: usize) -> i64 {
    (ratio - 1.0 - ratio / oversampling_factor.max(1) as f64).round() as i64
}

/// Length a buffer of `len` samples has after resampling by `ratio`.
fn natural_len(len: usize, ratio: f64) -> usize {
    (len as f64 * ratio).ceil() as usize
}
