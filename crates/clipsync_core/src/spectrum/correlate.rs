//! Cross power spectrum.

use rayon::prelude::*;
use realfft::num_complex::Complex;

use crate::error::{SyncError, SyncResult};

/// Turn `track` into the cross power spectrum `conj(track[i]) * base[i]`.
///
/// The inverse transform of the result holds, at index `k`, the circular
/// correlation `sum_t track[t] * base[t + k]`, so the track's position in
/// the base shows up as the location of its maximum. Runs on the current
/// rayon pool.
pub fn cross_power_spectrum(
    mut track: Vec<Complex<f32>>,
    base: &[Complex<f32>],
) -> SyncResult<Vec<Complex<f32>>> {
    if track.len() != base.len() {
        return Err(SyncError::invalid(format!(
            "spectrum lengths differ: {} vs {}",
            track.len(),
            base.len()
        )));
    }

    track
        .par_iter_mut()
        .zip(base.par_iter())
        .for_each(|(t, b)| *t = t.conj() * b);
    Ok(track)
}
