//! Zero-padding to a common transform length.

use crate::alloc;
use crate::error::SyncResult;

/// Smallest power of two that is at least `minimal_size` (and at least 1).
pub fn common_size(minimal_size: usize) -> usize {
    minimal_size.max(1).next_power_of_two()
}

/// Copy `samples` into a new buffer of exactly `target_len` elements.
///
/// The first `min(samples.len(), target_len)` elements are copied and the
/// rest is zero. A `target_len` shorter than the input truncates it.
pub fn pad(samples: &[f32], target_len: usize) -> SyncResult<Vec<f32>> {
    let mut out = alloc::zeroed(target_len)?;
    let copy_len = samples.len().min(target_len);
    out[..copy_len].copy_from_slice(&samples[..copy_len]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_with_zeros() {
        let out = pad(&[1.0, 2.0, 3.0], 8).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn truncates_when_target_is_shorter() {
        let out = pad(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn equal_length_is_a_copy() {
        let src = [0.5, -0.5];
        assert_eq!(pad(&src, 2).unwrap(), src.to_vec());
    }

    #[test]
    fn common_size_rounds_up_to_power_of_two() {
        assert_eq!(common_size(0), 1);
        assert_eq!(common_size(1), 1);
        assert_eq!(common_size(5), 8);
        assert_eq!(common_size(1024), 1024);
        assert_eq!(common_size(1025), 2048);
    }
}
