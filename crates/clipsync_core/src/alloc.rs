//! Fallible buffer allocation.
//!
//! Every buffer the pipeline owns goes through these helpers so that an
//! out-of-memory condition surfaces as [`SyncError::Allocation`] at the call
//! boundary instead of aborting the process.

use crate::error::{SyncError, SyncResult};

/// Allocate an empty vector able to hold `capacity` elements.
pub fn with_capacity<T>(capacity: usize) -> SyncResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity)
        .map_err(|_| SyncError::Allocation { elements: capacity })?;
    Ok(buf)
}

/// Allocate a vector of `len` default-valued (zero for numeric types) elements.
pub fn zeroed<T: Default + Clone>(len: usize) -> SyncResult<Vec<T>> {
    let mut buf = with_capacity(len)?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Copy a slice into a newly allocated vector.
pub fn copied<T: Copy>(src: &[T]) -> SyncResult<Vec<T>> {
    let mut buf = with_capacity(src.len())?;
    buf.extend_from_slice(src);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_has_requested_length() {
        let buf: Vec<f32> = zeroed(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn copied_matches_source() {
        let src = [1.0f32, -2.0, 3.5];
        assert_eq!(copied(&src).unwrap(), src.to_vec());
    }

    #[test]
    fn impossible_request_is_reported() {
        let result: SyncResult<Vec<u64>> = with_capacity(usize::MAX / 2);
        assert_eq!(
            result.unwrap_err(),
            SyncError::Allocation {
                elements: usize::MAX / 2
            }
        );
    }
}
