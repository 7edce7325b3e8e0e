//! Peak detection on the circular correlation.

use crate::error::{SyncError, SyncResult};

/// Position of the track inside the base signal.
///
/// Both fields are in samples at the base signal's original rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioRange {
    /// First base sample covered by the track. Negative when the track
    /// starts before the base.
    pub offset: i64,
    /// Track length.
    pub length: usize,
}

impl AudioRange {
    /// Offset in seconds at the given sample rate.
    pub fn offset_secs(&self, sample_rate: f64) -> f64 {
        self.offset as f64 / sample_rate
    }

    /// Length in seconds at the given sample rate.
    pub fn length_secs(&self, sample_rate: f64) -> f64 {
        self.length as f64 / sample_rate
    }

    /// One past the last covered base sample.
    pub fn end(&self) -> i64 {
        self.offset + self.length as i64
    }
}

/// Index of the largest value; the first one wins ties and NaN never wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Map a circular correlation index to a signed lag.
///
/// Indices past `common_size - track_len / 2` stand for the track starting
/// before the base and wrap to negative values.
pub fn unwrap_index(index: usize, common_size: usize, track_len: usize) -> i64 {
    if index > common_size.saturating_sub(track_len / 2) {
        index as i64 - common_size as i64
    } else {
        index as i64
    }
}

/// Locate the track in a correlation computed at `processing_rate` and
/// express the result at `real_rate`.
///
/// `track_len` is the un-padded track length at the processing rate.
pub fn find_range(
    correlation: &[f32],
    track_len: usize,
    processing_rate: f64,
    real_rate: f64,
) -> SyncResult<AudioRange> {
    if correlation.is_empty() {
        return Err(SyncError::invalid("correlation is empty"));
    }
    if !(processing_rate > 0.0 && real_rate > 0.0) {
        return Err(SyncError::invalid(format!(
            "sample rates must be positive, got {} and {}",
            processing_rate, real_rate
        )));
    }

    let index = argmax(correlation)
        .ok_or_else(|| SyncError::invalid("correlation has no finite maximum"))?;
    let lag = unwrap_index(index, correlation.len(), track_len);
    let scale = real_rate / processing_rate;

    tracing::debug!(index, lag, common_size = correlation.len(), "correlation peak");

    Ok(AudioRange {
        offset: (lag as f64 * scale).round() as i64,
        length: (track_len as f64 * scale).round() as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 2.0, 3.0]), Some(1));
    }

    #[test]
    fn argmax_skips_nan() {
        assert_eq!(argmax(&[f32::NAN, -1.0, f32::NAN, -0.5]), Some(3));
        assert_eq!(argmax(&[f32::NAN]), None);
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn index_at_threshold_stays_positive() {
        // n = 64, L = 10: threshold is 59.
        assert_eq!(unwrap_index(59, 64, 10), 59);
        assert_eq!(unwrap_index(60, 64, 10), -4);
        assert_eq!(unwrap_index(63, 64, 10), -1);
        assert_eq!(unwrap_index(0, 64, 10), 0);
    }

    #[test]
    fn range_is_scaled_to_real_rate() {
        let mut corr = vec![0.0f32; 32];
        corr[5] = 1.0;
        let range = find_range(&corr, 8, 8000.0, 44100.0).unwrap();
        // 5 * 5.5125 = 27.56, 8 * 5.5125 = 44.1
        assert_eq!(range, AudioRange { offset: 28, length: 44 });
    }

    #[test]
    fn wrapped_peak_gives_negative_offset() {
        let mut corr = vec![0.0f32; 32];
        corr[30] = 1.0;
        let range = find_range(&corr, 8, 1000.0, 1000.0).unwrap();
        assert_eq!(range.offset, -2);
        assert_eq!(range.end(), 6);
    }

    #[test]
    fn rejects_empty_and_bad_rates() {
        assert!(find_range(&[], 4, 1000.0, 1000.0).is_err());
        assert!(find_range(&[1.0], 1, 0.0, 1000.0).is_err());
        assert!(find_range(&[1.0], 1, 1000.0, -1.0).is_err());
    }

    #[test]
    fn seconds_helpers() {
        let range = AudioRange {
            offset: 132300,
            length: 88200,
        };
        assert!((range.offset_secs(44100.0) - 3.0).abs() < 1e-12);
        assert!((range.length_secs(44100.0) - 2.0).abs() < 1e-12);
    }
}
