//! The alignment engine.
//!
//! A [`Synchronizer`] owns the reference ("base") signal at its processing
//! rate, the filter chain and a fixed-size worker pool. Queries compare a
//! track against the stored base and report where the track starts.
//!
//! # Lifecycle
//!
//! 1. [`Synchronizer::new`] picks the processing rate and worker count.
//! 2. [`Synchronizer::set_base_audio`] attaches the base, exactly once.
//! 3. [`Synchronizer::append_filter`] may be called at any time.
//! 4. [`Synchronizer::align`] runs a query; it takes `&self`, so queries
//!    can run concurrently from several threads.
//!
//! Mutating calls take `&mut self`, which keeps them from racing queries.
//!
//! # Example
//!
//! ```no_run
//! use clipsync_core::{Samples, Synchronizer};
//!
//! let base: Vec<i16> = vec![0; 441_000];
//! let track: Vec<f32> = vec![0.0; 44_100];
//!
//! let mut sync = Synchronizer::new(44100.0, 4)?;
//! sync.set_base_audio(Samples::from(&base[..]), 44100.0)?;
//! let range = sync.align(Samples::from(&track[..]), 22050.0)?;
//! println!("track starts at {:.3}s", range.offset_secs(44100.0));
//! # Ok::<(), clipsync_core::SyncError>(())
//! ```

use std::fmt;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::EngineSettings;
use crate::error::{SyncError, SyncResult};
use crate::peak::{find_range, AudioRange};
use crate::resample::RateConverter;
use crate::signal::{common_size, normalize, pad, Samples};
use crate::spectrum::{cross_power_spectrum, FilterChain, SpectralFilter, Transform};

/// The reference signal, normalized and stored at the processing rate.
struct BaseSignal {
    samples: Vec<f32>,
    real_sample_rate: f64,
}

/// Raw circular correlation of a track against the base.
#[derive(Debug, Clone)]
pub struct Correlation {
    /// Correlation values; index `k` is the track shifted by `k` samples.
    pub values: Vec<f32>,
    /// Un-padded track length at the processing rate.
    pub track_len: usize,
}

impl Correlation {
    /// Transform length (a power of two).
    pub fn common_size(&self) -> usize {
        self.values.len()
    }
}

/// Locates tracks inside a stored base signal.
pub struct Synchronizer {
    processing_sample_rate: f64,
    thread_count: usize,
    base: Option<BaseSignal>,
    filters: FilterChain,
    converter: RateConverter,
    pool: ThreadPool,
}

impl Synchronizer {
    /// Create an engine storing its base at `processing_sample_rate`.
    ///
    /// `thread_count <= 1` means sequential processing.
    pub fn new(processing_sample_rate: f64, thread_count: usize) -> SyncResult<Self> {
        Self::with_converter(
            processing_sample_rate,
            thread_count,
            RateConverter::default(),
        )
    }

    /// Create an engine from loaded settings.
    pub fn from_settings(settings: &EngineSettings) -> SyncResult<Self> {
        Self::with_converter(
            settings.processing_sample_rate,
            settings.thread_count,
            RateConverter::new(settings.resampler.clone()),
        )
    }

    /// Create an engine with a custom rate converter.
    pub fn with_converter(
        processing_sample_rate: f64,
        thread_count: usize,
        converter: RateConverter,
    ) -> SyncResult<Self> {
        check_rate(processing_sample_rate)?;
        let thread_count = thread_count.max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|i| format!("clipsync-worker-{}", i))
            .build()
            .map_err(|e| {
                tracing::error!("Failed to start worker pool: {}", e);
                SyncError::Allocation {
                    elements: thread_count,
                }
            })?;

        tracing::info!(
            processing_sample_rate,
            thread_count,
            "Created synchronizer"
        );

        Ok(Self {
            processing_sample_rate,
            thread_count,
            base: None,
            filters: FilterChain::new(),
            converter,
            pool,
        })
    }

    /// Rate at which the base is stored and correlated.
    pub fn processing_sample_rate(&self) -> f64 {
        self.processing_sample_rate
    }

    /// Worker count (at least 1).
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Check if the base signal has been attached.
    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Original sample rate of the base signal, once attached.
    pub fn base_sample_rate(&self) -> Option<f64> {
        self.base.as_ref().map(|b| b.real_sample_rate)
    }

    /// Base length at the processing rate, once attached.
    pub fn base_len(&self) -> Option<usize> {
        self.base.as_ref().map(|b| b.samples.len())
    }

    /// The registered filters.
    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Append a frequency-domain filter; it runs after all earlier ones.
    pub fn append_filter(&mut self, filter: impl SpectralFilter + 'static) -> SyncResult<()> {
        self.append_boxed_filter(Box::new(filter))
    }

    /// Append an already boxed filter.
    pub fn append_boxed_filter(&mut self, filter: Box<dyn SpectralFilter>) -> SyncResult<()> {
        tracing::debug!(filter = filter.name(), position = self.filters.len(), "Appending filter");
        self.filters.append(filter)
    }

    /// Attach the base signal recorded at `sample_rate`.
    ///
    /// The samples are converted, normalized and resampled to the
    /// processing rate. Fails with [`SyncError::AlreadySetBaseSignal`] on a
    /// second call, leaving the first base in place.
    pub fn set_base_audio<'a>(
        &mut self,
        samples: impl Into<Samples<'a>>,
        sample_rate: f64,
    ) -> SyncResult<()> {
        if self.base.is_some() {
            tracing::warn!("Base signal already set, ignoring new base");
            return Err(SyncError::AlreadySetBaseSignal);
        }
        let samples = samples.into();
        check_rate(sample_rate)?;
        if samples.is_empty() {
            return Err(SyncError::invalid("base signal has no samples"));
        }

        let mut converted = samples.to_f32()?;
        let ratio = self.processing_sample_rate / sample_rate;
        let stored = self.pool.install(|| -> SyncResult<Vec<f32>> {
            normalize(&mut converted);
            if ratio == 1.0 {
                return Ok(converted);
            }
            let estimate = (converted.len() as f64 * ratio).round() as usize;
            self.converter
                .convert(&converted, ratio, estimate, self.thread_count)
        })?;

        if stored.is_empty() {
            return Err(SyncError::invalid(format!(
                "base signal of {} samples is empty at {} Hz",
                samples.len(),
                self.processing_sample_rate
            )));
        }

        tracing::info!(
            format = %samples.format(),
            input_samples = samples.len(),
            stored_samples = stored.len(),
            sample_rate,
            "Base signal set"
        );

        self.base = Some(BaseSignal {
            samples: stored,
            real_sample_rate: sample_rate,
        });
        Ok(())
    }

    /// Find where the track recorded at `sample_rate` lies in the base.
    ///
    /// The result is expressed in samples at the base's original rate.
    pub fn align<'a>(
        &self,
        samples: impl Into<Samples<'a>>,
        sample_rate: f64,
    ) -> SyncResult<AudioRange> {
        let base = self.base.as_ref().ok_or(SyncError::BaseSignalNotSet)?;
        let correlation = self.correlate(base, samples.into(), sample_rate)?;
        let range = find_range(
            &correlation.values,
            correlation.track_len,
            self.processing_sample_rate,
            base.real_sample_rate,
        )?;

        tracing::debug!(offset = range.offset, length = range.length, "Track aligned");
        Ok(range)
    }

    /// Correlate a track against the base without picking the peak.
    pub fn raw_correlation<'a>(
        &self,
        samples: impl Into<Samples<'a>>,
        sample_rate: f64,
    ) -> SyncResult<Correlation> {
        let base = self.base.as_ref().ok_or(SyncError::BaseSignalNotSet)?;
        self.correlate(base, samples.into(), sample_rate)
    }

    fn correlate(
        &self,
        base: &BaseSignal,
        samples: Samples<'_>,
        sample_rate: f64,
    ) -> SyncResult<Correlation> {
        check_rate(sample_rate)?;
        if samples.is_empty() {
            return Err(SyncError::invalid("track has no samples"));
        }

        let mut track = samples.to_f32()?;
        self.pool.install(|| {
            normalize(&mut track);

            let ratio = self.processing_sample_rate / sample_rate;
            if ratio != 1.0 {
                let estimate = (track.len() as f64 * ratio).ceil() as usize;
                track = self
                    .converter
                    .convert(&track, ratio, estimate, self.thread_count)?;
            }
            if track.is_empty() {
                return Err(SyncError::invalid("track is empty after resampling"));
            }
            let track_len = track.len();

            let size = common_size(track_len + base.samples.len());
            tracing::debug!(
                track_len,
                base_len = base.samples.len(),
                common_size = size,
                "Correlating"
            );

            let mut transform = Transform::new(size)?;
            let mut track_f = transform.forward(&pad(&track, size)?)?;
            drop(track);
            let mut base_f = transform.forward(&pad(&base.samples, size)?)?;

            self.filters.apply(&mut track_f);
            self.filters.apply(&mut base_f);

            let cross = cross_power_spectrum(track_f, &base_f)?;
            drop(base_f);
            let values = transform.inverse(cross)?;

            Ok(Correlation { values, track_len })
        })
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("processing_sample_rate", &self.processing_sample_rate)
            .field("thread_count", &self.thread_count)
            .field("base_len", &self.base_len())
            .field("base_sample_rate", &self.base_sample_rate())
            .field("filters", &self.filters)
            .finish()
    }
}

fn check_rate(sample_rate: f64) -> SyncResult<()> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(SyncError::invalid(format!(
            "sample rate must be positive, got {}",
            sample_rate
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_tracing;
    use crate::spectrum::Gain;
    use std::f64::consts::PI;
    use std::sync::Arc;

    /// Linear sweep from 100 Hz to 8 kHz over 10 s, sampled at `t`.
    fn sweep_at(t: f64) -> f64 {
        let (f0, f1, duration) = (100.0, 8000.0, 10.0);
        (2.0 * PI * (f0 * t + (f1 - f0) / (2.0 * duration) * t * t)).sin()
    }

    fn sweep(start_secs: f64, len: usize, rate: f64) -> Vec<f32> {
        (0..len)
            .map(|i| sweep_at(start_secs + i as f64 / rate) as f32)
            .collect()
    }

    /// Deterministic pseudo-noise, so slices never correlate with each other.
    fn noise(len: usize, seed: u64) -> Vec<f32> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 40) as f32 / (1u64 << 24) as f32) - 0.5
            })
            .collect()
    }

    fn engine_with_base(base: &[f32], rate: f64, threads: usize) -> Synchronizer {
        let mut sync = Synchronizer::new(rate, threads).unwrap();
        sync.set_base_audio(base, rate).unwrap();
        sync
    }

    fn assert_close(actual: i64, expected: i64, tolerance: i64, what: &str) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "Expected {} ~{} (+/-{}), got {}",
            what,
            expected,
            tolerance,
            actual
        );
    }

    #[test]
    fn query_before_base_is_rejected() {
        init_test_tracing();
        let sync = Synchronizer::new(8000.0, 1).unwrap();
        let track = [0.5f32, -0.5, 0.25];
        assert_eq!(
            sync.align(&track[..], 8000.0),
            Err(SyncError::BaseSignalNotSet)
        );
    }

    #[test]
    fn second_base_is_rejected_and_first_survives() {
        let rate = 8000.0;
        let base = noise(16000, 1);
        let mut sync = engine_with_base(&base, rate, 1);

        let other = noise(4000, 2);
        assert_eq!(
            sync.set_base_audio(&other[..], rate),
            Err(SyncError::AlreadySetBaseSignal)
        );
        assert_eq!(sync.base_len(), Some(16000));

        let range = sync.align(&base[5000..7000], rate).unwrap();
        assert_eq!(range, AudioRange { offset: 5000, length: 2000 });
    }

    #[test]
    fn rejects_bad_arguments() {
        let base = noise(1000, 3);
        let sync = engine_with_base(&base, 1000.0, 1);

        let empty: [f32; 0] = [];
        assert!(matches!(
            sync.align(&empty[..], 1000.0),
            Err(SyncError::InvalidArgument(_))
        ));
        assert!(matches!(
            sync.align(&base[..10], 0.0),
            Err(SyncError::InvalidArgument(_))
        ));
        assert!(matches!(
            sync.align(&base[..10], -44100.0),
            Err(SyncError::InvalidArgument(_))
        ));
        assert!(matches!(
            Synchronizer::new(f64::NAN, 1),
            Err(SyncError::InvalidArgument(_))
        ));

        let mut fresh = Synchronizer::new(1000.0, 1).unwrap();
        assert!(fresh.set_base_audio(&empty[..], 1000.0).is_err());
        assert!(fresh.set_base_audio(&base[..], 0.0).is_err());
        assert!(!fresh.has_base());
    }

    #[test]
    fn thread_count_is_normalized() {
        assert_eq!(Synchronizer::new(8000.0, 0).unwrap().thread_count(), 1);
        assert_eq!(Synchronizer::new(8000.0, 3).unwrap().thread_count(), 3);
    }

    #[test]
    fn builds_from_settings() {
        let settings = EngineSettings::from_toml_str(
            "processing_sample_rate = 8000.0\nthread_count = 2\n[resampler]\nsinc_len = 32",
        )
        .unwrap();
        let sync = Synchronizer::from_settings(&settings).unwrap();
        assert_eq!(sync.processing_sample_rate(), 8000.0);
        assert_eq!(sync.thread_count(), 2);
        assert!(!sync.has_base());
    }

    #[test]
    fn self_correlation_finds_slice() {
        let rate = 8000.0;
        let base = sweep(0.0, 40000, rate);
        let sync = engine_with_base(&base, rate, 1);

        let range = sync.align(&base[12345..20345], rate).unwrap();
        assert_close(range.offset, 12345, 1, "offset");
        assert_eq!(range.length, 8000);
    }

    #[test]
    fn integer_formats_align_like_floats() {
        let rate = 4000.0;
        let base: Vec<i16> = noise(12000, 9)
            .iter()
            .map(|&x| (x * 20000.0) as i16)
            .collect();
        let mut sync = Synchronizer::new(rate, 1).unwrap();
        sync.set_base_audio(&base[..], rate).unwrap();

        let track: Vec<i32> = base[3000..4500].iter().map(|&x| x as i32).collect();
        let range = sync.align(&track[..], rate).unwrap();
        assert_eq!(range, AudioRange { offset: 3000, length: 1500 });
    }

    #[test]
    fn track_starting_before_base_gives_negative_offset() {
        let rate = 8000.0;
        let base = noise(16000, 4);
        let sync = engine_with_base(&base, rate, 1);

        let mut track = noise(300, 5);
        track.extend_from_slice(&base[..3000]);
        let range = sync.align(&track[..], rate).unwrap();
        assert_eq!(range.offset, -300);
        assert_eq!(range.length, 3300);
    }

    #[test]
    fn base_is_reported_at_its_real_rate() {
        // Base at 16 kHz stored at 8 kHz; results come back at 16 kHz.
        let base = sweep(0.0, 64000, 16000.0);
        let mut sync = Synchronizer::new(8000.0, 1).unwrap();
        sync.set_base_audio(&base[..], 16000.0).unwrap();
        assert_eq!(sync.base_len(), Some(32000));
        assert_eq!(sync.base_sample_rate(), Some(16000.0));

        let range = sync.align(&base[20000..36000], 16000.0).unwrap();
        assert_close(range.offset, 20000, 2, "offset");
        assert_close(range.length as i64, 16000, 2, "length");
    }

    #[test]
    fn sweep_slice_at_half_rate_is_found() {
        let base_rate = 44100.0;
        let base = sweep(0.0, 441000, base_rate);
        let sync = engine_with_base(&base, base_rate, 1);

        let track = sweep(3.0, 44100, 22050.0);
        let range = sync.align(&track[..], 22050.0).unwrap();
        assert_close(range.offset, 132300, 1, "offset");
        assert_close(range.length as i64, 88200, 1, "length");
    }

    #[test]
    fn result_is_invariant_to_track_rate() {
        let rate = 16000.0;
        let base = sweep(0.0, 160000, rate);
        let sync = engine_with_base(&base, rate, 1);

        let native = sync.align(&sweep(4.0, 16000, rate)[..], rate).unwrap();
        let low = sync.align(&sweep(4.0, 11025, 11025.0)[..], 11025.0).unwrap();
        let high = sync.align(&sweep(4.0, 22050, 22050.0)[..], 22050.0).unwrap();

        for other in [low, high] {
            assert_close(other.offset, native.offset, 2, "offset");
            assert_close(other.length as i64, native.length as i64, 2, "length");
        }
    }

    #[test]
    fn short_track_at_other_rate_is_accepted() {
        let base = sweep(0.0, 40000, 8000.0);
        let sync = engine_with_base(&base, 8000.0, 1);

        // Fewer samples than the resampler's sinc is long.
        let track = sweep(1.0, 40, 16000.0);
        let range = sync.align(&track[..], 16000.0).unwrap();
        assert_eq!(range.length, 20);
    }

    #[test]
    fn slice_count_does_not_move_the_offset() {
        let base = sweep(0.0, 40000, 8000.0);
        let single = engine_with_base(&base, 8000.0, 1);
        let sliced = engine_with_base(&base, 8000.0, 4);

        let track = sweep(1.5, 4000, 16000.0);
        let a = single.align(&track[..], 16000.0).unwrap();
        let b = sliced.align(&track[..], 16000.0).unwrap();
        assert_close(a.offset, 12000, 1, "single-pass offset");
        assert_close(b.offset, 12000, 2, "sliced offset");
        assert_eq!(a.length, 2000);
        assert_eq!(b.length, 2000);
    }

    #[test]
    fn chunked_resampling_still_aligns() {
        let rate = 16000.0;
        let base = sweep(0.0, 160000, rate);
        let sync = engine_with_base(&base, rate, 4);

        let track = sweep(2.5, 16000, 32000.0);
        let range = sync.align(&track[..], 32000.0).unwrap();
        assert_close(range.offset, 40000, 2, "offset");
        assert_close(range.length as i64, 8000, 2, "length");
    }

    #[test]
    fn stacked_gains_equal_their_product() {
        let rate = 4000.0;
        let base = noise(8000, 6);
        let track = base[1000..2000].to_vec();

        let mut stacked = engine_with_base(&base, rate, 1);
        stacked.append_filter(Gain(2.0)).unwrap();
        stacked.append_filter(Gain(3.0)).unwrap();

        let mut single = engine_with_base(&base, rate, 1);
        single.append_filter(Gain(6.0)).unwrap();

        let a = stacked.raw_correlation(&track[..], rate).unwrap();
        let b = single.raw_correlation(&track[..], rate).unwrap();
        assert_eq!(a.common_size(), b.common_size());

        let peak = b.values.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        for (x, y) in a.values.iter().zip(b.values.iter()) {
            assert!(
                (x - y).abs() <= peak * 1e-5,
                "Correlations differ: {} vs {}",
                x,
                y
            );
        }
    }

    #[test]
    fn filters_apply_to_both_spectra() {
        let rate = 4000.0;
        let base = noise(4000, 7);
        let track = base[500..1000].to_vec();

        let plain = engine_with_base(&base, rate, 1);
        let mut gained = engine_with_base(&base, rate, 1);
        gained.append_filter(Gain(2.0)).unwrap();

        let a = plain.raw_correlation(&track[..], rate).unwrap();
        let b = gained.raw_correlation(&track[..], rate).unwrap();
        let i = crate::peak::argmax(&a.values).unwrap();
        assert!((b.values[i] / a.values[i] - 4.0).abs() < 1e-3);
    }

    #[test]
    fn closure_filters_are_accepted() {
        let rate = 4000.0;
        let base = noise(4000, 8);
        let mut sync = engine_with_base(&base, rate, 1);
        sync.append_filter(|spectrum: &mut [crate::spectrum::Bin]| {
            spectrum[0] = crate::spectrum::Bin::new(0.0, 0.0);
        })
        .unwrap();
        assert_eq!(sync.filters().len(), 1);

        let range = sync.align(&base[100..900], rate).unwrap();
        assert_eq!(range.offset, 100);
    }

    #[test]
    fn concurrent_queries_share_the_engine() {
        let rate = 8000.0;
        let base = noise(32000, 10);
        let sync = Arc::new(engine_with_base(&base, rate, 2));

        std::thread::scope(|scope| {
            for start in [1000usize, 9000, 17000, 25000] {
                let sync = Arc::clone(&sync);
                let track = base[start..start + 2000].to_vec();
                scope.spawn(move || {
                    let range = sync.align(&track[..], rate).unwrap();
                    assert_eq!(range.offset, start as i64);
                });
            }
        });
    }
}
