//! C ABI for ClipSync.
//!
//! Exposes [`clipsync_core::Synchronizer`] behind an opaque handle so that
//! hosts written in C (or anything with a C FFI) can embed the engine.
//!
//! Every function returns one of the status codes from
//! [`clipsync_core::error`] unless documented otherwise:
//!
//! | code | meaning                  |
//! |------|--------------------------|
//! | 0    | success                  |
//! | 1    | invalid argument         |
//! | 2    | base signal already set  |
//! | 3    | base signal not set      |
//! | 4    | could not allocate memory|
//!
//! Sample buffers are described by a format code (`0` f32, `1` i8, `2` i16,
//! `3` i32, `4` i64, `5` f64), a pointer and an element count.
//!
//! Panics never cross the boundary; a panic inside the engine is logged and
//! reported as an invalid argument.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::{ptr, slice};

use clipsync_core::error::{
    status_code, ALLOCATION_ERROR, ALREADY_SET_BASE_SIGNAL, BASE_SIGNAL_NOT_SET, INVALID_ARGUMENT,
    SUCCESS,
};
use clipsync_core::logging::{init_tracing, LogLevel};
use clipsync_core::spectrum::Bin;
use clipsync_core::{SampleFormat, Samples, SpectralFilter, SyncError, SyncResult, Synchronizer};

/// Opaque engine handle.
pub type ClipSyncHandle = *mut Synchronizer;

/// Frequency-domain filter callback.
///
/// Receives the spectrum (`len` bins of interleaved `re, im` floats) and
/// the context pointer given at registration. The callback may rewrite the
/// bins in place. It runs once on the track spectrum and once on the base
/// spectrum of every query, possibly from several threads at once when the
/// host issues concurrent queries.
pub type FrequencyFilterFn = unsafe extern "C" fn(spectrum: *mut Bin, len: usize, data: *mut c_void);

/// A host callback plus its context pointer.
struct ForeignFilter {
    callback: FrequencyFilterFn,
    data: *mut c_void,
}

// The host promises the callback and its context are usable from any thread.
unsafe impl Send for ForeignFilter {}
unsafe impl Sync for ForeignFilter {}

impl SpectralFilter for ForeignFilter {
    fn apply(&self, spectrum: &mut [Bin]) {
        unsafe { (self.callback)(spectrum.as_mut_ptr(), spectrum.len(), self.data) }
    }

    fn name(&self) -> &str {
        "foreign"
    }
}

/// Create an engine that stores its base at `processing_sample_rate`.
///
/// `thread_count <= 1` means sequential processing. Returns null on failure.
/// The handle must be released with [`clipsync_destroy`].
#[no_mangle]
pub extern "C" fn clipsync_create(processing_sample_rate: f64, thread_count: c_int) -> ClipSyncHandle {
    let threads = usize::try_from(thread_count).unwrap_or(1);
    let created = panic::catch_unwind(|| Synchronizer::new(processing_sample_rate, threads));
    match created {
        Ok(Ok(sync)) => Box::into_raw(Box::new(sync)),
        Ok(Err(e)) => {
            tracing::error!("clipsync_create failed: {}", e);
            ptr::null_mut()
        }
        Err(_) => {
            tracing::error!("clipsync_create panicked");
            ptr::null_mut()
        }
    }
}

/// Append a frequency-domain filter. A null callback is rejected.
///
/// # Safety
///
/// `handle` must come from [`clipsync_create`] and not be destroyed yet,
/// and no query may run on it concurrently. `callback` and `data` must stay
/// valid, and safe to use from any thread, until the handle is destroyed.
#[no_mangle]
pub unsafe extern "C" fn clipsync_add_frequency_filter(
    handle: ClipSyncHandle,
    callback: Option<FrequencyFilterFn>,
    data: *mut c_void,
) -> c_int {
    let Some(sync) = handle.as_mut() else {
        return INVALID_ARGUMENT;
    };
    let Some(callback) = callback else {
        tracing::warn!("Rejected null filter callback");
        return INVALID_ARGUMENT;
    };
    guarded(|| sync.append_boxed_filter(Box::new(ForeignFilter { callback, data })))
}

/// Attach the base signal. Fails with code 2 if one is already attached.
///
/// # Safety
///
/// `handle` must be a live handle with no concurrent calls on it. `samples`
/// must point to `num_samples` readable elements of the type named by
/// `format`.
#[no_mangle]
pub unsafe extern "C" fn clipsync_set_base_audio(
    handle: ClipSyncHandle,
    format: c_int,
    samples: *const c_void,
    num_samples: usize,
    sample_rate: f64,
) -> c_int {
    let Some(sync) = handle.as_mut() else {
        return INVALID_ARGUMENT;
    };
    let samples = match raw_samples(format, samples, num_samples) {
        Ok(s) => s,
        Err(e) => return e.code(),
    };
    guarded(|| sync.set_base_audio(samples, sample_rate))
}

/// Locate a track inside the base.
///
/// On success writes the offset and length, in samples at the base's
/// original rate, to `in_point` and `length`. On failure neither is touched.
///
/// # Safety
///
/// `handle` must be a live handle; concurrent calls of this function on the
/// same handle are allowed. `samples` must point to `num_samples` readable
/// elements of the type named by `format`. `in_point` and `length` must be
/// writable.
#[no_mangle]
pub unsafe extern "C" fn clipsync_get_audio_range(
    handle: ClipSyncHandle,
    format: c_int,
    samples: *const c_void,
    num_samples: usize,
    sample_rate: f64,
    in_point: *mut i64,
    length: *mut usize,
) -> c_int {
    let Some(sync) = handle.as_ref() else {
        return INVALID_ARGUMENT;
    };
    if in_point.is_null() || length.is_null() {
        return INVALID_ARGUMENT;
    }
    let samples = match raw_samples(format, samples, num_samples) {
        Ok(s) => s,
        Err(e) => return e.code(),
    };
    guarded(|| {
        let range = sync.align(samples, sample_rate)?;
        *in_point = range.offset;
        *length = range.length;
        Ok(())
    })
}

/// Release an engine. A null handle is ignored.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`clipsync_create`]; it is
/// invalid after this call.
#[no_mangle]
pub unsafe extern "C" fn clipsync_destroy(handle: ClipSyncHandle) -> c_int {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
    SUCCESS
}

/// Static, NUL-terminated message for a status code.
#[no_mangle]
pub extern "C" fn clipsync_get_error_message(code: c_int) -> *const c_char {
    message(code).as_ptr()
}

/// Install a stderr log subscriber (`0` trace .. `4` error).
///
/// `RUST_LOG` overrides the level. An already installed subscriber is left
/// in place.
#[no_mangle]
pub extern "C" fn clipsync_init_logging(level: c_int) -> c_int {
    match LogLevel::from_index(level) {
        Some(level) => {
            init_tracing(level);
            SUCCESS
        }
        None => INVALID_ARGUMENT,
    }
}

fn message(code: c_int) -> &'static CStr {
    match code {
        SUCCESS => c"Success",
        INVALID_ARGUMENT => c"Invalid argument",
        ALREADY_SET_BASE_SIGNAL => c"Base signal already set",
        BASE_SIGNAL_NOT_SET => c"Base signal not set",
        ALLOCATION_ERROR => c"Could not allocate memory",
        _ => c"Unknown error",
    }
}

/// Run an engine call, mapping its result and any panic to a status code.
fn guarded(call: impl FnOnce() -> SyncResult<()>) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => {
            if let Err(e) = &result {
                tracing::debug!("call failed: {}", e);
            }
            status_code(&result)
        }
        Err(_) => {
            tracing::error!("engine panicked");
            INVALID_ARGUMENT
        }
    }
}

/// Borrow a host buffer as typed samples.
///
/// # Safety
///
/// Unless null, `data` must point to `len` elements of the type named by
/// `format`, valid for `'a`.
unsafe fn raw_samples<'a>(format: c_int, data: *const c_void, len: usize) -> SyncResult<Samples<'a>> {
    let format = SampleFormat::try_from(format)?;
    if data.is_null() {
        return Err(SyncError::invalid("null sample buffer"));
    }
    match len.checked_mul(format.element_size()) {
        Some(bytes) if bytes <= isize::MAX as usize => {}
        _ => {
            return Err(SyncError::invalid(format!(
                "{} samples of {} do not fit in memory",
                len, format
            )))
        }
    }
    Ok(match format {
        SampleFormat::Single => Samples::F32(slice::from_raw_parts(data.cast(), len)),
        SampleFormat::Byte => Samples::I8(slice::from_raw_parts(data.cast(), len)),
        SampleFormat::Short => Samples::I16(slice::from_raw_parts(data.cast(), len)),
        SampleFormat::Int => Samples::I32(slice::from_raw_parts(data.cast(), len)),
        SampleFormat::Long => Samples::I64(slice::from_raw_parts(data.cast(), len)),
        SampleFormat::Double => Samples::F64(slice::from_raw_parts(data.cast(), len)),
    })
}
