//! Input sample formats and conversion to the engine's `f32` samples.

use std::fmt;

use crate::alloc;
use crate::error::{SyncError, SyncResult};

/// Element format tag for raw sample buffers.
///
/// The numeric codes are stable and used by the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SampleFormat {
    /// 32-bit float, the engine's native format (copied verbatim).
    Single = 0,
    /// Signed 8-bit integer.
    Byte = 1,
    /// Signed 16-bit integer.
    Short = 2,
    /// Signed 32-bit integer.
    Int = 3,
    /// Signed 64-bit integer.
    Long = 4,
    /// 64-bit float.
    Double = 5,
}

impl SampleFormat {
    /// Size in bytes of one element.
    pub fn element_size(&self) -> usize {
        match self {
            SampleFormat::Byte => 1,
            SampleFormat::Short => 2,
            SampleFormat::Single | SampleFormat::Int => 4,
            SampleFormat::Long | SampleFormat::Double => 8,
        }
    }
}

impl TryFrom<i32> for SampleFormat {
    type Error = SyncError;

    fn try_from(code: i32) -> SyncResult<Self> {
        match code {
            0 => Ok(SampleFormat::Single),
            1 => Ok(SampleFormat::Byte),
            2 => Ok(SampleFormat::Short),
            3 => Ok(SampleFormat::Int),
            4 => Ok(SampleFormat::Long),
            5 => Ok(SampleFormat::Double),
            other => Err(SyncError::invalid(format!("unknown sample format {}", other))),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::Single => write!(f, "f32"),
            SampleFormat::Byte => write!(f, "i8"),
            SampleFormat::Short => write!(f, "i16"),
            SampleFormat::Int => write!(f, "i32"),
            SampleFormat::Long => write!(f, "i64"),
            SampleFormat::Double => write!(f, "f64"),
        }
    }
}

/// A borrowed mono sample buffer in one of the supported formats.
#[derive(Debug, Clone, Copy)]
pub enum Samples<'a> {
    F32(&'a [f32]),
    I8(&'a [i8]),
    I16(&'a [i16]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    F64(&'a [f64]),
}

impl<'a> Samples<'a> {
    /// Format tag of this buffer.
    pub fn format(&self) -> SampleFormat {
        match self {
            Samples::F32(_) => SampleFormat::Single,
            Samples::I8(_) => SampleFormat::Byte,
            Samples::I16(_) => SampleFormat::Short,
            Samples::I32(_) => SampleFormat::Int,
            Samples::I64(_) => SampleFormat::Long,
            Samples::F64(_) => SampleFormat::Double,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Samples::F32(s) => s.len(),
            Samples::I8(s) => s.len(),
            Samples::I16(s) => s.len(),
            Samples::I32(s) => s.len(),
            Samples::I64(s) => s.len(),
            Samples::F64(s) => s.len(),
        }
    }

    /// Check if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert every element into a newly allocated `f32` buffer.
    ///
    /// Integers are value-converted, not rescaled to `[-1, 1]`; the
    /// normalizer takes care of amplitude afterwards.
    pub fn to_f32(&self) -> SyncResult<Vec<f32>> {
        match *self {
            Samples::F32(s) => alloc::copied(s),
            Samples::I8(s) => convert(s, |x| x as f32),
            Samples::I16(s) => convert(s, |x| x as f32),
            Samples::I32(s) => convert(s, |x| x as f32),
            Samples::I64(s) => convert(s, |x| x as f32),
            Samples::F64(s) => convert(s, |x| x as f32),
        }
    }
}

impl<'a> From<&'a [f32]> for Samples<'a> {
    fn from(s: &'a [f32]) -> Self {
        Samples::F32(s)
    }
}

impl<'a> From<&'a [i8]> for Samples<'a> {
    fn from(s: &'a [i8]) -> Self {
        Samples::I8(s)
    }
}

impl<'a> From<&'a [i16]> for Samples<'a> {
    fn from(s: &'a [i16]) -> Self {
        Samples::I16(s)
    }
}

impl<'a> From<&'a [i32]> for Samples<'a> {
    fn from(s: &'a [i32]) -> Self {
        Samples::I32(s)
    }
}

impl<'a> From<&'a [i64]> for Samples<'a> {
    fn from(s: &'a [i64]) -> Self {
        Samples::I64(s)
    }
}

impl<'a> From<&'a [f64]> for Samples<'a> {
    fn from(s: &'a [f64]) -> Self {
        Samples::F64(s)
    }
}

fn convert<T: Copy>(src: &[T], f: impl Fn(T) -> f32) -> SyncResult<Vec<f32>> {
    let mut out = alloc::with_capacity(src.len())?;
    out.extend(src.iter().map(|&x| f(x)));
    Ok(out)
}
