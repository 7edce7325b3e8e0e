//! Error types and stable status codes.
//!
//! Every fallible operation returns [`SyncResult`]. Each [`SyncError`] maps to
//! an integer status code via [`SyncError::code`], which is what the C ABI
//! hands back to callers. [`error_message`] turns such a code back into text.

/// Status code for a successful call.
pub const SUCCESS: i32 = 0;
/// Status code for [`SyncError::InvalidArgument`].
pub const INVALID_ARGUMENT: i32 = 1;
/// Status code for [`SyncError::AlreadySetBaseSignal`].
pub const ALREADY_SET_BASE_SIGNAL: i32 = 2;
/// Status code for [`SyncError::BaseSignalNotSet`].
pub const BASE_SIGNAL_NOT_SET: i32 = 3;
/// Status code for [`SyncError::Allocation`].
pub const ALLOCATION_ERROR: i32 = 4;

/// Errors produced by the alignment engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A precondition on the arguments was violated.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The base signal was already attached to this engine.
    #[error("Base signal already set")]
    AlreadySetBaseSignal,

    /// An alignment query was issued before the base signal was attached.
    #[error("Base signal not set")]
    BaseSignalNotSet,

    /// A buffer could not be allocated.
    #[error("Could not allocate memory ({elements} elements requested)")]
    Allocation { elements: usize },
}

impl SyncError {
    /// Shorthand for building an [`SyncError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        SyncError::InvalidArgument(reason.into())
    }

    /// Stable integer status code for this error.
    pub fn code(&self) -> i32 {
        match self {
            SyncError::InvalidArgument(_) => INVALID_ARGUMENT,
            SyncError::AlreadySetBaseSignal => ALREADY_SET_BASE_SIGNAL,
            SyncError::BaseSignalNotSet => BASE_SIGNAL_NOT_SET,
            SyncError::Allocation { .. } => ALLOCATION_ERROR,
        }
    }
}

/// Type alias for engine results.
pub type SyncResult<T> = Result<T, SyncError>;

/// Human-readable message for a status code.
///
/// Unrecognized codes yield `"Unknown error"`.
pub fn error_message(code: i32) -> &'static str {
    match code {
        SUCCESS => "Success",
        INVALID_ARGUMENT => "Invalid argument",
        ALREADY_SET_BASE_SIGNAL => "Base signal already set",
        BASE_SIGNAL_NOT_SET => "Base signal not set",
        ALLOCATION_ERROR => "Could not allocate memory",
        _ => "Unknown error",
    }
}

/// Collapse a result into its status code.
pub fn status_code<T>(result: &SyncResult<T>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_stable() {
        assert_eq!(SyncError::invalid("x").code(), 1);
        assert_eq!(SyncError::AlreadySetBaseSignal.code(), 2);
        assert_eq!(SyncError::BaseSignalNotSet.code(), 3);
        assert_eq!(SyncError::Allocation { elements: 8 }.code(), 4);
    }

    #[test]
    fn messages_match_codes() {
        assert_eq!(error_message(INVALID_ARGUMENT), "Invalid argument");
        assert_eq!(error_message(ALREADY_SET_BASE_SIGNAL), "Base signal already set");
        assert_eq!(error_message(BASE_SIGNAL_NOT_SET), "Base signal not set");
        assert_eq!(error_message(ALLOCATION_ERROR), "Could not allocate memory");
        assert_eq!(error_message(SUCCESS), "Success");
    }

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(error_message(-7), "Unknown error");
        assert_eq!(error_message(42), "Unknown error");
    }

    #[test]
    fn status_code_of_results() {
        let ok: SyncResult<()> = Ok(());
        let err: SyncResult<()> = Err(SyncError::BaseSignalNotSet);
        assert_eq!(status_code(&ok), SUCCESS);
        assert_eq!(status_code(&err), BASE_SIGNAL_NOT_SET);
    }

    #[test]
    fn display_includes_reason() {
        let err = SyncError::invalid("sample rate must be positive");
        assert_eq!(err.to_string(), "Invalid argument: sample rate must be positive");
    }
}
