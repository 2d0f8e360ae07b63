//! The failure modes shared by every stage of mass trace processing.
use thiserror::Error;

/// All the ways building, measuring or splitting a mass trace can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraceError {
    /// An operation's precondition on the trace's contents was violated, e.g. the
    /// trace is empty, its total intensity is zero, or its smoothed intensities
    /// were never set.
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),
    /// An array did not match the number of peaks in the trace. The trace is
    /// left unmodified.
    #[error("Expected an array of {expected} values, received {received}")]
    InvalidSize { expected: usize, received: usize },
    /// Too few survey scans to run trace detection
    #[error("Mass trace detection requires at least {required} MS1 scans, found {found}")]
    InsufficientData { required: usize, found: usize },
    /// A configuration value or input argument is malformed
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),
}
