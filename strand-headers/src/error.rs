//! Header-section error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeadersError>;

/// Unrecoverable failures while assembling a header section.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeadersError {
    /// A line (terminated or not) exceeded the configured length limit.
    #[error("header line exceeds the {0}-byte limit")]
    LineTooLong(usize),
}
