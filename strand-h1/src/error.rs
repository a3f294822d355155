//! Error types for the server core and the client response parser.

use thiserror::Error;

/// Failures reported by a [`ServerTransport`](crate::ServerTransport)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport could not acquire the requested port.
    #[error("failed to bind port {port}: {reason}")]
    Bind { port: u16, reason: String },
}

/// Failures of [`Server::mobilize`](crate::Server::mobilize).
///
/// Neither variant leaves threads running; after a bind failure the
/// server may be mobilized again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MobilizeError {
    /// The server is already bound and listening.
    #[error("server is already mobilized")]
    AlreadyMobilized,

    /// The transport refused the bind.
    #[error(transparent)]
    Bind(#[from] TransportError),
}

/// Failures of the client-side response parser.
///
/// The parser only accepts a complete response; truncation anywhere is
/// an error, matching the one-shot contract of
/// [`Response::parse`](crate::Response::parse).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseParseError {
    /// No CRLF-terminated status line yet.
    #[error("status line is missing or unterminated")]
    MissingStatusLine,

    /// The status line did not have the `HTTP/1.1 <code> <phrase>` shape.
    #[error("malformed status line")]
    MalformedStatusLine,

    /// The status code was not a decimal number in 100..=999.
    #[error("invalid status code")]
    InvalidStatusCode,

    /// The header section was truncated or unrecoverable.
    #[error("invalid header section")]
    InvalidHeaders,

    /// The `Content-Length` value was not a decimal number.
    #[error("invalid Content-Length value")]
    InvalidContentLength,

    /// Fewer body bytes were present than `Content-Length` promised.
    #[error("body truncated before Content-Length bytes")]
    TruncatedBody,
}
