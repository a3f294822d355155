//! Incremental internet-message header parsing.
//!
//! This crate implements the header-section framing of RFC 7230 for the
//! strand HTTP stack: an ordered collection of header fields that can be
//! fed raw bytes one fragment at a time. Each call to [`Headers::parse`]
//! consumes only whole CRLF-terminated lines and reports one of three
//! outcomes:
//!
//! - [`ParseStatus::Complete`]: the empty line ending the section was
//!   reached; the byte count covers it.
//! - [`ParseStatus::Incomplete`]: more input is needed; the caller keeps
//!   the unconsumed tail and feeds it again later.
//! - [`ParseStatus::Error`]: a line exceeded the configured length limit;
//!   the section cannot be recovered.
//!
//! Malformed field names do not abort parsing. They mark the collection
//! invalid (see [`Headers::is_valid`]) so a server can respond with a
//! 400 while keeping the connection usable.
//!
//! ```
//! use strand_headers::{Headers, ParseStatus};
//!
//! let mut headers = Headers::new();
//! let outcome = headers.parse(b"Host: example.com\r\nAccept: */*\r\n\r\n");
//! assert_eq!(outcome.status, ParseStatus::Complete);
//! assert_eq!(headers.value_of("host").as_deref(), Some("example.com"));
//! ```

mod error;
mod field;
mod parser;

pub use error::{HeadersError, Result};
pub use field::HeaderField;
pub use parser::{Headers, ParseOutcome, ParseStatus, DEFAULT_LINE_LIMIT};
