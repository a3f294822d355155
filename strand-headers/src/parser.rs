//! Ordered header collection with incremental section parsing.

use crate::error::HeadersError;
use crate::field::{is_valid_field_name, HeaderField};

/// Default maximum length for a single header line, in bytes, not
/// counting the terminating CRLF.
pub const DEFAULT_LINE_LIMIT: usize = 1000;

const CRLF: &[u8] = b"\r\n";

/// Outcome of one [`Headers::parse`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStatus {
    /// The empty line terminating the section was consumed.
    Complete,
    /// More input is required; feed the unconsumed tail again later.
    Incomplete,
    /// The section is unrecoverable.
    Error(HeadersError),
}

/// Result of feeding bytes to the parser: the status reached and how
/// many input bytes were consumed. Consumed bytes always cover whole
/// lines (including their CRLF); a trailing partial line is left for
/// the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub status: ParseStatus,
    pub consumed: usize,
}

/// An ordered collection of header fields.
///
/// Doubles as the incremental parser state for one header section:
/// repeated [`parse`](Self::parse) calls accumulate fields until the
/// empty line is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<HeaderField>,
    line_limit: usize,
    valid: bool,
    complete: bool,
}

impl Default for Headers {
    fn default() -> Self {
        Self::new()
    }
}

impl Headers {
    /// Creates an empty collection with the default line limit.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            line_limit: DEFAULT_LINE_LIMIT,
            valid: true,
            complete: false,
        }
    }

    /// Sets the maximum accepted length of a single header line,
    /// excluding the CRLF terminator.
    pub fn set_line_limit(&mut self, limit: usize) {
        self.line_limit = limit;
    }

    /// Whether every field parsed so far was well-formed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the terminating empty line has been consumed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Feeds the next fragment of the raw header section.
    ///
    /// Only whole CRLF-terminated lines are consumed. A line starting
    /// with SP or HTAB is an obs-fold continuation of the previous
    /// field value. A line longer than the limit, or an unterminated
    /// accumulation longer than the limit, is a hard error.
    pub fn parse(&mut self, input: &[u8]) -> ParseOutcome {
        let mut consumed = 0;
        if self.complete {
            return ParseOutcome {
                status: ParseStatus::Complete,
                consumed,
            };
        }
        loop {
            let remainder = &input[consumed..];
            let Some(line_end) = find_crlf(remainder) else {
                if remainder.len() > self.line_limit {
                    return ParseOutcome {
                        status: ParseStatus::Error(HeadersError::LineTooLong(self.line_limit)),
                        consumed,
                    };
                }
                return ParseOutcome {
                    status: ParseStatus::Incomplete,
                    consumed,
                };
            };
            if line_end > self.line_limit {
                return ParseOutcome {
                    status: ParseStatus::Error(HeadersError::LineTooLong(self.line_limit)),
                    consumed,
                };
            }
            let line = &remainder[..line_end];
            consumed += line_end + CRLF.len();
            if line.is_empty() {
                self.complete = true;
                return ParseOutcome {
                    status: ParseStatus::Complete,
                    consumed,
                };
            }
            self.accept_line(line);
        }
    }

    // Folds one raw header line into the collection. Damaged lines
    // invalidate the collection but never abort the section.
    fn accept_line(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        if text.starts_with(' ') || text.starts_with('\t') {
            // obs-fold continuation of the previous field value
            match self.fields.last_mut() {
                Some(last) => {
                    if !last.value.is_empty() {
                        last.value.push(' ');
                    }
                    last.value.push_str(text.trim_matches(|c: char| c == ' ' || c == '\t'));
                }
                None => self.valid = false,
            }
            return;
        }
        let Some(colon) = text.find(':') else {
            self.valid = false;
            return;
        };
        let name = &text[..colon];
        let value = text[colon + 1..].trim_matches(|c: char| c == ' ' || c == '\t');
        if !is_valid_field_name(name) {
            self.valid = false;
            return;
        }
        self.fields.push(HeaderField::new(name, value));
    }

    /// Whether any field with the given name exists.
    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.is_named(name))
    }

    /// Value of the first field with the given name.
    pub fn value_of(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|f| f.is_named(name))
            .map(|f| f.value.clone())
    }

    /// All comma-separated elements across every field with the given
    /// name, trimmed, in order of appearance.
    pub fn multi_values(&self, name: &str) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.is_named(name))
            .flat_map(|f| f.value.split(','))
            .map(|v| v.trim_matches(|c: char| c == ' ' || c == '\t').to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Appends a field without touching existing ones.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(HeaderField::new(name, value));
    }

    /// Replaces every field with the given name by a single one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.fields.push(HeaderField::new(name, value));
    }

    /// Replaces every field with the given name by a single
    /// comma-joined field.
    pub fn set_multi(&mut self, name: &str, values: &[String]) {
        self.set(name, values.join(", "));
    }

    /// Removes every field with the given name.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.is_named(name));
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the collection has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates the fields in order.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    /// Renders the wire form: one `Name: value` line per field plus the
    /// terminating empty line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            out.push_str(&field.name);
            out.push_str(": ");
            out.push_str(&field.value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

fn find_crlf(haystack: &[u8]) -> Option<usize> {
    haystack.windows(CRLF.len()).position(|w| w == CRLF)
}
