//! Request model and the incremental request parser.

use bytes::Bytes;
use strand_headers::{Headers, ParseStatus};

use crate::target::Target;

/// Ceiling for a declared `Content-Length`, in bytes. Anything larger
/// is answered with `413 Payload Too Large`.
pub const MAX_CONTENT_LENGTH: usize = 10_000_000;

const CRLF: &[u8] = b"\r\n";
const SUPPORTED_PROTOCOL: &str = "HTTP/1.1";

/// How much of a request has been assembled so far.
///
/// `Complete` and `Error` are terminal: a request in a terminal state
/// is frozen and consumes no further bytes. `Complete` covers invalid
/// but recoverable requests (`valid == false`); `Error` means the
/// connection cannot safely carry another request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for the full request line.
    RequestLine,
    /// Request line parsed; header section still arriving.
    Headers,
    /// Headers parsed; body bytes still arriving.
    Body,
    /// Fully assembled (valid or not); connection stays usable.
    Complete,
    /// Unrecoverable; the connection should be closed after the reply.
    Error,
}

/// An HTTP/1.1 request, decomposed.
#[derive(Debug, Clone)]
pub struct Request {
    /// Method token from the request line.
    pub method: String,
    /// Target resource.
    pub target: Target,
    /// Header section.
    pub headers: Headers,
    /// Body bytes (empty when the request declared none).
    pub body: Bytes,
    /// Parse progress.
    pub state: RequestState,
    /// False once any recoverable semantic violation was seen: bad
    /// request line, damaged header, missing or mismatched `Host`.
    pub valid: bool,
    /// Status code to answer with when `state` is `Error`.
    pub response_status_code: u16,
    /// Reason phrase paired with `response_status_code`.
    pub response_status_phrase: String,
}

impl Request {
    /// A fresh request awaiting its request line.
    pub fn new() -> Self {
        Self {
            method: String::new(),
            target: Target::default(),
            headers: Headers::new(),
            body: Bytes::new(),
            state: RequestState::RequestLine,
            valid: true,
            response_status_code: 400,
            response_status_phrase: "Bad Request".to_string(),
        }
    }

    /// Whether the request reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RequestState::Complete | RequestState::Error)
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

/// Reentrant request parser.
///
/// [`parse`](RequestParser::parse) advances the given request through
/// the `RequestLine → Headers → Body` phases as far as the input
/// allows and reports how many bytes it consumed; the caller drops the
/// consumed prefix and calls again when more bytes arrive. The parser
/// itself is stateless (all progress lives in the [`Request`]), so one
/// parser can serve many connections.
pub struct RequestParser {
    header_line_limit: usize,
    server_host: String,
}

enum SizeOutcome {
    Parsed(usize),
    NotANumber,
    Overflow,
}

impl RequestParser {
    /// `header_line_limit` bounds the request line and each header
    /// line; `server_host` is the host this server answers for, with
    /// the empty string meaning "accept whatever the request names".
    pub fn new(header_line_limit: usize, server_host: impl Into<String>) -> Self {
        Self {
            header_line_limit,
            server_host: server_host.into(),
        }
    }

    /// Feeds bytes to the request. Returns how many were consumed;
    /// unconsumed bytes belong to the body of a later call or to the
    /// next message. Terminal requests consume nothing.
    pub fn parse(&self, request: &mut Request, input: &[u8]) -> usize {
        let mut consumed = 0;

        if request.state == RequestState::RequestLine {
            let Some(line_end) = find_crlf(input) else {
                if input.len() > self.header_line_limit {
                    request.state = RequestState::Error;
                }
                return 0;
            };
            if line_end > self.header_line_limit {
                request.state = RequestState::Error;
                return 0;
            }
            let line = &input[..line_end];
            consumed = line_end + CRLF.len();
            request.state = RequestState::Headers;
            if !parse_request_line(request, line) {
                request.valid = false;
            }
        }

        if request.state == RequestState::Headers {
            request.headers.set_line_limit(self.header_line_limit);
            let outcome = request.headers.parse(&input[consumed..]);
            consumed += outcome.consumed;
            match outcome.status {
                ParseStatus::Complete => {
                    if !request.headers.is_valid() {
                        request.valid = false;
                    }
                    request.state = RequestState::Body;
                    self.validate_host(request);
                }
                ParseStatus::Incomplete => return consumed,
                ParseStatus::Error(_) => {
                    request.state = RequestState::Error;
                    return consumed;
                }
            }
        }

        if request.state == RequestState::Body {
            let Some(declared) = request.headers.value_of("Content-Length") else {
                request.body = Bytes::new();
                request.state = RequestState::Complete;
                return consumed;
            };
            let content_length = match parse_size(&declared) {
                SizeOutcome::Parsed(n) => n,
                SizeOutcome::NotANumber => {
                    request.state = RequestState::Error;
                    return consumed;
                }
                SizeOutcome::Overflow => {
                    mark_payload_too_large(request);
                    return consumed;
                }
            };
            if content_length > MAX_CONTENT_LENGTH {
                mark_payload_too_large(request);
                return consumed;
            }
            let available = input.len() - consumed;
            if available < content_length {
                // Body still arriving; nothing is carved out until all
                // of it is here.
                return consumed;
            }
            request.body = Bytes::copy_from_slice(&input[consumed..consumed + content_length]);
            consumed += content_length;
            request.state = RequestState::Complete;
        }

        consumed
    }

    // Host header rule: the header must exist, and the request host,
    // the target host, and the configured server host must all agree.
    // An empty configured host defaults to the request's; an absent
    // target host defaults to the server's. Defaulting happens before
    // the comparison, so the check is order-independent.
    fn validate_host(&self, request: &mut Request) {
        let Some(request_host) = request.headers.value_of("Host") else {
            request.valid = false;
            return;
        };
        let server_host = if self.server_host.is_empty() {
            request_host.clone()
        } else {
            self.server_host.clone()
        };
        let target_host = match request.target.host() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => server_host.clone(),
        };
        if request_host != target_host || request_host != server_host {
            request.valid = false;
        }
    }
}

fn mark_payload_too_large(request: &mut Request) {
    request.state = RequestState::Error;
    request.response_status_code = 413;
    request.response_status_phrase = "Payload Too Large".to_string();
}

// Splits `METHOD SP TARGET SP PROTOCOL` and stores the pieces. Any
// violation reports false; the caller downgrades the request rather
// than aborting the parse.
fn parse_request_line(request: &mut Request, line: &[u8]) -> bool {
    let text = String::from_utf8_lossy(line);
    let Some(method_end) = text.find(' ') else {
        return false;
    };
    let method = &text[..method_end];
    if method.is_empty() {
        return false;
    }
    request.method = method.to_string();

    let rest = &text[method_end + 1..];
    let Some(target_end) = rest.find(' ') else {
        return false;
    };
    let raw_target = &rest[..target_end];
    if raw_target.is_empty() {
        return false;
    }
    match Target::parse(raw_target) {
        Ok(target) => request.target = target,
        Err(_) => return false,
    }

    rest[target_end + 1..] == *SUPPORTED_PROTOCOL
}

// Decimal parse with explicit overflow detection, since an attacker
// controls the digit count.
fn parse_size(text: &str) -> SizeOutcome {
    let mut number: usize = 0;
    if text.is_empty() {
        return SizeOutcome::NotANumber;
    }
    for c in text.bytes() {
        if !c.is_ascii_digit() {
            return SizeOutcome::NotANumber;
        }
        number = match number
            .checked_mul(10)
            .and_then(|n| n.checked_add((c - b'0') as usize))
        {
            Some(n) => n,
            None => return SizeOutcome::Overflow,
        };
    }
    SizeOutcome::Parsed(number)
}

fn find_crlf(haystack: &[u8]) -> Option<usize> {
    haystack.windows(CRLF.len()).position(|w| w == CRLF)
}
