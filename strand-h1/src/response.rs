//! Response model, wire serialization, and the client-side parser.

use bytes::{BufMut, Bytes, BytesMut};
use strand_headers::{Headers, ParseStatus};

use crate::error::ResponseParseError;

const CRLF: &[u8] = b"\r\n";
const SUPPORTED_PROTOCOL: &str = "HTTP/1.1";

/// An HTTP/1.1 response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code, 100..=999.
    pub status_code: u16,
    /// Reason phrase; may contain spaces.
    pub status_phrase: String,
    /// Header section.
    pub headers: Headers,
    /// Body bytes.
    pub body: Bytes,
}

impl Response {
    /// Creates a response with the given status and no headers or body.
    pub fn new(status_code: u16, status_phrase: impl Into<String>) -> Self {
        Self {
            status_code,
            status_phrase: status_phrase.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Renders the wire form.
    ///
    /// When the response carries a non-empty body and declares neither
    /// `Transfer-Encoding` nor `Content-Length`, a `Content-Length`
    /// field is emitted for it; the response value itself is left
    /// untouched.
    pub fn serialize(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(128 + self.body.len());
        out.put_slice(
            format!("{} {} {}\r\n", SUPPORTED_PROTOCOL, self.status_code, self.status_phrase)
                .as_bytes(),
        );
        for field in self.headers.iter() {
            out.put_slice(field.name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(field.value.as_bytes());
            out.put_slice(CRLF);
        }
        if !self.body.is_empty()
            && !self.headers.has("Transfer-Encoding")
            && !self.headers.has("Content-Length")
        {
            out.put_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.put_slice(CRLF);
        out.put_slice(&self.body);
        out.freeze()
    }

    /// Parses one complete response, returning it along with the
    /// offset just past its last byte. Unlike the request parser this
    /// is a one-shot operation: any truncation is an error and the
    /// caller retries with more input.
    pub fn parse(raw: &[u8]) -> Result<(Response, usize), ResponseParseError> {
        let status_line_end =
            find_crlf(raw).ok_or(ResponseParseError::MissingStatusLine)?;
        let mut response = parse_status_line(&raw[..status_line_end])?;
        let mut consumed = status_line_end + CRLF.len();

        let outcome = response.headers.parse(&raw[consumed..]);
        match outcome.status {
            ParseStatus::Complete if response.headers.is_valid() => {}
            _ => return Err(ResponseParseError::InvalidHeaders),
        }
        consumed += outcome.consumed;

        if let Some(declared) = response.headers.value_of("Content-Length") {
            let content_length = parse_size(&declared)
                .ok_or(ResponseParseError::InvalidContentLength)?;
            let available = raw.len() - consumed;
            if content_length > available {
                return Err(ResponseParseError::TruncatedBody);
            }
            response.body = Bytes::copy_from_slice(&raw[consumed..consumed + content_length]);
            consumed += content_length;
        }

        Ok((response, consumed))
    }
}

fn parse_status_line(line: &[u8]) -> Result<Response, ResponseParseError> {
    let text = String::from_utf8_lossy(line);
    let protocol_end = text
        .find(' ')
        .ok_or(ResponseParseError::MalformedStatusLine)?;
    if &text[..protocol_end] != SUPPORTED_PROTOCOL {
        return Err(ResponseParseError::MalformedStatusLine);
    }
    let rest = &text[protocol_end + 1..];
    let code_end = rest
        .find(' ')
        .ok_or(ResponseParseError::MalformedStatusLine)?;
    let status_code: u16 = rest[..code_end]
        .parse()
        .map_err(|_| ResponseParseError::InvalidStatusCode)?;
    if !(100..=999).contains(&status_code) {
        return Err(ResponseParseError::InvalidStatusCode);
    }
    // Everything after the second space is the phrase, spaces included.
    Ok(Response::new(status_code, &rest[code_end + 1..]))
}

fn parse_size(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn find_crlf(haystack: &[u8]) -> Option<usize> {
    haystack.windows(CRLF.len()).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_no_body() {
        let response = Response::new(200, "OK").with_header("Connection", "close");
        assert_eq!(
            &response.serialize()[..],
            b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n" as &[u8]
        );
    }

    #[test]
    fn test_serialize_adds_content_length() {
        let response = Response::new(200, "OK")
            .with_header("Content-Type", "text/plain")
            .with_body("Hello!");
        let wire = response.serialize();
        let text = std::str::from_utf8(&wire).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 6\r\n"));
        assert!(text.ends_with("\r\n\r\nHello!"));
        // The response value itself stays untouched.
        assert!(!response.headers.has("Content-Length"));
    }

    #[test]
    fn test_serialize_respects_existing_content_length() {
        let response = Response::new(200, "OK")
            .with_header("Content-Length", "6")
            .with_body("Hello!");
        let wire = response.serialize();
        let text = std::str::from_utf8(&wire).unwrap();
        assert_eq!(text.matches("Content-Length").count(), 1);
    }

    #[test]
    fn test_serialize_skips_content_length_for_transfer_encoding() {
        let response = Response::new(200, "OK")
            .with_header("Transfer-Encoding", "chunked")
            .with_body("6\r\nHello!\r\n0\r\n\r\n");
        let wire = response.serialize();
        assert!(!std::str::from_utf8(&wire).unwrap().contains("Content-Length"));
    }

    #[test]
    fn test_parse_simple_response() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 13\r\n\r\nBadRequest.\r\nGET /next";
        let (response, consumed) = Response::parse(raw).unwrap();
        assert_eq!(response.status_code, 404);
        assert_eq!(response.status_phrase, "Not Found");
        assert_eq!(&response.body[..], b"BadRequest.\r\n");
        assert_eq!(consumed, raw.len() - b"GET /next".len());
    }

    #[test]
    fn test_parse_phrase_with_spaces() {
        let raw = b"HTTP/1.1 413 Payload Too Large\r\nConnection: close\r\n\r\n";
        let (response, _) = Response::parse(raw).unwrap();
        assert_eq!(response.status_code, 413);
        assert_eq!(response.status_phrase, "Payload Too Large");
    }

    #[test]
    fn test_parse_no_content_length_means_empty_body() {
        let raw = b"HTTP/1.1 408 Request Timeout\r\nConnection: close\r\n\r\nleftover";
        let (response, consumed) = Response::parse(raw).unwrap();
        assert!(response.body.is_empty());
        assert_eq!(consumed, raw.len() - b"leftover".len());
    }

    #[test]
    fn test_parse_rejects_wrong_protocol() {
        assert_eq!(
            Response::parse(b"HTTP/1.0 200 OK\r\n\r\n").unwrap_err(),
            ResponseParseError::MalformedStatusLine
        );
    }

    #[test]
    fn test_parse_rejects_four_digit_code() {
        assert_eq!(
            Response::parse(b"HTTP/1.1 1337 Leet\r\n\r\n").unwrap_err(),
            ResponseParseError::InvalidStatusCode
        );
    }

    #[test]
    fn test_parse_rejects_unterminated_status_line() {
        assert_eq!(
            Response::parse(b"HTTP/1.1 200 OK").unwrap_err(),
            ResponseParseError::MissingStatusLine
        );
    }

    #[test]
    fn test_parse_rejects_truncated_headers() {
        assert_eq!(
            Response::parse(b"HTTP/1.1 200 OK\r\nContent-Type: text/pl").unwrap_err(),
            ResponseParseError::InvalidHeaders
        );
    }

    #[test]
    fn test_parse_rejects_truncated_body() {
        assert_eq!(
            Response::parse(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort").unwrap_err(),
            ResponseParseError::TruncatedBody
        );
    }

    #[test]
    fn test_parse_rejects_bad_content_length() {
        assert_eq!(
            Response::parse(b"HTTP/1.1 200 OK\r\nContent-Length: lots\r\n\r\n").unwrap_err(),
            ResponseParseError::InvalidContentLength
        );
    }

    #[test]
    fn test_serialize_parse_round_trip() {
        let original = Response::new(201, "Created")
            .with_header("Content-Type", "text/plain")
            .with_header("Connection", "close")
            .with_body("made it");
        let wire = original.serialize();
        let (reparsed, consumed) = Response::parse(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(reparsed.status_code, original.status_code);
        assert_eq!(reparsed.status_phrase, original.status_phrase);
        assert_eq!(reparsed.body, original.body);
        assert_eq!(
            reparsed.headers.value_of("Connection"),
            original.headers.value_of("Connection")
        );
        // Round-tripping again is byte-identical.
        assert_eq!(reparsed.serialize(), wire);
    }
}
