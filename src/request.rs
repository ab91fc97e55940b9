//! Request buffer & parser.
//!
//! `RequestBuffer` is the bounded accumulation buffer for one
//! connection's request head; `parse_head` turns a complete header
//! block into a `Head`, borrowing from the buffer rather than
//! allocating strings for every header.

use crate::error::ServerError;
use crate::method::Method;
use crate::version::Version;

/// Maximum size of the accumulated request head, including the
/// terminator. Exceeding this without finding a terminator is a 413.
pub const MAX_HEADER_SIZE: usize = 16 * 1024;

/// Maximum accepted length of the request path (before the query
/// string is considered).
pub const MAX_PATHNAME_SIZE: usize = 1024;

/// Bounded accumulation buffer for one connection's request head.
///
/// Bytes arrive across possibly many `WouldBlock` suspensions; `filled`
/// tracks how much of `data` holds real input so far (this is the
/// per-connection progress counter, scoped to this one buffer).
pub struct RequestBuffer {
    data: Box<[u8]>,
    filled: usize,
}

impl RequestBuffer {
    pub fn new() -> RequestBuffer {
        RequestBuffer {
            data: vec![0u8; MAX_HEADER_SIZE].into_boxed_slice(),
            filled: 0,
        }
    }

    pub fn filled_mut(&mut self) -> (&mut [u8], &mut usize) {
        (&mut self.data, &mut self.filled)
    }

    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    pub fn len(&self) -> usize {
        self.filled
    }
}

impl Default for RequestBuffer {
    fn default() -> RequestBuffer {
        RequestBuffer::new()
    }
}

/// Parsed request head. Borrows from the raw header bytes rather than
/// allocating owned strings for every field.
#[derive(Debug)]
pub struct Head<'a> {
    pub method: Method,
    pub path: &'a str,
    pub version: Version,
    pub has_host: bool,
    /// `(start, end)`; both zero means "whole resource" (a preserved
    /// semantics, preserved verbatim from the source).
    pub range: (u64, u64),
}

/// The raw first line, stripped of its line terminator, for the access
/// log. Returned alongside `Head` because the log wants the
/// literal wire text, not a re-serialized version of it.
pub fn request_line(raw: &[u8]) -> &str {
    let end = memchr::memchr(b'\n', raw).unwrap_or(raw.len());
    let line = &raw[..end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line).unwrap_or("")
}

/// Parses the accumulated bytes `[0, end)` (which must contain a
/// complete header block, terminator included) into a `Head`.
///
/// A handful of edge cases are resolved here:
/// - both `\n\n` and `\r\n\r\n` are accepted as the terminator (handled
///   upstream, in `io::read_header`, before this function is called);
/// - finding the terminator is the sole green light to parse;
/// - `Range: bytes=0-0` is preserved as meaning "whole resource", same
///   as an absent `Range` header.
pub fn parse_head(raw: &[u8]) -> Result<Head<'_>, ServerError> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut headers);
    let status = req.parse(raw).map_err(|_| ServerError::MalformedRequest)?;
    if status.is_partial() {
        return Err(ServerError::MalformedRequest);
    }

    let method_token = req.method.ok_or(ServerError::MalformedRequest)?;
    let path = req.path.ok_or(ServerError::MalformedRequest)?;
    if path.is_empty() {
        return Err(ServerError::MalformedRequest);
    }
    let version_token = match req.version.ok_or(ServerError::MalformedRequest)? {
        0 => "HTTP/1.0",
        1 => "HTTP/1.1",
        _ => return Err(ServerError::MalformedRequest),
    };
    let version = Version::parse(version_token).ok_or(ServerError::MalformedRequest)?;

    if path_len(path) > MAX_PATHNAME_SIZE {
        return Err(ServerError::PathTooLong);
    }

    let method = Method::classify(method_token);

    let mut has_host = false;
    let mut range = (0u64, 0u64);
    for header in req.headers.iter() {
        if header.name.eq_ignore_ascii_case("Host") {
            has_host = true;
        } else if header.name.eq_ignore_ascii_case("Range") {
            if let Some(parsed) = parse_range(header.value) {
                range = parsed;
            }
        }
    }
    if !has_host {
        return Err(ServerError::MalformedRequest);
    }

    Ok(Head { method, path, version, has_host, range })
}

/// Path length check; the query string is not stripped before
/// counting -- the whole path token is measured.
fn path_len(path: &str) -> usize {
    path.len()
}

/// Parses `Range: bytes=<a>-<b>`. Anything else (multi-range, suffix
/// range, garbage) is silently ignored, keeping the "whole resource"
/// default.
fn parse_range(value: &[u8]) -> Option<(u64, u64)> {
    let value = std::str::from_utf8(value).ok()?;
    let rest = value.trim().strip_prefix("bytes=")?;
    let (start, end) = rest.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end: u64 = end.trim().parse().ok()?;
    Some((start, end))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_simple_get() {
        let head = parse_head(b"GET /hello.txt HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(head.method, Method::Get);
        assert_eq!(head.path, "/hello.txt");
        assert_eq!(head.version, Version::Http11);
        assert_eq!(head.range, (0, 0));
    }

    #[test]
    fn parses_range_header() {
        let head =
            parse_head(b"GET /big.bin HTTP/1.1\r\nHost: x\r\nRange: bytes=10-19\r\n\r\n")
                .unwrap();
        assert_eq!(head.range, (10, 19));
    }

    #[test]
    fn missing_host_is_malformed() {
        let err = parse_head(b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, ServerError::MalformedRequest));
    }

    #[test]
    fn unknown_method_is_unknown_not_error() {
        // classification itself never fails -- the state machine turns
        // Method::Unknown into 400 at the ClassifyMethod step.
        let head = parse_head(b"FROBNICATE / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(head.method, Method::Unknown);
    }

    #[test]
    fn overlong_path_is_414() {
        let long_path = "/".to_string() + &"a".repeat(MAX_PATHNAME_SIZE + 1);
        let req = format!("GET {} HTTP/1.1\r\nHost: x\r\n\r\n", long_path);
        let err = parse_head(req.as_bytes()).unwrap_err();
        assert!(matches!(err, ServerError::PathTooLong));
    }

    #[test]
    fn path_at_exact_limit_is_accepted() {
        let long_path = "/".to_string() + &"a".repeat(MAX_PATHNAME_SIZE - 1);
        let req = format!("GET {} HTTP/1.1\r\nHost: x\r\n\r\n", long_path);
        assert!(parse_head(req.as_bytes()).is_ok());
    }

    #[test]
    fn request_line_strips_crlf() {
        let raw = b"GET /x HTTP/1.1\r\nHost: y\r\n\r\n";
        assert_eq!(request_line(raw), "GET /x HTTP/1.1");
    }

    #[test]
    fn range_0_0_is_whole_resource_sentinel() {
        let head =
            parse_head(b"GET /f HTTP/1.1\r\nHost: x\r\nRange: bytes=0-0\r\n\r\n").unwrap();
        assert_eq!(head.range, (0, 0));
    }
}
