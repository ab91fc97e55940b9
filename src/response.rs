//! Response formatter.
//!
//! Builds the status line and header block into an `OutBuf` exactly
//! once; later `WriteHeader` resumptions only ever drain what's
//! already there (see `OutBuf::advance`). There's no chunked encoding
//! or keep-alive to negotiate -- every response either has a known
//! `Content-Length` or no body at all, and every connection closes
//! when the response is done.

use std::time::SystemTime;

use crate::buf::OutBuf;
use crate::error::reason_phrase;

/// Parameters needed to render one response head. `content_length` is
/// `None` only for the rare case nothing at all is known about body
/// size (never actually reached on the GET/HEAD-only paths this
/// server serves, but kept honest rather than defaulted to zero).
pub struct ResponseHead<'a> {
    pub code: u16,
    pub content_length: Option<u64>,
    /// `(start, end)` from the resolved request. The
    /// `Content-Range` header is emitted whenever `end != 0` --
    /// including the common case of an un-ranged request against a
    /// non-empty file, since the resolver's sentinel handling
    /// step 5) always replaces a default `end == 0` with the resource
    /// size before the formatter ever sees it. This is the literal,
    /// intentionally-preserved behavior of the source server, not an
    /// oversight.
    pub range: (u64, u64),
    pub mime_type: Option<&'a str>,
    pub security_headers: &'a [(String, String)],
}

/// Renders the response head into a fresh `OutBuf`.
pub fn build(head: &ResponseHead<'_>) -> OutBuf {
    let mut buf = OutBuf::with_capacity(512);
    let reason = reason_phrase(head.code);
    let date = httpdate::fmt_http_date(SystemTime::now());

    use std::io::Write;
    write!(buf, "HTTP/1.1 {} {}\r\n", head.code, reason).unwrap();
    write!(buf, "Date: {}\r\n", date).unwrap();
    write!(buf, "Connection: close\r\n").unwrap();
    if let Some(len) = head.content_length {
        write!(buf, "Content-Length: {}\r\n", len).unwrap();
    }
    if head.range.1 != 0 {
        write!(buf, "Content-Range: bytes={}-{}\r\n", head.range.0, head.range.1).unwrap();
    }
    if let Some(mime) = head.mime_type {
        write!(buf, "Content-Type: {}\r\n", mime).unwrap();
    }
    for (name, value) in head.security_headers {
        write!(buf, "{}: {}\r\n", name, value).unwrap();
    }
    write!(buf, "\r\n").unwrap();
    buf
}
