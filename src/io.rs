//! Non-blocking read/write primitives.
//!
//! These wrap a `mio` stream's `Read`/`Write` impls and translate the
//! usual `WouldBlock`/zero-length-read/broken-pipe cases into the
//! suspension-aware status the connection state machine needs: short
//! reads and writes are normal, not partial failures, and the caller
//! is expected to resume from wherever progress left off.

use std::io::{self, ErrorKind, Read, Write};

/// Outcome of one non-blocking read or write attempt.
#[derive(Debug, Eq, PartialEq)]
pub enum IoStatus {
    /// Some bytes were moved; the caller should try again on next
    /// readiness (more may be available/acceptable).
    Progress,
    /// The kernel has no more room/data right now; suspend.
    WouldBlock,
    /// The peer closed its write half (read returned 0).
    PeerClosed,
    /// Write failed because the peer reset or closed the connection.
    BrokenPipe,
    /// Any other I/O error; treated as `TransientOs` by the caller.
    Error,
}

/// Read up to `dst.len()` bytes from `stream` without blocking.
///
/// Returns the number of bytes read (0 on `WouldBlock`/`PeerClosed`/
/// `Error`) and the resulting status.
pub fn read_up_to<S: Read>(stream: &mut S, dst: &mut [u8]) -> (usize, IoStatus) {
    match stream.read(dst) {
        Ok(0) => (0, IoStatus::PeerClosed),
        Ok(n) => (n, IoStatus::Progress),
        Err(ref e) if e.kind() == ErrorKind::WouldBlock => (0, IoStatus::WouldBlock),
        Err(ref e) if e.kind() == ErrorKind::Interrupted => (0, IoStatus::Progress),
        Err(_) => (0, IoStatus::Error),
    }
}

/// Write up to `src.len()` bytes to `stream` without blocking.
pub fn write_up_to<S: Write>(stream: &mut S, src: &[u8]) -> (usize, IoStatus) {
    match stream.write(src) {
        Ok(0) if !src.is_empty() => (0, IoStatus::WouldBlock),
        Ok(n) => (n, IoStatus::Progress),
        Err(ref e) if e.kind() == ErrorKind::WouldBlock => (0, IoStatus::WouldBlock),
        Err(ref e) if e.kind() == ErrorKind::Interrupted => (0, IoStatus::Progress),
        Err(ref e) if e.kind() == ErrorKind::BrokenPipe => (0, IoStatus::BrokenPipe),
        Err(ref e) if e.kind() == ErrorKind::ConnectionReset => (0, IoStatus::BrokenPipe),
        Err(_) => (0, IoStatus::Error),
    }
}

/// Result of trying to read a complete request head into a bounded
/// buffer.
#[derive(Debug, Eq, PartialEq)]
pub enum HeaderReadStatus {
    /// Header terminator found; `end` is the offset of the first byte
    /// *after* the terminator.
    Complete { end: usize },
    /// No terminator yet; keep reading on the next readiness event.
    Incomplete,
    /// Buffer filled (no room left) without finding a terminator.
    TooLarge,
    WouldBlock,
    PeerClosed,
    Error,
}

/// Accepts both `\n\n` and `\r\n\r\n` as the header terminator (see the
/// design note): one legacy server behavior only recognized `\n\n`,
/// which every real HTTP/1.1 client happens to also satisfy since
/// `\r\n\r\n` contains `\n\n` only when CR is dropped -- so we search for
/// whichever terminator occurs first in the buffer.
fn find_header_end(buf: &[u8]) -> Option<usize> {
    let mut best: Option<usize> = None;
    if let Some(pos) = memchr::memmem::find(buf, b"\r\n\r\n") {
        best = Some(pos + 4);
    }
    if let Some(pos) = memchr::memmem::find(buf, b"\n\n") {
        let end = pos + 2;
        best = Some(match best {
            Some(b) if b <= end => b,
            _ => end,
        });
    }
    best
}

/// Reads from `stream` into `buf[progress..]`, appending as much as is
/// available without blocking, then checks for the header terminator.
///
/// `buf` must already be sized to the full capacity (`MAX_HEADER_SIZE`);
/// only the `[0, filled)` prefix is meaningful input.
pub fn read_header<S: Read>(
    stream: &mut S,
    buf: &mut [u8],
    filled: &mut usize,
) -> HeaderReadStatus {
    if *filled >= buf.len() {
        return HeaderReadStatus::TooLarge;
    }
    let (n, status) = read_up_to(stream, &mut buf[*filled..]);
    *filled += n;
    match status {
        IoStatus::PeerClosed => HeaderReadStatus::PeerClosed,
        IoStatus::WouldBlock => {
            if let Some(end) = find_header_end(&buf[..*filled]) {
                HeaderReadStatus::Complete { end }
            } else {
                HeaderReadStatus::WouldBlock
            }
        }
        IoStatus::Error => HeaderReadStatus::Error,
        IoStatus::Progress => {
            if let Some(end) = find_header_end(&buf[..*filled]) {
                HeaderReadStatus::Complete { end }
            } else if *filled >= buf.len() {
                HeaderReadStatus::TooLarge
            } else {
                HeaderReadStatus::Incomplete
            }
        }
        IoStatus::BrokenPipe => unreachable!("read never returns BrokenPipe"),
    }
}

/// Maps a raw `io::Error` (e.g. from `accept()`) to whether it is the
/// ordinary "no more connections pending" signal.
pub fn is_would_block(err: &io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_progress_then_eof() {
        let mut cur = Cursor::new(b"hello".to_vec());
        let mut dst = [0u8; 3];
        let (n, status) = read_up_to(&mut cur, &mut dst);
        assert_eq!(n, 3);
        assert_eq!(status, IoStatus::Progress);
        assert_eq!(&dst, b"hel");

        let mut dst2 = [0u8; 8];
        let (n2, status2) = read_up_to(&mut cur, &mut dst2);
        assert_eq!(n2, 2);
        assert_eq!(status2, IoStatus::Progress);

        let (n3, status3) = read_up_to(&mut cur, &mut dst2);
        assert_eq!(n3, 0);
        assert_eq!(status3, IoStatus::PeerClosed);
    }

    #[test]
    fn finds_lf_lf_terminator() {
        let mut buf = [0u8; 64];
        let data = b"GET / HTTP/1.1\nHost: x\n\n";
        buf[..data.len()].copy_from_slice(data);
        assert_eq!(find_header_end(&buf[..data.len()]), Some(data.len()));
    }

    #[test]
    fn finds_crlf_crlf_terminator() {
        let mut buf = [0u8; 64];
        let data = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        buf[..data.len()].copy_from_slice(data);
        assert_eq!(find_header_end(&buf[..data.len()]), Some(data.len()));
    }

    #[test]
    fn no_terminator_yields_none() {
        let data = b"GET / HTTP/1.1\r\nHost: x\r\n";
        assert_eq!(find_header_end(data), None);
    }

    #[test]
    fn read_header_reports_too_large_when_buffer_fills() {
        let payload = vec![b'a'; 16];
        let mut cur = Cursor::new(payload);
        let mut buf = [0u8; 8];
        let mut filled = 0usize;
        loop {
            match read_header(&mut cur, &mut buf, &mut filled) {
                HeaderReadStatus::TooLarge => break,
                HeaderReadStatus::Incomplete => continue,
                other => panic!("unexpected status {:?}", other),
            }
        }
        assert_eq!(filled, 8);
    }

    #[test]
    fn read_header_completes_on_terminator() {
        let mut cur = Cursor::new(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n".to_vec());
        let mut buf = [0u8; 256];
        let mut filled = 0usize;
        let status = read_header(&mut cur, &mut buf, &mut filled);
        match status {
            HeaderReadStatus::Complete { end } => assert_eq!(end, filled),
            other => panic!("unexpected status {:?}", other),
        }
    }
}
