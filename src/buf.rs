//! A small growable output buffer with a `consume`-style drain.
//!
//! An append-only `Write` target that the response formatter fills
//! once, and the connection state machine then drains byte-by-byte
//! across repeated `WouldBlock` suspensions without ever re-writing
//! what's already been sent. A thin wrapper over `Vec<u8>` plus a read
//! cursor; no separate dynamic-array crate backs it (see DESIGN.md).

use std::io::{self, Write};

#[derive(Debug, Default)]
pub struct OutBuf {
    data: Vec<u8>,
    sent: usize,
}

impl OutBuf {
    pub fn new() -> OutBuf {
        OutBuf { data: Vec::new(), sent: 0 }
    }

    pub fn with_capacity(cap: usize) -> OutBuf {
        OutBuf { data: Vec::with_capacity(cap), sent: 0 }
    }

    /// Bytes not yet marked as sent.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.sent..]
    }

    /// Total bytes ever written into this buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Marks `n` bytes as sent. `n` must not exceed `remaining().len()`.
    pub fn advance(&mut self, n: usize) {
        assert!(self.sent + n <= self.data.len(), "advance past end of buffer");
        self.sent += n;
    }

    pub fn is_fully_sent(&self) -> bool {
        self.sent == self.data.len()
    }

    /// Resets the buffer to empty, ready for reuse at the next stage
    /// boundary.
    pub fn clear(&mut self) {
        self.data.clear();
        self.sent = 0;
    }
}

impl Write for OutBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advance_tracks_remaining() {
        let mut buf = OutBuf::new();
        buf.write_all(b"hello world").unwrap();
        assert_eq!(buf.remaining(), b"hello world");
        buf.advance(6);
        assert_eq!(buf.remaining(), b"world");
        assert!(!buf.is_fully_sent());
        buf.advance(5);
        assert!(buf.is_fully_sent());
    }

    #[test]
    #[should_panic]
    fn advance_past_end_panics() {
        let mut buf = OutBuf::new();
        buf.write_all(b"hi").unwrap();
        buf.advance(3);
    }
}
