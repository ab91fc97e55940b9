//! MIME classification.
//!
//! The explicit suffix table always wins; the fallback stands in for
//! a full `libmagic`-style classifier, which this crate can't depend
//! on without an FFI binding. `mime_guess` extends the suffix table
//! for anything the explicit six entries miss, and a small magic-byte
//! sniff covers the handful of binary signatures worth distinguishing
//! when there's no usable extension at all.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Explicit suffix table, checked before anything else.
const EXPLICIT_TABLE: &[(&str, &str)] = &[
    (".html", "text/html"),
    (".css", "text/css"),
    (".js", "text/javascript"),
    (".mp4", "video/mp4"),
    (".jpg", "image/jpeg"),
    (".png", "image/png"),
];

/// Classifies `path`, optionally sniffing its first bytes if no suffix
/// matches. Returns an owned string since `mime_guess` and the sniffer
/// both hand back values with different lifetimes than a `'static`
/// table entry.
pub fn classify(path: &Path) -> String {
    let name = path.to_string_lossy();
    for (suffix, mime) in EXPLICIT_TABLE {
        if name.ends_with(suffix) {
            return mime.to_string();
        }
    }
    if let Some(guess) = mime_guess::from_path(path).first() {
        return guess.essence_str().to_string();
    }
    sniff(path).unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Magic-byte fallback: reads at most 512 bytes and checks a handful of
/// well-known signatures, falling back to a UTF-8 validity check for
/// plain text.
fn sniff(path: &Path) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let mut buf = [0u8; 512];
    let n = file.read(&mut buf).ok()?;
    let head = &buf[..n];

    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
    ];
    for (sig, mime) in SIGNATURES {
        if head.starts_with(sig) {
            return Some((*mime).to_string());
        }
    }
    if std::str::from_utf8(head).is_ok() {
        return Some("text/plain".to_string());
    }
    None
}
