//! Directory listing.
//!
//! Fixed at an 8 KiB ceiling (no pagination -- callers must not invoke
//! this for directories expected to overflow). Remaining capacity is
//! always computed as `buf.len() - progress`, via `OutBuf`'s own
//! length tracking.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::ServerError;

const HTML_HEADER: &str = "<!DOCTYPE html><html><head></head><body>";
const HTML_FOOTER: &str = "</body></html>";
const MAX_LISTING_SIZE: usize = 8 * 1024;

/// Renders the directory at `dir_path` (absolute, on disk) as an HTML
/// index. `href_prefix` is the request path under the document root
/// that each entry's anchor is appended to (e.g. `/docs/`).
///
/// Entries whose name starts with `.` or `-` are skipped. If the
/// rendered body would exceed `MAX_LISTING_SIZE` the overflowing
/// entries are dropped and a warning is logged rather than truncating
/// mid-tag.
pub fn render(dir_path: &Path, href_prefix: &str) -> Result<Vec<u8>, ServerError> {
    let mut body = Vec::with_capacity(512);
    body.extend_from_slice(HTML_HEADER.as_bytes());

    let entries = fs::read_dir(dir_path).map_err(|_| ServerError::NotFound)?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.') && !name.starts_with('-'))
        .collect();
    names.sort();

    for name in names {
        let anchor = format!("<a href=\"{}{}\">{}</a></br>", href_prefix, name, name);
        if body.len() + anchor.len() + HTML_FOOTER.len() > MAX_LISTING_SIZE {
            log::warn!(
                "directory listing for {:?} truncated at {} bytes",
                dir_path,
                MAX_LISTING_SIZE
            );
            break;
        }
        body.write_all(anchor.as_bytes()).expect("Vec writes never fail");
    }

    body.extend_from_slice(HTML_FOOTER.as_bytes());
    Ok(body)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::File;

    #[test]
    fn lists_visible_entries_only() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("evhttpd-listing-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        File::create(dir.join("a.txt")).unwrap();
        File::create(dir.join(".hidden")).unwrap();
        File::create(dir.join("-also-hidden")).unwrap();

        let body = render(&dir, "/docs/").unwrap();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text.matches("<a href=").count(), 1);
        assert!(text.contains("href=\"/docs/a.txt\""));
        assert!(text.starts_with(HTML_HEADER));
        assert!(text.ends_with(HTML_FOOTER));
    }
}
