//! Path resolver.
//!
//! Deterministic, I/O limited to `Path::exists`/`metadata`. No
//! canonicalization is performed; traversal is rejected by a textual
//! `..` check before any filesystem access.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ServerError;

/// What a resolved request path turned out to be.
pub enum Resource {
    /// An existing file, the first `mime_type` suffix match (or `None`
    /// for the sniffing fallback to resolve later), and its size.
    File { path: PathBuf, size: u64 },
    /// A directory that needs its listing synthesized.
    Directory { path: PathBuf },
}

/// Maps a request path to a filesystem entity under `document_root`.
///
/// `range` is the `(start, end)` pair parsed from the request; it is
/// clamped/defaulted here and returned alongside the
/// resource so the caller doesn't need a second pass over the size.
pub fn resolve(
    document_root: &Path,
    request_path: &str,
    range: (u64, u64),
) -> Result<(Resource, (u64, u64)), ServerError> {
    if request_path.contains("..") {
        return Err(ServerError::Forbidden);
    }

    let relative = request_path.trim_start_matches('/');
    let mut candidate = document_root.join(relative);

    let wants_index = request_path.ends_with('/') || !request_path.contains('.');
    if wants_index {
        let php_candidate = join_index(&candidate, "index.php");
        if php_candidate.is_file() {
            candidate = php_candidate;
        } else {
            let html_candidate = join_index(&candidate, "index.html");
            if html_candidate.is_file() {
                candidate = html_candidate;
            } else if candidate.is_dir() {
                return Ok((Resource::Directory { path: candidate }, range));
            } else {
                return Err(ServerError::NotFound);
            }
        }
    }

    if !candidate.exists() {
        return Err(ServerError::NotFound);
    }

    let meta = fs::metadata(&candidate).map_err(ServerError::TransientOs)?;
    if meta.is_dir() {
        return Ok((Resource::Directory { path: candidate }, range));
    }

    let size = meta.len();
    let (start, mut end) = range;
    if end == 0 {
        end = size;
    }
    let end = end.min(size);
    Ok((Resource::File { path: candidate, size }, (start, end)))
}

/// Appends `name` to a directory path, handling both the `path/` and
/// `path` (no trailing slash, directory-looking) forms.
fn join_index(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("evhttpd-resolver-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn serves_existing_file() {
        let root = tempdir();
        let mut f = File::create(root.join("hello.txt")).unwrap();
        f.write_all(b"hi\n").unwrap();
        let (resource, range) = resolve(&root, "/hello.txt", (0, 0)).unwrap();
        match resource {
            Resource::File { size, .. } => assert_eq!(size, 3),
            _ => panic!("expected file"),
        }
        assert_eq!(range, (0, 3));
    }

    #[test]
    fn rejects_dotdot_as_forbidden() {
        let root = tempdir();
        let err = resolve(&root, "/../etc/passwd", (0, 0)).unwrap_err();
        assert!(matches!(err, ServerError::Forbidden));
    }

    #[test]
    fn missing_file_is_not_found() {
        let root = tempdir();
        let err = resolve(&root, "/nope.txt", (0, 0)).unwrap_err();
        assert!(matches!(err, ServerError::NotFound));
    }

    #[test]
    fn directory_without_index_falls_back_to_listing() {
        let root = tempdir();
        fs::create_dir_all(root.join("docs")).unwrap();
        File::create(root.join("docs/a.txt")).unwrap();
        let (resource, _) = resolve(&root, "/docs/", (0, 0)).unwrap();
        assert!(matches!(resource, Resource::Directory { .. }));
    }

    #[test]
    fn directory_with_index_html_serves_it() {
        let root = tempdir();
        fs::create_dir_all(root.join("site")).unwrap();
        let mut f = File::create(root.join("site/index.html")).unwrap();
        f.write_all(b"<html></html>").unwrap();
        let (resource, _) = resolve(&root, "/site/", (0, 0)).unwrap();
        match resource {
            Resource::File { path, .. } => {
                assert!(path.ends_with("index.html"));
            }
            _ => panic!("expected file"),
        }
    }

    #[test]
    fn range_end_zero_clamps_to_whole_file() {
        let root = tempdir();
        let mut f = File::create(root.join("big.bin")).unwrap();
        f.write_all(&vec![0u8; 1024]).unwrap();
        let (_, range) = resolve(&root, "/big.bin", (10, 0)).unwrap();
        assert_eq!(range, (10, 1024));
    }

    #[test]
    fn range_end_beyond_size_clamps() {
        let root = tempdir();
        let mut f = File::create(root.join("small.bin")).unwrap();
        f.write_all(&vec![0u8; 100]).unwrap();
        let (_, range) = resolve(&root, "/small.bin", (0, 9999)).unwrap();
        assert_eq!(range, (0, 100));
    }
}
