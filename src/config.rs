//! Configuration loading.
//!
//! A `serde`-deserialized TOML file plus `clap` CLI overrides. The
//! resulting `Config` is the single, immutable, explicitly-passed
//! server context -- no process-wide globals.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::ServerError;

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

fn default_security_headers() -> Vec<(String, String)> {
    vec![
        ("Cache-Control".to_string(), "private, max-age=0".to_string()),
        ("X-Frame-Options".to_string(), "SAMEORIGIN".to_string()),
        ("X-XSS-Protection".to_string(), "1".to_string()),
    ]
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// On-disk shape of the config file: `port`, `document_root`,
/// `log_file`, `security_headers`, `max_file_size`, `timeout_ms`.
#[derive(Debug, Deserialize)]
struct FileConfig {
    port: Option<u16>,
    document_root: Option<PathBuf>,
    log_file: Option<PathBuf>,
    #[serde(default)]
    security_headers: Vec<String>,
    #[serde(default)]
    max_file_size: u64,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

/// Immutable, fully-resolved server configuration, passed explicitly
/// to everything that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_port: u16,
    pub document_root: PathBuf,
    pub log_file: Option<PathBuf>,
    pub security_headers: Vec<(String, String)>,
    pub max_file_size: u64,
    pub timeout_ms: u64,
}

/// Command-line entry point.
#[derive(Debug, Parser)]
#[command(name = "evhttpd", about = "Event-driven HTTP/1.1 static-content server")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "evhttpd.toml")]
    pub config: PathBuf,
    /// Overrides the configured listen port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Overrides the configured document root.
    #[arg(long)]
    pub root: Option<PathBuf>,
}

impl Config {
    /// Loads `args.config`, applies CLI overrides, and validates the
    /// result (document root must exist and be a directory). Returns a
    /// `ServerError::Startup` with a human-readable message on any
    /// failure; the process exits non-zero on startup failure.
    pub fn load(args: &Args) -> Result<Config, ServerError> {
        let text = fs::read_to_string(&args.config).map_err(|e| {
            ServerError::Startup(format!(
                "could not read config file {:?}: {}",
                args.config, e
            ))
        })?;
        let file: FileConfig = toml::from_str(&text)
            .map_err(|e| ServerError::Startup(format!("invalid config file: {}", e)))?;

        let document_root = args
            .root
            .clone()
            .or(file.document_root)
            .ok_or_else(|| ServerError::Startup("document_root is required".to_string()))?;
        let listen_port = args
            .port
            .or(file.port)
            .ok_or_else(|| ServerError::Startup("port is required".to_string()))?;

        validate_document_root(&document_root)?;

        let security_headers = if file.security_headers.is_empty() {
            default_security_headers()
        } else {
            file.security_headers
                .iter()
                .filter_map(|line| line.split_once(':'))
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .collect()
        };

        let timeout_ms = if file.timeout_ms == 0 { DEFAULT_TIMEOUT_MS } else { file.timeout_ms };

        Ok(Config {
            listen_port,
            document_root,
            log_file: file.log_file,
            security_headers,
            max_file_size: file.max_file_size,
            timeout_ms,
        })
    }
}

fn validate_document_root(root: &Path) -> Result<(), ServerError> {
    let meta = fs::metadata(root).map_err(|e| {
        ServerError::DocumentRootInvalid(format!("document_root {:?} is not accessible: {}", root, e))
    })?;
    if !meta.is_dir() {
        return Err(ServerError::DocumentRootInvalid(format!(
            "document_root {:?} is not a directory",
            root
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("evhttpd-config-test-{}-{}.toml", std::process::id(), contents.len()));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn rejects_config_missing_document_root() {
        let root_dir = std::env::temp_dir();
        let config_path = write_temp("port = 8080\n");
        let args = Args { config: config_path, port: None, root: None };
        let err = Config::load(&args).unwrap_err();
        match err {
            ServerError::Startup(msg) => assert!(msg.contains("document_root")),
            other => panic!("unexpected error {:?}", other),
        }
        let _ = root_dir;
    }

    #[test]
    fn fills_in_documented_defaults() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("evhttpd-config-root-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let config_path = write_temp(&format!(
            "port = 8080\ndocument_root = {:?}\n",
            dir.to_string_lossy()
        ));
        let args = Args { config: config_path, port: None, root: None };
        let config = Config::load(&args).unwrap();
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(!config.security_headers.is_empty());
    }

    #[test]
    fn cli_overrides_take_priority() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("evhttpd-config-root-override-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let config_path = write_temp("port = 8080\ndocument_root = \"/nonexistent\"\n");
        let args = Args { config: config_path, port: Some(9090), root: Some(dir.clone()) };
        let config = Config::load(&args).unwrap();
        assert_eq!(config.listen_port, 9090);
        assert_eq!(config.document_root, dir);
    }
}
