//! Error taxonomy for the per-connection request lifecycle.
//!
//! A `quick_error!`-generated enum carries the failure, and a trait
//! projects it onto the bits a response actually needs (status code,
//! reason phrase, and how loudly to log it).

use std::io;

use quick_error::quick_error;

quick_error! {
    /// Error kinds that can terminate a connection before or during a
    /// response. `WouldBlock` is deliberately not a variant here: it is
    /// not an error, it is a suspension, and is represented directly by
    /// `io::IoStatus::WouldBlock` instead.
    #[derive(Debug)]
    pub enum ServerError {
        /// First line or headers don't parse: missing SP, missing
        /// `HTTP/` prefix, empty path, or missing `Host:`.
        MalformedRequest {
            display("malformed request")
        }
        /// `request_buf` filled before the header terminator was found.
        HeaderTooLarge {
            display("request header exceeds the configured maximum size")
        }
        /// Request path longer than `MAX_PATHNAME_SIZE`.
        PathTooLong {
            display("request path exceeds the configured maximum length")
        }
        /// Resolved path would escape the document root.
        Forbidden {
            display("request path attempts to escape the document root")
        }
        /// Resolved path does not name an existing file or directory.
        NotFound {
            display("requested resource does not exist")
        }
        /// Verb other than GET/HEAD.
        MethodNotAllowed {
            display("method not allowed")
        }
        /// Any other I/O failure that isn't WouldBlock/peer-closed.
        TransientOs(err: io::Error) {
            display("transient I/O error: {}", err)
            from()
        }
        /// Config file missing, unreadable, or missing a required field.
        Startup(message: String) {
            display("startup failed: {}", message)
        }
        /// `document_root` does not exist or is not a directory.
        DocumentRootInvalid(message: String) {
            display("document root invalid: {}", message)
        }
        /// The listening socket could not be bound or put into listen mode.
        BindFailed(message: String) {
            display("could not bind listening socket: {}", message)
        }
    }
}

/// Maps an error to the bits needed to render an HTTP error response.
pub trait HttpError {
    /// Numeric status code and canonical reason phrase.
    fn http_status(&self) -> (u16, &'static str);
    /// Severity at which this error should be logged:
    /// client-caused parse/resolve errors are routine (`debug`); I/O
    /// failures are `warn`; nothing here is ever `error` except startup,
    /// which aborts the process before this trait is even consulted.
    fn log_level(&self) -> log::Level;
}

impl HttpError for ServerError {
    fn http_status(&self) -> (u16, &'static str) {
        use ServerError::*;
        match *self {
            MalformedRequest => (400, "Bad Request"),
            HeaderTooLarge => (413, "Payload Too Large"),
            PathTooLong => (414, "URI Too Long"),
            Forbidden => (403, "Forbidden"),
            NotFound => (404, "Not Found"),
            MethodNotAllowed => (405, "Method Not Allowed"),
            TransientOs(_) => (500, "Internal Server Error"),
            Startup(_) | DocumentRootInvalid(_) | BindFailed(_) => (500, "Internal Server Error"),
        }
    }

    fn log_level(&self) -> log::Level {
        use ServerError::*;
        match *self {
            MalformedRequest | HeaderTooLarge | PathTooLong | Forbidden
            | NotFound | MethodNotAllowed => log::Level::Debug,
            TransientOs(_) => log::Level::Warn,
            Startup(_) | DocumentRootInvalid(_) | BindFailed(_) => log::Level::Error,
        }
    }
}

/// Fixed reason-phrase table, covering the statuses this server emits.
/// Used by the response formatter for codes that don't originate from a
/// `ServerError` (e.g. the literal `200 OK` success path).
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
