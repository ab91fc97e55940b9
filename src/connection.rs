//! Connection (request context) and its state machine.
//!
//! One `Connection` exists per open client socket, created on accept
//! and destroyed at retirement by `server.rs`. `dispatch` is the
//! per-readiness entry point: it consults `stage` and `progress`,
//! performs exactly the work not yet done, and returns an `Outcome`
//! telling the event loop whether to keep the connection registered
//! (`Suspend`) or retire it (`Finished`/`Failed`).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::net::SocketAddr;

use mio::net::TcpStream;
use mio::Token;

use crate::accesslog::AccessLog;
use crate::buf::OutBuf;
use crate::config::Config;
use crate::error::{HttpError, ServerError};
use crate::io::{self as nbio, HeaderReadStatus, IoStatus};
use crate::method::Method;
use crate::request::{self, Head, RequestBuffer};
use crate::resolver::{self, Resource};
use crate::response::{self, ResponseHead};
use crate::{errorpage, listing, mime};

/// One chunk of file body read-then-written per resumption. Matches
/// large files are never buffered
/// whole in memory.
const BODY_CHUNK_SIZE: usize = 64 * 1024;

/// What the event loop should do after a `dispatch` call.
#[derive(Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Stage incomplete; keep the connection registered (source: `0`).
    Suspend,
    /// Response fully sent; retire normally (source: `1`).
    Finished,
    /// Peer closed, broken pipe, or unrecoverable I/O error; retire
    /// (source: `>=2`).
    Failed,
}

#[derive(Debug)]
enum Stage {
    ReadHeader,
    WriteHeader,
    WriteBody,
    Done,
}

/// The resolved body a response will stream out, chosen once when
/// `WriteHeader` finishes and consumed incrementally by `WriteBody`.
enum Body {
    /// No body at all (HEAD request, or a response with an empty
    /// payload).
    None,
    /// A small synthesized document (directory listing or error page).
    Bytes(Vec<u8>),
    /// A static file window `[start, end)` on disk.
    File { file: File, start: u64, end: u64 },
}

impl Body {
    fn len(&self) -> u64 {
        match self {
            Body::None => 0,
            Body::Bytes(b) => b.len() as u64,
            Body::File { start, end, .. } => end.saturating_sub(*start),
        }
    }
}

pub struct Connection {
    pub stream: TcpStream,
    pub token: Token,
    peer: String,
    method: Method,
    stage: Stage,
    progress: u64,
    request_buf: RequestBuffer,
    response_buf: OutBuf,
    range: (u64, u64),
    body: Body,
    status_code: u16,
    logged: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, token: Token, peer: SocketAddr) -> Connection {
        Connection {
            stream,
            token,
            peer: peer.ip().to_string(),
            method: Method::Unknown,
            stage: Stage::ReadHeader,
            progress: 0,
            request_buf: RequestBuffer::new(),
            response_buf: OutBuf::new(),
            range: (0, 0),
            body: Body::None,
            status_code: 0,
            logged: false,
        }
    }

    /// Advances this connection by exactly one stage's worth of work,
    /// given that its descriptor is readable/writable (mio doesn't
    /// distinguish the two readiness kinds for our purposes: we always
    /// register for both, see `server.rs`).
    pub fn dispatch(&mut self, config: &Config, access_log: &mut Option<AccessLog>) -> Outcome {
        loop {
            match self.stage {
                Stage::ReadHeader => match self.advance_read_header(config, access_log) {
                    Some(outcome) => return outcome,
                    None => continue,
                },
                Stage::WriteHeader => match self.advance_write_header() {
                    Some(outcome) => return outcome,
                    None => continue,
                },
                Stage::WriteBody => match self.advance_write_body() {
                    Some(outcome) => return outcome,
                    None => continue,
                },
                Stage::Done => return Outcome::Finished,
            }
        }
    }

    fn advance_read_header(
        &mut self,
        config: &Config,
        access_log: &mut Option<AccessLog>,
    ) -> Option<Outcome> {
        let (buf, filled) = self.request_buf.filled_mut();
        let status = nbio::read_header(&mut self.stream, buf, filled);
        match status {
            HeaderReadStatus::WouldBlock => Some(Outcome::Suspend),
            HeaderReadStatus::Incomplete => Some(Outcome::Suspend),
            HeaderReadStatus::PeerClosed => {
                if self.request_buf.len() == 0 {
                    // Empty request, EOF before any bytes: a successful
                    // no-op close.
                    Some(Outcome::Finished)
                } else {
                    Some(Outcome::Failed)
                }
            }
            HeaderReadStatus::Error => Some(Outcome::Failed),
            HeaderReadStatus::TooLarge => {
                self.begin_error_response(config, ServerError::HeaderTooLarge);
                None
            }
            HeaderReadStatus::Complete { end } => {
                let raw = self.request_buf.filled()[..end].to_vec();
                if let Some(log) = access_log.as_mut() {
                    let line = request::request_line(&raw);
                    if let Err(e) = log.record(&self.peer, line) {
                        log::warn!("failed to write access log entry: {}", e);
                    }
                }
                match request::parse_head(&raw) {
                    Ok(head) => self.classify_and_resolve(config, &head),
                    Err(e) => self.begin_error_response(config, e),
                }
                None
            }
        }
    }

    /// Classifying the method, resolving the resource, and building a
    /// synchronous (no I/O suspension), so they run inline as part of
    /// one `ReadHeader` completion rather than as separate stages.
    fn classify_and_resolve(&mut self, config: &Config, head: &Head<'_>) {
        self.method = head.method;
        self.range = head.range;

        match head.method {
            Method::Get | Method::Head => {}
            Method::Unknown => {
                self.begin_error_response(config, ServerError::MalformedRequest);
                return;
            }
            _ => {
                self.begin_error_response(config, ServerError::MethodNotAllowed);
                return;
            }
        }

        match resolver::resolve(&config.document_root, head.path, head.range) {
            Ok((Resource::File { path, size }, range)) => {
                self.range = range;
                let mime_type = mime::classify(&path);
                let file = match File::open(&path) {
                    Ok(f) => f,
                    Err(e) => {
                        self.begin_error_response(config, ServerError::TransientOs(e));
                        return;
                    }
                };
                let _ = size;
                self.begin_success_response(config, 200, file, range, Some(mime_type));
            }
            Ok((Resource::Directory { path }, _)) => match listing::render(&path, head.path) {
                Ok(body) => {
                    self.begin_body_response(config, 200, Body::Bytes(body), Some("text/html".to_string()))
                }
                Err(e) => self.begin_error_response(config, e),
            },
            Err(e) => self.begin_error_response(config, e),
        }
    }

    fn begin_success_response(
        &mut self,
        config: &Config,
        code: u16,
        file: File,
        range: (u64, u64),
        mime_type: Option<String>,
    ) {
        let body = Body::File { file, start: range.0, end: range.1 };
        self.begin_body_response(config, code, body, mime_type);
    }

    fn begin_body_response(
        &mut self,
        config: &Config,
        code: u16,
        body: Body,
        mime_type: Option<String>,
    ) {
        self.status_code = code;
        let is_head = self.method.is_head();
        let content_length = body.len();
        let head = ResponseHead {
            code,
            content_length: Some(content_length),
            range: self.range,
            mime_type: mime_type.as_deref(),
            security_headers: &config.security_headers,
        };
        self.response_buf = response::build(&head);
        self.body = if is_head { Body::None } else { body };
        self.progress = 0;
        self.stage = Stage::WriteHeader;
    }

    fn begin_error_response(&mut self, config: &Config, err: ServerError) {
        if !self.logged {
            log::log!(err.log_level(), "{}", err);
            self.logged = true;
        }
        let (code, reason) = err.http_status();
        let body = errorpage::render(code, reason);
        self.status_code = code;
        self.range = (0, 0);
        let head = ResponseHead {
            code,
            content_length: Some(body.len() as u64),
            range: (0, 0),
            mime_type: Some("text/html"),
            security_headers: &config.security_headers,
        };
        self.response_buf = response::build(&head);
        self.body = if self.method.is_head() { Body::None } else { Body::Bytes(body) };
        self.progress = 0;
        self.stage = Stage::WriteHeader;
    }

    fn advance_write_header(&mut self) -> Option<Outcome> {
        let (n, status) = nbio::write_up_to(&mut self.stream, self.response_buf.remaining());
        if n > 0 {
            self.response_buf.advance(n);
        }
        match status {
            IoStatus::WouldBlock => Some(Outcome::Suspend),
            IoStatus::PeerClosed | IoStatus::BrokenPipe => Some(Outcome::Failed),
            IoStatus::Error => Some(Outcome::Failed),
            IoStatus::Progress => {
                if !self.response_buf.is_fully_sent() {
                    return Some(Outcome::Suspend);
                }
                self.progress = 0;
                self.stage = match &self.body {
                    Body::None => Stage::Done,
                    _ => Stage::WriteBody,
                };
                None
            }
        }
    }

    fn advance_write_body(&mut self) -> Option<Outcome> {
        let total = self.body.len();
        if self.progress >= total {
            self.stage = Stage::Done;
            return None;
        }
        match &mut self.body {
            Body::None => {
                self.stage = Stage::Done;
                None
            }
            Body::Bytes(data) => {
                let start = self.progress as usize;
                let (n, status) = nbio::write_up_to(&mut self.stream, &data[start..]);
                self.progress += n as u64;
                finish_write_step(status, self.progress >= total, &mut self.stage)
            }
            Body::File { file, start, .. } => {
                let want = ((total - self.progress) as usize).min(BODY_CHUNK_SIZE);
                let mut chunk = vec![0u8; want];
                let offset = *start + self.progress;
                if let Err(e) = file.seek(SeekFrom::Start(offset)) {
                    return Some(fail_from_io(e));
                }
                let read = match file.read(&mut chunk) {
                    Ok(0) => return Some(Outcome::Failed),
                    Ok(n) => n,
                    Err(e) => return Some(fail_from_io(e)),
                };
                let (n, status) = nbio::write_up_to(&mut self.stream, &chunk[..read]);
                self.progress += n as u64;
                finish_write_step(status, self.progress >= total, &mut self.stage)
            }
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }
}

fn finish_write_step(status: IoStatus, complete: bool, stage: &mut Stage) -> Option<Outcome> {
    match status {
        IoStatus::WouldBlock => Some(Outcome::Suspend),
        IoStatus::PeerClosed | IoStatus::BrokenPipe | IoStatus::Error => Some(Outcome::Failed),
        IoStatus::Progress => {
            if complete {
                *stage = Stage::Done;
            }
            None
        }
    }
}

fn fail_from_io(e: std::io::Error) -> Outcome {
    log::warn!("error reading file body: {}", e);
    Outcome::Failed
}
