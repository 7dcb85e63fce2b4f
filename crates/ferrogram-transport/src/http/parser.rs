//! Incremental HTTP/1.1 request parser.
//!
//! The parser is fed whatever bytes the socket produced and resumes exactly
//! where it stopped, so any split of the input yields the same request:
//!
//! ```text
//! Method ─SP─▶ Url ─SP─▶ Version ─CRLF─▶ Headers ─CRLF CRLF─▶ Content ─▶ Done
//! ```
//!
//! One request is parsed per connection. Bytes fed after completion are
//! ignored.

use std::collections::HashMap;

use thiserror::Error;
use tracing::trace;

/// Default bound on the request line plus header block.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 16 * 1024;

/// Default bound on the request body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Errors that make a request unparsable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpParseError {
    /// The header section or the declared body exceeds its bound.
    #[error("request {section} exceeds {limit} bytes")]
    TooLarge {
        /// `headers` or `body`.
        section: &'static str,
        /// The configured bound.
        limit: usize,
    },

    /// `Content-Length` is not a decimal number.
    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),
}

/// Parse progress of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Method,
    Url,
    Version,
    Headers,
    Content,
    Done,
}

/// A parsed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub version: String,
    /// Header names are kept exactly as received.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Looks a header up ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The request target without its query string.
    pub fn path(&self) -> &str {
        match self.url.find('?') {
            Some(q) => &self.url[..q],
            None => &self.url,
        }
    }

    /// The `Host` header without its port suffix, lowercased.
    pub fn host(&self) -> Option<String> {
        self.header("Host").map(strip_port).map(str::to_ascii_lowercase)
    }
}

/// Removes a trailing `:port` from a host, leaving bracketed IPv6 literals
/// intact.
pub(crate) fn strip_port(host: &str) -> &str {
    let host = host.trim();
    match host.rfind(':') {
        Some(colon)
            if !host[colon + 1..].is_empty()
                && host[colon + 1..].bytes().all(|b| b.is_ascii_digit())
                && (host.starts_with('[') == host[..colon].ends_with(']')) =>
        {
            &host[..colon]
        }
        _ => host,
    }
}

/// Resumable request parser.
///
/// # Example
///
/// ```rust
/// use ferrogram_transport::http::RequestParser;
///
/// let mut parser = RequestParser::new();
/// assert!(!parser.feed(b"POST /hook HTTP/1.1\r\nContent-Le").unwrap());
/// assert!(parser.feed(b"ngth: 2\r\n\r\nok").unwrap());
/// assert_eq!(parser.request().body, b"ok");
/// ```
#[derive(Debug)]
pub struct RequestParser {
    phase: Phase,
    request: HttpRequest,

    /// Bytes of the request-line token being read.
    token: Vec<u8>,
    key: Vec<u8>,
    value: Vec<u8>,
    in_value: bool,
    /// The next byte would be the first of a header value.
    value_start: bool,
    /// A CR was seen; a following LF belongs to the line terminator.
    skip_lf: bool,
    /// The blank line was seen; content starts after its LF.
    headers_finished: bool,

    remaining: usize,
    header_bytes: usize,
    max_header_bytes: usize,
    max_body_bytes: usize,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_BODY_BYTES)
    }

    pub fn with_limits(max_header_bytes: usize, max_body_bytes: usize) -> Self {
        Self {
            phase: Phase::Method,
            request: HttpRequest::default(),
            token: Vec::new(),
            key: Vec::new(),
            value: Vec::new(),
            in_value: false,
            value_start: false,
            skip_lf: false,
            headers_finished: false,
            remaining: 0,
            header_bytes: 0,
            max_header_bytes,
            max_body_bytes,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// The request parsed so far.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn into_request(self) -> HttpRequest {
        self.request
    }

    /// Consumes `bytes` and returns `true` once the request is complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<bool, HttpParseError> {
        let mut i = 0;
        while i < bytes.len() {
            match self.phase {
                Phase::Done => break,
                Phase::Content => {
                    let take = self.remaining.min(bytes.len() - i);
                    self.request.body.extend_from_slice(&bytes[i..i + take]);
                    self.remaining -= take;
                    i += take;
                    if self.remaining == 0 {
                        self.phase = Phase::Done;
                    }
                }
                _ => {
                    self.header_bytes += 1;
                    if self.header_bytes > self.max_header_bytes {
                        return Err(HttpParseError::TooLarge {
                            section: "headers",
                            limit: self.max_header_bytes,
                        });
                    }
                    self.head_byte(bytes[i])?;
                    i += 1;
                }
            }
        }
        Ok(self.is_done())
    }

    fn head_byte(&mut self, byte: u8) -> Result<(), HttpParseError> {
        if self.skip_lf {
            self.skip_lf = false;
            if byte == b'\n' {
                if self.headers_finished {
                    self.enter_content()?;
                }
                return Ok(());
            }
            if self.headers_finished {
                // Bare CR after the header block: the byte already belongs to the body.
                self.enter_content()?;
                if self.phase == Phase::Content {
                    self.request.body.push(byte);
                    self.remaining -= 1;
                    if self.remaining == 0 {
                        self.phase = Phase::Done;
                    }
                }
                return Ok(());
            }
        }

        match self.phase {
            Phase::Method => match byte {
                b' ' => {
                    self.request.method = self.take_token();
                    self.phase = Phase::Url;
                }
                _ => self.token.push(byte),
            },
            Phase::Url => match byte {
                b' ' => {
                    self.request.url = self.take_token();
                    self.phase = Phase::Version;
                }
                _ => self.token.push(byte),
            },
            Phase::Version => match byte {
                b'\r' => {
                    self.request.version = self.take_token();
                    self.phase = Phase::Headers;
                    self.skip_lf = true;
                }
                _ => self.token.push(byte),
            },
            Phase::Headers => self.header_byte(byte),
            Phase::Content | Phase::Done => {}
        }
        Ok(())
    }

    fn take_token(&mut self) -> String {
        let token = String::from_utf8_lossy(&self.token).into_owned();
        self.token.clear();
        token
    }

    fn header_byte(&mut self, byte: u8) {
        match byte {
            b'\r' => {
                self.skip_lf = true;
                if !self.in_value && self.key.is_empty() {
                    self.headers_finished = true;
                } else {
                    self.finish_header();
                }
            }
            // Stray LF without a preceding CR.
            b'\n' => {}
            b':' if !self.in_value => {
                self.in_value = true;
                self.value_start = true;
            }
            b' ' if self.value_start => self.value_start = false,
            _ if self.in_value => {
                self.value_start = false;
                self.value.push(byte);
            }
            _ => self.key.push(byte),
        }
    }

    fn finish_header(&mut self) {
        let key = String::from_utf8_lossy(&self.key).into_owned();
        let value = String::from_utf8_lossy(&self.value).into_owned();
        if self.in_value {
            self.request.headers.insert(key, value);
        } else {
            trace!(line = %key, "Header line without ':' ignored");
        }
        self.key.clear();
        self.value.clear();
        self.in_value = false;
        self.value_start = false;
    }

    fn enter_content(&mut self) -> Result<(), HttpParseError> {
        let length = match self.request.header("Content-Length") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| HttpParseError::InvalidContentLength(raw.to_string()))?,
            None => 0,
        };
        if length > self.max_body_bytes {
            return Err(HttpParseError::TooLarge {
                section: "body",
                limit: self.max_body_bytes,
            });
        }

        self.remaining = length;
        if length == 0 {
            self.phase = Phase::Done;
        } else {
            self.request.body.reserve(length.min(64 * 1024));
            self.phase = Phase::Content;
        }
        Ok(())
    }
}
