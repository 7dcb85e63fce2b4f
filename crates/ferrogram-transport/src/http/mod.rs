//! Minimal HTTP/1.1 server side: request parsing, routing and responses.
//!
//! This is just enough HTTP to receive webhook deliveries: one request per
//! connection, `Content-Length` bodies only, no chunked encoding.

mod parser;
mod response;
mod router;

pub use parser::{
    DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES, HttpParseError, HttpRequest, Phase,
    RequestParser,
};
pub use response::HttpResponse;
pub use router::{HttpHandler, HttpRouter};
