//! HTTP response assembled by route handlers.

use http::StatusCode;

/// A response under construction.
///
/// The status starts unset; a response whose status is never set is not
/// written at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: Option<StatusCode>,
    version: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponse {
    pub fn new() -> Self {
        Self {
            status: None,
            version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Sets a header, replacing any value stored under the same name
    /// (ignoring ASCII case).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Serializes the response, or returns `None` while the status is unset.
    ///
    /// A `Content-Length` header is synthesized for a non-empty body unless
    /// a handler already set one.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let status = self.status?;
        let reason = status.canonical_reason().unwrap_or("");

        let mut head = format!("{} {} {}\r\n", self.version, status.as_u16(), reason);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        if !self.body.is_empty() && self.header("Content-Length").is_none() {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_status_writes_nothing() {
        let mut response = HttpResponse::new();
        response.set_body("ignored");
        assert_eq!(response.to_bytes(), None);
    }

    #[test]
    fn test_ok_with_header_and_body() {
        let mut response = HttpResponse::new();
        response.set_status(StatusCode::OK);
        response.set_header("Content-Type", "text/plain");
        response.set_body("hello");

        let bytes = response.to_bytes().unwrap();
        assert_eq!(
            bytes,
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello"
        );
    }

    #[test]
    fn test_empty_body_has_no_content_length() {
        let mut response = HttpResponse::new();
        response.set_status(StatusCode::OK);
        assert_eq!(response.to_bytes().unwrap(), b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn test_explicit_content_length_is_kept() {
        let mut response = HttpResponse::new();
        response.set_status(StatusCode::NOT_FOUND);
        response.set_header("content-length", "3");
        response.set_header("Content-Length", "2");
        response.set_body("no");

        let text = String::from_utf8(response.to_bytes().unwrap()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(text.matches("ength: ").count(), 1);
        assert!(text.contains("content-length: 2\r\n"));
    }
}
