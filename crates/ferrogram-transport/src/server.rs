//! Accept loop serving one request per connection.
//!
//! ## Architecture
//!
//! ```text
//! TcpListener ──▶ TlsAcceptor ──▶ RequestParser ──▶ HttpRouter ──▶ HttpResponse
//!   (accept)      (allow-list,     (incremental)     (host/prefix)   (written once,
//!                  handshake)                                          then close)
//! ```
//!
//! The accept loop runs on its own task and stops when the [`HttpServer`]
//! handle is dropped. Each connection gets its own task, bounded by an
//! inactivity timeout and an overall deadline for the whole request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use ferrogram_core::{TransportError, TransportResult};

use crate::http::{
    DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES, HttpRouter, RequestParser,
};
use crate::tls::{DEFAULT_HANDSHAKE_TIMEOUT, TlsAcceptor};

/// Default time a connection may stay silent before it is dropped.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed to receive one complete request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Limits applied to every connection.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub inactivity_timeout: Duration,
    /// Deadline for the complete request, counted after the handshake.
    pub request_timeout: Duration,
    pub handshake_timeout: Duration,
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// State shared by the accept loop and its connection tasks.
struct Shared {
    router: HttpRouter,
    acceptor: TlsAcceptor,
    options: ServerOptions,
}

/// A bound listener.
///
/// The listener stops accepting when this handle is dropped.
pub struct HttpServer {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown_token: CancellationToken,
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

impl HttpServer {
    /// Binds `addr` and starts accepting plaintext connections from anyone.
    pub async fn bind(addr: SocketAddr, options: ServerOptions) -> TransportResult<Self> {
        let acceptor = TlsAcceptor::new(options.handshake_timeout);
        Self::bind_with_acceptor(addr, options, acceptor).await
    }

    /// Binds `addr` with an acceptor whose identity and allow-list are
    /// already in place, so the first accepted connection sees them.
    pub async fn bind_with_acceptor(
        addr: SocketAddr,
        options: ServerOptions,
        acceptor: TlsAcceptor,
    ) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;

        let shared = Arc::new(Shared {
            router: HttpRouter::new(),
            acceptor,
            options,
        });
        let shutdown_token = CancellationToken::new();

        tokio::spawn(accept_loop(
            listener,
            shared.clone(),
            shutdown_token.clone(),
        ));
        info!(addr = %local_addr, "HTTP server listening");

        Ok(Self {
            local_addr,
            shared,
            shutdown_token,
        })
    }

    /// The address the OS actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn router(&self) -> &HttpRouter {
        &self.shared.router
    }

    pub fn acceptor(&self) -> &TlsAcceptor {
        &self.shared.acceptor
    }

    /// Stops accepting new connections.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, token: CancellationToken) {
    loop {
        tokio::select! {
            () = token.cancelled() => {
                info!(addr = ?listener.local_addr().ok(), "HTTP server shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!(peer = %peer, "Accepted connection");
                    tokio::spawn(serve_connection(stream, peer, shared.clone()));
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>) {
    let Some(mut stream) = shared.acceptor.accept(stream, peer).await else {
        return;
    };

    let options = &shared.options;
    let mut parser = RequestParser::with_limits(options.max_header_bytes, options.max_body_bytes);
    let mut buf = vec![0u8; 8 * 1024];
    let deadline = Instant::now() + options.request_timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!(peer = %peer, phase = ?parser.phase(), "Request deadline passed, dropping");
            return;
        }
        let wait = options.inactivity_timeout.min(remaining);
        let read = tokio::time::timeout(wait, stream.read(&mut buf)).await;
        let n = match read {
            Ok(Ok(0)) => {
                debug!(peer = %peer, phase = ?parser.phase(), "Connection closed before request completed");
                return;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                debug!(peer = %peer, error = %e, "Read failed");
                return;
            }
            Err(_) => {
                debug!(peer = %peer, phase = ?parser.phase(), "Connection timed out, dropping");
                return;
            }
        };
        match parser.feed(&buf[..n]) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => {
                debug!(peer = %peer, error = %e, "Malformed request");
                return;
            }
        }
    }

    let request = parser.into_request();
    debug!(
        peer = %peer,
        method = %request.method,
        path = %request.path(),
        len = request.body.len(),
        "Received HTTP request",
    );

    if let Some(response) = shared.router.dispatch(&request).await
        && let Some(bytes) = response.to_bytes()
    {
        if let Err(e) = stream.write_all(&bytes).await {
            debug!(peer = %peer, error = %e, "Write failed");
            return;
        }
        let _ = stream.flush().await;
    }
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::tls::test_support::self_signed;
    use crate::tls::{AllowList, parse_certificates, parse_private_key};
    use http::StatusCode;
    use parking_lot::Mutex;

    async fn plain_server() -> HttpServer {
        HttpServer::bind("127.0.0.1:0".parse().unwrap(), ServerOptions::default())
            .await
            .unwrap()
    }

    async fn roundtrip(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
        let mut client = TcpStream::connect(addr).await.unwrap();
        let _ = client.write_all(request).await;
        let mut out = Vec::new();
        // Rejected connections may end in a reset; whatever arrived is kept.
        let _ = client.read_to_end(&mut out).await;
        out
    }

    #[tokio::test]
    async fn test_request_is_routed_and_answered() {
        let server = plain_server().await;
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let seen = bodies.clone();
        server.router().register(
            "hook.test",
            "/secret",
            Arc::new(move |request: &HttpRequest, response: &mut HttpResponse| {
                seen.lock().push(request.body.clone());
                response.set_status(StatusCode::OK);
            }),
        );

        let answer = roundtrip(
            server.local_addr(),
            b"POST /secret HTTP/1.1\r\nHost: hook.test:8443\r\nContent-Length: 4\r\n\r\n{\"a\"",
        )
        .await;

        assert_eq!(answer, b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(*bodies.lock(), vec![b"{\"a\"".to_vec()]);
    }

    #[tokio::test]
    async fn test_unrouted_request_gets_no_bytes() {
        let server = plain_server().await;
        let answer = roundtrip(
            server.local_addr(),
            b"GET / HTTP/1.1\r\nHost: nobody\r\n\r\n",
        )
        .await;
        assert!(answer.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_connection_is_dropped() {
        let options = ServerOptions {
            inactivity_timeout: Duration::from_millis(50),
            ..ServerOptions::default()
        };
        let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), options)
            .await
            .unwrap();

        let answer = roundtrip(server.local_addr(), b"POST / HTTP/1.1\r\nContent-Le").await;
        assert!(answer.is_empty());
    }

    #[tokio::test]
    async fn test_trickling_client_hits_request_deadline() {
        let options = ServerOptions {
            inactivity_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(300),
            ..ServerOptions::default()
        };
        let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), options)
            .await
            .unwrap();
        server.router().register(
            "h",
            "/",
            Arc::new(|_: &HttpRequest, response: &mut HttpResponse| {
                response.set_status(StatusCode::OK);
            }),
        );

        let mut client = TcpStream::connect(server.local_addr()).await.unwrap();
        let request = b"POST / HTTP/1.1\r\nHost: h\r\nContent-Length: 64\r\n\r\n";
        let _ = client.write_all(request).await;
        // The whole body arrives, 8 bytes every 100 ms, after the deadline.
        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client.write_all(&[b'x'; 8]).await.is_err() {
                break;
            }
        }
        let mut answer = Vec::new();
        let _ = client.read_to_end(&mut answer).await;

        assert!(answer.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_peer_is_closed() {
        let server = plain_server().await;
        server
            .acceptor()
            .extend_allow_list(&AllowList::parse(["149.154.160.0/20"]).unwrap());
        server.router().register(
            "h",
            "/",
            Arc::new(|_: &HttpRequest, response: &mut HttpResponse| {
                response.set_status(StatusCode::OK);
            }),
        );

        let answer = roundtrip(server.local_addr(), b"GET / HTTP/1.1\r\nHost: h\r\n\r\n").await;
        assert!(!answer.starts_with(b"HTTP/"));
    }

    #[tokio::test]
    async fn test_prepared_acceptor_applies_from_first_connection() {
        let acceptor = TlsAcceptor::new(DEFAULT_HANDSHAKE_TIMEOUT);
        acceptor.extend_allow_list(&AllowList::parse(["10.0.0.0/8"]).unwrap());
        let server = HttpServer::bind_with_acceptor(
            "127.0.0.1:0".parse().unwrap(),
            ServerOptions::default(),
            acceptor,
        )
        .await
        .unwrap();
        server.router().register(
            "h",
            "/",
            Arc::new(|_: &HttpRequest, response: &mut HttpResponse| {
                response.set_status(StatusCode::OK);
            }),
        );

        let answer = roundtrip(server.local_addr(), b"GET / HTTP/1.1\r\nHost: h\r\n\r\n").await;
        assert!(!answer.starts_with(b"HTTP/"));
    }

    #[tokio::test]
    async fn test_drop_stops_accepting() {
        let server = plain_server().await;
        let addr = server.local_addr();
        drop(server);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_identity_switches_future_connections_to_tls() {
        let server = plain_server().await;
        let generated = self_signed(Some("localhost"));
        server
            .acceptor()
            .append_certificates(parse_certificates(generated.cert_pem.as_bytes()).unwrap());
        server
            .acceptor()
            .set_private_key(parse_private_key(generated.key_pem.as_bytes()).unwrap());
        server.router().register(
            "localhost",
            "/",
            Arc::new(|_: &HttpRequest, response: &mut HttpResponse| {
                response.set_status(StatusCode::OK);
            }),
        );

        // A plaintext client now fails the handshake and never sees HTTP.
        let answer = roundtrip(
            server.local_addr(),
            b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;
        assert!(!answer.starts_with(b"HTTP/"));
    }

    #[tokio::test]
    async fn test_tls_request_is_answered_over_encrypted_stream() {
        let generated = self_signed(Some("localhost"));
        let certificates = parse_certificates(generated.cert_pem.as_bytes()).unwrap();
        let acceptor = TlsAcceptor::new(DEFAULT_HANDSHAKE_TIMEOUT);
        acceptor.append_certificates(certificates.clone());
        acceptor.set_private_key(parse_private_key(generated.key_pem.as_bytes()).unwrap());
        let server = HttpServer::bind_with_acceptor(
            "127.0.0.1:0".parse().unwrap(),
            ServerOptions::default(),
            acceptor,
        )
        .await
        .unwrap();
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let seen = bodies.clone();
        server.router().register(
            "localhost",
            "/token",
            Arc::new(move |request: &HttpRequest, response: &mut HttpResponse| {
                seen.lock().push(request.body.clone());
                response.set_status(StatusCode::OK);
            }),
        );

        let mut roots = rustls::RootCertStore::empty();
        roots.add(certificates[0].clone()).unwrap();
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
        let connector = tokio_rustls::TlsConnector::from(Arc::new(config));
        let name = rustls::pki_types::ServerName::try_from("localhost").unwrap();

        let tcp = TcpStream::connect(server.local_addr()).await.unwrap();
        let mut client = connector.connect(name, tcp).await.unwrap();
        client
            .write_all(b"POST /token HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\n\r\n{}")
            .await
            .unwrap();
        let mut answer = Vec::new();
        // The server answers once, then closes.
        let _ = client.read_to_end(&mut answer).await;

        assert_eq!(answer, b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(*bodies.lock(), vec![b"{}".to_vec()]);
    }
}
