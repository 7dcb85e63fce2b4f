//! Connection gate: allow-list check, then an optional TLS handshake.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tracing::{debug, warn};

use ferrogram_core::IdentityResult;

use super::allow_list::AllowList;
use super::identity::TlsIdentity;

/// Default bound on the TLS handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// An accepted connection, encrypted or not.
pub enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl MaybeTlsStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Admits connections for a listener.
///
/// Identity and allow-list may change while the listener runs; changes
/// apply to connections accepted afterwards.
pub struct TlsAcceptor {
    identity: RwLock<TlsIdentity>,
    allow_list: RwLock<AllowList>,
    /// Built lazily from the identity, dropped whenever it changes.
    config: Mutex<Option<Arc<ServerConfig>>>,
    handshake_timeout: Duration,
}

impl Default for TlsAcceptor {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl TlsAcceptor {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self {
            identity: RwLock::new(TlsIdentity::new()),
            allow_list: RwLock::new(AllowList::new()),
            config: Mutex::new(None),
            handshake_timeout,
        }
    }

    pub fn append_certificates(&self, certs: impl IntoIterator<Item = CertificateDer<'static>>) {
        self.identity.write().append_certificates(certs);
        *self.config.lock() = None;
    }

    /// Sets the private key; future connections are served over TLS.
    pub fn set_private_key(&self, key: PrivateKeyDer<'static>) {
        self.identity.write().set_private_key(key);
        *self.config.lock() = None;
    }

    pub fn has_key(&self) -> bool {
        self.identity.read().has_key()
    }

    pub fn key_matches(&self, key: &PrivateKeyDer<'_>) -> bool {
        self.identity.read().key_matches(key)
    }

    /// Validates the current identity by building its TLS configuration.
    pub fn check_identity(&self) -> IdentityResult<()> {
        self.server_config().map(|_| ())
    }

    pub fn extend_allow_list(&self, entries: &AllowList) {
        self.allow_list.write().extend(entries);
    }

    pub fn allow_list(&self) -> AllowList {
        self.allow_list.read().clone()
    }

    fn server_config(&self) -> IdentityResult<Option<Arc<ServerConfig>>> {
        let mut cached = self.config.lock();
        if let Some(config) = cached.as_ref() {
            return Ok(Some(config.clone()));
        }
        let built = self.identity.read().server_config()?;
        *cached = built.clone();
        Ok(built)
    }

    /// Admits `stream` or drops it.
    ///
    /// Rejected peers are closed without reading. With a key configured only
    /// completed handshakes are returned.
    pub async fn accept(&self, stream: TcpStream, peer: SocketAddr) -> Option<MaybeTlsStream> {
        if !self.allow_list.read().permits(peer.ip()) {
            debug!(peer = %peer, "Connection rejected by allow-list");
            return None;
        }

        let config = match self.server_config() {
            Ok(Some(config)) => config,
            Ok(None) => return Some(MaybeTlsStream::Plain(stream)),
            Err(e) => {
                warn!(peer = %peer, error = %e, "TLS identity unusable, dropping connection");
                return None;
            }
        };

        let acceptor = tokio_rustls::TlsAcceptor::from(config);
        match tokio::time::timeout(self.handshake_timeout, acceptor.accept(stream)).await {
            Ok(Ok(tls)) => Some(MaybeTlsStream::Tls(Box::new(tls))),
            Ok(Err(e)) => {
                debug!(peer = %peer, error = %e, "TLS handshake failed");
                None
            }
            Err(_) => {
                debug!(peer = %peer, "TLS handshake timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::identity::test_support::self_signed;
    use crate::tls::identity::{parse_certificates, parse_private_key};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, peer) = listener.accept().await.unwrap();
        (client, server, peer)
    }

    #[tokio::test]
    async fn test_plaintext_without_key() {
        let acceptor = TlsAcceptor::default();
        let (_client, server, peer) = connected_pair().await;
        let stream = acceptor.accept(server, peer).await.unwrap();
        assert!(!stream.is_tls());
    }

    #[tokio::test]
    async fn test_allow_list_rejects_peer() {
        let acceptor = TlsAcceptor::default();
        acceptor.extend_allow_list(&AllowList::parse(["192.168.0.0/16"]).unwrap());
        let (_client, server, peer) = connected_pair().await;
        assert!(acceptor.accept(server, peer).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_handshake_is_dropped() {
        let generated = self_signed(Some("localhost"));
        let acceptor = TlsAcceptor::new(Duration::from_secs(5));
        acceptor.append_certificates(parse_certificates(generated.cert_pem.as_bytes()).unwrap());
        acceptor.set_private_key(parse_private_key(generated.key_pem.as_bytes()).unwrap());
        assert!(acceptor.check_identity().is_ok());

        let (mut client, server, peer) = connected_pair().await;
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        assert!(acceptor.accept(server, peer).await.is_none());
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let generated = self_signed(Some("localhost"));
        let acceptor = TlsAcceptor::new(Duration::from_millis(50));
        acceptor.append_certificates(parse_certificates(generated.cert_pem.as_bytes()).unwrap());
        acceptor.set_private_key(parse_private_key(generated.key_pem.as_bytes()).unwrap());

        let (_client, server, peer) = connected_pair().await;
        assert!(acceptor.accept(server, peer).await.is_none());
    }
}
