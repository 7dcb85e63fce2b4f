//! Webhook delivery.
//!
//! ```text
//! configure(options)
//!   ├─ load cert (CN = public host) and key
//!   ├─ ServerRegistry[port]
//!   │    ├─ present: key must match, append cert
//!   │    └─ absent:  TlsAcceptor(cert, key, allow-list) ─▶ HttpServer::bind
//!   ├─ route (host, /{token}) ─▶ Dispatcher::process(body, single) ─▶ 200 OK
//!   └─ setWebhook https://{host}:{port}/{token} + certificate upload
//! ```
//!
//! Every bot served on one port shares that port's private key; each
//! brings its own certificate and route.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use ferrogram_core::{IdentityError, InputFile, UpdateKinds, WebhookInfo};
use ferrogram_framework::Dispatcher;
use ferrogram_transport::http::{HttpHandler, HttpRequest, HttpResponse};
use ferrogram_transport::tls::{
    CertificateDer, PrivateKeyDer, common_name, parse_certificates, parse_private_key,
    read_pem_file,
};
use ferrogram_transport::{AllowList, HttpServer, TlsAcceptor};

use crate::bot::{Bot, WebhookRegistration};
use crate::config::{ConfigError, ConfigResult, WebhookConfig};
use crate::error::{WebhookError, WebhookResult};
use crate::registry::ServerRegistry;

/// Address ranges the remote API delivers webhooks from.
pub const PUBLISHED_RANGES: [&str; 2] = ["149.154.160.0/20", "91.108.4.0/22"];

/// The allow-list installed on every new webhook server.
pub fn published_allow_list() -> AllowList {
    PUBLISHED_RANGES
        .iter()
        .filter_map(|range| range.parse().ok())
        .collect()
}

// =============================================================================
// Options
// =============================================================================

/// Parameters of [`WebhookEndpoint::configure`].
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookOptions {
    pub port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub max_connections: Option<u32>,
    pub allowed: UpdateKinds,
    /// Local address to listen on.
    pub bind_ip: IpAddr,
    /// Peers admitted in addition to [`PUBLISHED_RANGES`].
    pub allow_list: AllowList,
}

impl WebhookOptions {
    pub fn new(port: u16, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            port,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            max_connections: None,
            allowed: UpdateKinds::empty(),
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            allow_list: AllowList::new(),
        }
    }

    pub fn from_config(config: &WebhookConfig) -> ConfigResult<Self> {
        let allow_list = AllowList::parse(&config.allow_list)
            .map_err(|e| ConfigError::InvalidAllowEntry(e.0))?;
        Ok(Self {
            port: config.port,
            cert_path: config.cert_path.clone(),
            key_path: config.key_path.clone(),
            max_connections: config.max_connections,
            allowed: config.allowed_updates,
            bind_ip: config.bind_address,
            allow_list,
        })
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn allowed(mut self, kinds: UpdateKinds) -> Self {
        self.allowed = kinds;
        self
    }

    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    pub fn allow(mut self, list: &AllowList) -> Self {
        self.allow_list.extend(list);
        self
    }
}

// =============================================================================
// Route
// =============================================================================

/// Feeds webhook bodies to the dispatcher.
///
/// The answer is always `200 OK` so the remote side never retries a body
/// that failed to decode.
struct WebhookRoute {
    dispatcher: Arc<Dispatcher>,
}

#[async_trait]
impl HttpHandler for WebhookRoute {
    async fn handle(&self, request: &HttpRequest, response: &mut HttpResponse) {
        if let Err(e) = self.dispatcher.process(&request.body, true).await {
            warn!(error = %e, len = request.body.len(), "Dropping webhook body");
        }
        response.set_status(StatusCode::OK);
    }
}

// =============================================================================
// WebhookEndpoint
// =============================================================================

/// Receives one bot's updates through a webhook.
pub struct WebhookEndpoint {
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ServerRegistry>,
    token: String,
    /// (port, host) pairs that already carry this bot's route.
    routed: Mutex<HashSet<(u16, String)>>,
}

impl WebhookEndpoint {
    pub fn new(
        bot: Bot,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<ServerRegistry>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            bot,
            dispatcher,
            registry,
            token: token.into(),
            routed: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// Serves the webhook and announces it with `setWebhook`.
    ///
    /// # Errors
    /// - [`WebhookError::Identity`]: unreadable certificate or key, or a
    ///   certificate without a common name
    /// - [`WebhookError::KeyMismatch`]: the port serves another key
    /// - [`WebhookError::Bind`]: the port cannot be bound
    /// - [`WebhookError::Api`] or [`WebhookError::Rejected`]: the remote
    ///   API did not accept the webhook
    pub async fn configure(&self, options: &WebhookOptions) -> WebhookResult<WebhookInfo> {
        let cert_pem = read_pem_file(&options.cert_path).await?;
        let certs = parse_certificates(&cert_pem)?;
        let leaf = certs
            .first()
            .ok_or_else(|| IdentityError::InvalidCertificate("empty chain".into()))?;
        let host = common_name(leaf)?.to_ascii_lowercase();
        let key = parse_private_key(&read_pem_file(&options.key_path).await?)?;

        let server = self.acquire_server(options, certs, key).await?;
        let port = server.local_addr().port();

        if self.routed.lock().insert((options.port, host.clone())) {
            server.router().register(
                &host,
                format!("/{}", self.token),
                Arc::new(WebhookRoute {
                    dispatcher: self.dispatcher.clone(),
                }),
            );
        }

        let url = format!("https://{host}:{port}/{}", self.token);
        let registration = WebhookRegistration {
            url,
            certificate: Some(InputFile::bytes("cert.pem", cert_pem)),
            max_connections: options.max_connections,
            allowed_updates: options.allowed,
        };
        if !self.bot.set_webhook(registration).await? {
            return Err(WebhookError::Rejected);
        }
        info!(host = %host, port, "Webhook configured");

        Ok(self.bot.get_webhook_info().await?)
    }

    async fn acquire_server(
        &self,
        options: &WebhookOptions,
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> WebhookResult<Arc<HttpServer>> {
        let mut servers = self.registry.lock().await;

        if let Some(server) = servers.get(options.port) {
            let acceptor = server.acceptor();
            if !acceptor.key_matches(&key) {
                return Err(WebhookError::KeyMismatch { port: options.port });
            }
            acceptor.append_certificates(certs);
            acceptor.extend_allow_list(&options.allow_list);
            debug!(port = options.port, "Reusing webhook server");
            return Ok(server);
        }

        let server_options = self.registry.options().clone();
        let acceptor = TlsAcceptor::new(server_options.handshake_timeout);
        acceptor.append_certificates(certs);
        acceptor.set_private_key(key);
        acceptor.check_identity()?;
        acceptor.extend_allow_list(&published_allow_list());
        acceptor.extend_allow_list(&options.allow_list);

        let addr = SocketAddr::new(options.bind_ip, options.port);
        let server = Arc::new(HttpServer::bind_with_acceptor(addr, server_options, acceptor).await?);
        servers.insert(options.port, server.clone());
        Ok(server)
    }
}

impl std::fmt::Debug for WebhookEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookEndpoint")
            .field("bot", &self.bot)
            .field("routes", &self.routed.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCaller;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
    use std::path::Path;

    const TOKEN: &str = "123:abc";

    fn write_identity(dir: &Path, name: &str, cn: Option<&str>, key: &KeyPair) -> (PathBuf, PathBuf) {
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.distinguished_name = DistinguishedName::new();
        if let Some(cn) = cn {
            params.distinguished_name.push(DnType::CommonName, cn);
        }
        let cert = params.self_signed(key).unwrap();
        let cert_path = dir.join(format!("{name}.crt"));
        let key_path = dir.join(format!("{name}.key"));
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key.serialize_pem()).unwrap();
        (cert_path, key_path)
    }

    fn local(cert: &Path, key: &Path) -> WebhookOptions {
        WebhookOptions::new(0, cert, key).bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn endpoint(
        mock: &Arc<MockCaller>,
        registry: &Arc<ServerRegistry>,
        token: &str,
    ) -> (WebhookEndpoint, Arc<Dispatcher>) {
        mock.respond(
            "getWebhookInfo",
            r#"{"ok":true,"result":{"url":"https://bot.test/","has_custom_certificate":true,"pending_update_count":0}}"#,
        );
        let dispatcher = Arc::new(Dispatcher::new());
        let endpoint = WebhookEndpoint::new(
            Bot::new(mock.clone()),
            dispatcher.clone(),
            registry.clone(),
            token,
        );
        (endpoint, dispatcher)
    }

    fn post(host: &str, url: &str, body: &[u8]) -> HttpRequest {
        let mut request = HttpRequest {
            method: "POST".into(),
            url: url.into(),
            version: "HTTP/1.1".into(),
            body: body.to_vec(),
            ..Default::default()
        };
        request.headers.insert("Host".into(), host.into());
        request
    }

    #[tokio::test]
    async fn test_configure_binds_routes_and_announces() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let (cert, key_path) = write_identity(dir.path(), "bot", Some("Bot.Test"), &key);
        let mock = Arc::new(MockCaller::new());
        let registry = Arc::new(ServerRegistry::default());
        let (endpoint, _) = endpoint(&mock, &registry, TOKEN);

        let options = local(&cert, &key_path)
            .max_connections(5)
            .allowed(UpdateKinds::from(ferrogram_core::UpdateKind::Message));
        let info = tokio_test::assert_ok!(endpoint.configure(&options).await);
        assert!(info.has_custom_certificate);

        let server = registry.get(0).await.unwrap();
        let port = server.local_addr().port();
        assert_eq!(server.router().route_count("bot.test"), 1);

        let calls = mock.calls_to("setWebhook");
        assert_eq!(calls.len(), 1);
        let expected = format!("https://bot.test:{port}/{TOKEN}");
        assert_eq!(calls[0].get("url"), Some(expected.as_str()));
        assert_eq!(calls[0].get("max_connections"), Some("5"));
        assert_eq!(calls[0].get("allowed_updates"), Some(r#"["message"]"#));
        assert_eq!(calls[0].uploads()[0].0, "certificate");
    }

    #[tokio::test]
    async fn test_route_feeds_dispatcher_and_always_answers_ok() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let (cert, key_path) = write_identity(dir.path(), "bot", Some("bot.test"), &key);
        let mock = Arc::new(MockCaller::new());
        let registry = Arc::new(ServerRegistry::default());
        let (endpoint, dispatcher) = endpoint(&mock, &registry, TOKEN);
        endpoint.configure(&local(&cert, &key_path)).await.unwrap();
        let server = registry.get(0).await.unwrap();

        let body = br#"{"update_id":9,"message":{"message_id":1,"date":0,"chat":{"id":1,"type":"private"},"text":"hi"}}"#;
        let response = server
            .router()
            .dispatch(&post("bot.test:8443", &format!("/{TOKEN}"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), Some(StatusCode::OK));
        assert_eq!(dispatcher.last_update_id(), Some(9));

        let response = server
            .router()
            .dispatch(&post("bot.test", &format!("/{TOKEN}"), b"{broken"))
            .await
            .unwrap();
        assert_eq!(response.status(), Some(StatusCode::OK));
        assert_eq!(dispatcher.last_update_id(), Some(9));

        assert!(server
            .router()
            .dispatch(&post("bot.test", "/456:def", body))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_bots_share_a_port_with_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let (cert_a, key_a) = write_identity(dir.path(), "a", Some("a.test"), &key);
        let (cert_b, key_b) = write_identity(dir.path(), "b", Some("b.test"), &key);
        let registry = Arc::new(ServerRegistry::default());

        let mock_a = Arc::new(MockCaller::new());
        let (first, _) = endpoint(&mock_a, &registry, "1:a");
        first.configure(&local(&cert_a, &key_a)).await.unwrap();

        let mock_b = Arc::new(MockCaller::new());
        let (second, _) = endpoint(&mock_b, &registry, "2:b");
        second.configure(&local(&cert_b, &key_b)).await.unwrap();

        assert_eq!(registry.ports().await, vec![0]);
        let server = registry.get(0).await.unwrap();
        assert_eq!(server.router().route_count("a.test"), 1);
        assert_eq!(server.router().route_count("b.test"), 1);
    }

    #[tokio::test]
    async fn test_other_key_on_same_port_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (cert_a, key_a) =
            write_identity(dir.path(), "a", Some("a.test"), &KeyPair::generate().unwrap());
        let (cert_b, key_b) =
            write_identity(dir.path(), "b", Some("b.test"), &KeyPair::generate().unwrap());
        let registry = Arc::new(ServerRegistry::default());
        let mock = Arc::new(MockCaller::new());

        let (first, _) = endpoint(&mock, &registry, "1:a");
        first.configure(&local(&cert_a, &key_a)).await.unwrap();
        let (second, _) = endpoint(&mock, &registry, "2:b");
        let result = second.configure(&local(&cert_b, &key_b)).await;

        assert!(matches!(result, Err(WebhookError::KeyMismatch { port: 0 })));
        assert_eq!(mock.calls_to("setWebhook").len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_configure_keeps_one_route() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let (cert, key_path) = write_identity(dir.path(), "bot", Some("bot.test"), &key);
        let mock = Arc::new(MockCaller::new());
        let registry = Arc::new(ServerRegistry::default());
        let (endpoint, _) = endpoint(&mock, &registry, TOKEN);
        mock.respond("getWebhookInfo", r#"{"ok":true,"result":{}}"#);

        endpoint.configure(&local(&cert, &key_path)).await.unwrap();
        endpoint.configure(&local(&cert, &key_path)).await.unwrap();

        let server = registry.get(0).await.unwrap();
        assert_eq!(server.router().route_count("bot.test"), 1);
        assert_eq!(mock.calls_to("setWebhook").len(), 2);
    }

    #[tokio::test]
    async fn test_missing_common_name_is_an_identity_error() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let (cert, key_path) = write_identity(dir.path(), "bot", None, &key);
        let mock = Arc::new(MockCaller::new());
        let registry = Arc::new(ServerRegistry::default());
        let (endpoint, _) = endpoint(&mock, &registry, TOKEN);

        let result = endpoint.configure(&local(&cert, &key_path)).await;
        assert!(matches!(
            result,
            Err(WebhookError::Identity(IdentityError::MissingCommonName))
        ));
        assert!(registry.ports().await.is_empty());
    }

    #[tokio::test]
    async fn test_bind_failure_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let (cert, key_path) = write_identity(dir.path(), "bot", Some("bot.test"), &key);
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        let mock = Arc::new(MockCaller::new());
        let registry = Arc::new(ServerRegistry::default());
        let (endpoint, _) = endpoint(&mock, &registry, TOKEN);

        let mut options = local(&cert, &key_path);
        options.port = port;
        let result = endpoint.configure(&options).await;

        assert!(matches!(result, Err(WebhookError::Bind(_))));
        assert!(registry.get(port).await.is_none());
        assert!(mock.calls_to("setWebhook").is_empty());
    }

    #[tokio::test]
    async fn test_rejected_registration() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let (cert, key_path) = write_identity(dir.path(), "bot", Some("bot.test"), &key);
        let mock = Arc::new(MockCaller::new());
        mock.respond("setWebhook", r#"{"ok":true,"result":false}"#);
        let registry = Arc::new(ServerRegistry::default());
        let (endpoint, _) = endpoint(&mock, &registry, TOKEN);

        let result = endpoint.configure(&local(&cert, &key_path)).await;
        assert!(matches!(result, Err(WebhookError::Rejected)));
    }

    #[tokio::test]
    async fn test_allow_list_has_published_ranges_and_extras() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let (cert, key_path) = write_identity(dir.path(), "bot", Some("bot.test"), &key);
        let mock = Arc::new(MockCaller::new());
        let registry = Arc::new(ServerRegistry::default());
        let (endpoint, _) = endpoint(&mock, &registry, TOKEN);

        let extra = AllowList::parse(["127.0.0.1"]).unwrap();
        endpoint
            .configure(&local(&cert, &key_path).allow(&extra))
            .await
            .unwrap();

        let allow = registry.get(0).await.unwrap().acceptor().allow_list();
        assert!(allow.permits("149.154.167.1".parse().unwrap()));
        assert!(allow.permits("91.108.4.200".parse().unwrap()));
        assert!(allow.permits("127.0.0.1".parse().unwrap()));
        assert!(!allow.permits("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_options_from_config() {
        let config = WebhookConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8443,
            cert_path: "cert.pem".into(),
            key_path: "key.pem".into(),
            max_connections: Some(40),
            allowed_updates: UpdateKinds::empty(),
            allow_list: vec!["10.0.0.0/8".into()],
            inactivity_timeout_ms: 30_000,
            request_timeout_ms: 120_000,
            handshake_timeout_ms: 10_000,
        };
        let options = WebhookOptions::from_config(&config).unwrap();
        assert_eq!(options.port, 8443);
        assert_eq!(options.max_connections, Some(40));
        assert!(options.allow_list.permits("10.1.2.3".parse().unwrap()));

        let bad = WebhookConfig {
            allow_list: vec!["nonsense".into()],
            ..config
        };
        assert!(matches!(
            WebhookOptions::from_config(&bad),
            Err(ConfigError::InvalidAllowEntry(_))
        ));
    }
}
