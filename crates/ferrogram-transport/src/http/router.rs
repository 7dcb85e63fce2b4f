//! Host and path-prefix routing of parsed requests.
//!
//! ```text
//! bot.example.org
//! ├── /123:abc   → WebhookRoute (bot A)
//! └── /456:def   → WebhookRoute (bot B)
//! ```
//!
//! Every route whose prefix is a prefix of the request path runs, in
//! registration order, against one shared response.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::parser::HttpRequest;
use super::response::HttpResponse;

/// A route handler.
///
/// Plain closures `Fn(&HttpRequest, &mut HttpResponse)` implement this trait.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn handle(&self, request: &HttpRequest, response: &mut HttpResponse);
}

#[async_trait]
impl<F> HttpHandler for F
where
    F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync,
{
    async fn handle(&self, request: &HttpRequest, response: &mut HttpResponse) {
        self(request, response)
    }
}

type RouteList = Vec<(String, Arc<dyn HttpHandler>)>;

/// Route table: host → ordered (path prefix, handler) list.
#[derive(Default)]
pub struct HttpRouter {
    routes: RwLock<HashMap<String, RouteList>>,
}

impl HttpRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route. Hosts compare case-insensitively.
    pub fn register(
        &self,
        host: impl AsRef<str>,
        path_prefix: impl Into<String>,
        handler: Arc<dyn HttpHandler>,
    ) {
        let host = host.as_ref().to_ascii_lowercase();
        let prefix = path_prefix.into();
        debug!(host = %host, prefix = %prefix, "Registered HTTP route");
        self.routes
            .write()
            .entry(host)
            .or_default()
            .push((prefix, handler));
    }

    /// Number of routes registered for `host`.
    pub fn route_count(&self, host: &str) -> usize {
        self.routes
            .read()
            .get(&host.to_ascii_lowercase())
            .map_or(0, Vec::len)
    }

    /// Runs every matching handler and returns the response to write.
    ///
    /// Returns `None` when the host is unknown or no handler set a status.
    pub async fn dispatch(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let host = request.host()?;
        let path = request.path();

        let matching: Vec<Arc<dyn HttpHandler>> = {
            let routes = self.routes.read();
            let Some(list) = routes.get(&host) else {
                trace!(host = %host, "No routes for host");
                return None;
            };
            list.iter()
                .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
                .map(|(_, handler)| handler.clone())
                .collect()
        };

        trace!(host = %host, path = %path, handlers = matching.len(), "Dispatching request");

        let mut response = HttpResponse::new();
        for handler in matching {
            handler.handle(request, &mut response).await;
        }

        response.status().is_some().then_some(response)
    }
}
