//! Registry of webhook servers, one per listening port.
//!
//! Several bots may receive webhooks on the same port as long as they share
//! the server's private key; each bot adds its own certificate and route.
//! The registry is an ordinary value shared through an `Arc`, so tests and
//! independent runtimes each get their own.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use ferrogram_transport::{HttpServer, ServerOptions};

/// Map of port to running webhook server.
pub struct ServerRegistry {
    /// Held across the bind of a new server so two configurations of one
    /// port cannot both bind.
    servers: Mutex<HashMap<u16, Arc<HttpServer>>>,
    options: ServerOptions,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new(ServerOptions::default())
    }
}

impl ServerRegistry {
    /// Creates an empty registry whose new servers use `options`.
    pub fn new(options: ServerOptions) -> Self {
        Self {
            servers: Mutex::new(HashMap::new()),
            options,
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Returns the server registered for `port`.
    pub async fn get(&self, port: u16) -> Option<Arc<HttpServer>> {
        self.servers.lock().await.get(&port).cloned()
    }

    /// Ports with a running server.
    pub async fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.servers.lock().await.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Removes the server of `port` and stops it from accepting.
    ///
    /// Returns false if no server was registered.
    pub async fn remove(&self, port: u16) -> bool {
        let removed = self.servers.lock().await.remove(&port);
        match removed {
            Some(server) => {
                server.shutdown();
                info!(port, "Webhook server removed");
                true
            }
            None => false,
        }
    }

    /// Locks the registry for a lookup-or-insert sequence.
    pub(crate) async fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            servers: self.servers.lock().await,
        }
    }

    /// Stops every server.
    pub async fn clear(&self) {
        let mut servers = self.servers.lock().await;
        for (port, server) in servers.drain() {
            debug!(port, "Stopping webhook server");
            server.shutdown();
        }
    }
}

/// Exclusive access to the registry.
pub(crate) struct RegistryGuard<'a> {
    servers: MutexGuard<'a, HashMap<u16, Arc<HttpServer>>>,
}

impl RegistryGuard<'_> {
    pub(crate) fn get(&self, port: u16) -> Option<Arc<HttpServer>> {
        self.servers.get(&port).cloned()
    }

    pub(crate) fn insert(&mut self, port: u16, server: Arc<HttpServer>) {
        info!(port, addr = %server.local_addr(), "Webhook server registered");
        self.servers.insert(port, server);
    }
}
