use crate::config::StoreConnectionConfig;
use crate::models::record::SystemLogEntry;
use crate::persistence::client::FirestoreClient;
use crate::persistence::error::{PersistenceError, PersistenceResult};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, error, warn, Level};

/// Owner of the single store connection.
///
/// The connection is created lazily on first use and at most once: concurrent
/// first callers wait on the same attempt and all receive the same `Arc`.
/// A failed attempt leaves the gateway disconnected so a later call can retry.
pub struct StoreGateway {
    config: StoreConnectionConfig,
    client: OnceCell<Arc<FirestoreClient>>,
}

impl StoreGateway {
    pub fn new(config: StoreConnectionConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StoreConnectionConfig {
        &self.config
    }

    /// The shared client, connecting first if needed.
    pub async fn instance(&self) -> PersistenceResult<Arc<FirestoreClient>> {
        let timeout = self.config.connect_timeout;
        self.client
            .get_or_try_init(|| async {
                let client = tokio::time::timeout(timeout, FirestoreClient::connect(&self.config))
                    .await
                    .map_err(|_| PersistenceError::Timeout(timeout))??;
                Ok::<_, PersistenceError>(Arc::new(client))
            })
            .await
            .cloned()
    }

    /// Connect if not yet connected. Failures are logged, never propagated.
    pub async fn initialize(&self) -> bool {
        if self.is_connected() {
            return true;
        }
        match self.instance().await {
            Ok(_) => true,
            Err(e) => {
                error!(
                    project = %self.config.project_id,
                    credentials = %self.config.credentials_path.display(),
                    "Firestore initialization failed: {e}"
                );
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    /// The client if already connected; never triggers a connection attempt.
    pub fn client(&self) -> Option<Arc<FirestoreClient>> {
        self.client.get().cloned()
    }

    /// Mirror an operational event into the system log collection.
    pub async fn log_event(&self, level: Level, component: &str, message: &str) {
        let Some(client) = self.client() else {
            debug!("Store not connected, dropping {component} event: {message}");
            return;
        };
        let entry = SystemLogEntry::new(level.as_str(), component, message);
        if let Err(e) = client.collection::<SystemLogEntry>().add(&entry).await {
            warn!("Failed to persist {component} event: {e}");
        }
    }
}

static SHARED_GATEWAY: OnceLock<StoreGateway> = OnceLock::new();

/// Process-wide gateway for the binary's composition root.
///
/// The first caller's config wins; later configs are ignored. Library code
/// should take a `&StoreGateway` instead.
pub fn shared_gateway(config: &StoreConnectionConfig) -> &'static StoreGateway {
    SHARED_GATEWAY.get_or_init(|| StoreGateway::new(config.clone()))
}
