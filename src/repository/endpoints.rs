//! Last-good server endpoint persistence

use std::sync::Arc;

use super::{decode_value, keys, KeyValueStore};
use crate::{error::AppResult, models::ServerEndpoint};

#[derive(Clone)]
pub struct EndpointRepository {
    store: Arc<dyn KeyValueStore>,
}

impl EndpointRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the last-good endpoint, migrating the legacy URL key if needed
    pub async fn load(&self) -> AppResult<Option<ServerEndpoint>> {
        if let Some(value) = self.store.get(keys::SERVER_ENDPOINT).await? {
            match decode_value::<ServerEndpoint>(value) {
                Some(endpoint) => return Ok(Some(endpoint)),
                None => {
                    tracing::warn!("Discarding unreadable persisted server endpoint");
                    self.store.remove(keys::SERVER_ENDPOINT).await?;
                }
            }
        }

        let Some(legacy) = self.store.get(keys::legacy::SERVER_URL).await? else {
            return Ok(None);
        };

        let endpoint = legacy
            .as_str()
            .and_then(|url| ServerEndpoint::parse(url, "http", 80).ok());

        if let Some(ref endpoint) = endpoint {
            tracing::info!("Migrated legacy server address {}", endpoint);
            self.save(endpoint).await?;
        }
        self.store.remove(keys::legacy::SERVER_URL).await?;

        Ok(endpoint)
    }

    pub async fn save(&self, endpoint: &ServerEndpoint) -> AppResult<()> {
        self.store
            .set(keys::SERVER_ENDPOINT, serde_json::to_value(endpoint)?)
            .await
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.store.remove(keys::SERVER_ENDPOINT).await?;
        self.store.remove(keys::legacy::SERVER_URL).await
    }
}
