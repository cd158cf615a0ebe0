//! Push registration persistence, independent of the session

use std::sync::Arc;

use super::{decode_value, keys, KeyValueStore};
use crate::{
    error::AppResult,
    models::{Platform, PushRegistration},
};

#[derive(Clone)]
pub struct PushRepository {
    store: Arc<dyn KeyValueStore>,
}

impl PushRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the registration; a bare legacy token is adopted as unsynced
    pub async fn load(&self, platform: Platform) -> AppResult<Option<PushRegistration>> {
        if let Some(value) = self.store.get(keys::PUSH_REGISTRATION).await? {
            if let Some(registration) = decode_value::<PushRegistration>(value) {
                return Ok(Some(registration));
            }
            tracing::warn!("Discarding unreadable push registration");
            self.store.remove(keys::PUSH_REGISTRATION).await?;
        }

        let Some(legacy) = self.store.get(keys::legacy::PUSH_TOKEN).await? else {
            return Ok(None);
        };

        let registration = legacy
            .as_str()
            .filter(|token| !token.trim().is_empty())
            .map(|token| PushRegistration::local(token, platform));

        if let Some(ref registration) = registration {
            self.save(registration).await?;
            tracing::info!("Migrated legacy push token");
        }
        self.store.remove(keys::legacy::PUSH_TOKEN).await?;

        Ok(registration)
    }

    pub async fn save(&self, registration: &PushRegistration) -> AppResult<()> {
        self.store
            .set(keys::PUSH_REGISTRATION, serde_json::to_value(registration)?)
            .await
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.store.remove(keys::PUSH_REGISTRATION).await?;
        self.store.remove(keys::legacy::PUSH_TOKEN).await
    }
}
