//! Session persistence
//!
//! Token and identity live under a single key so they are always written,
//! read and cleared together. Releases before this schema wrote them under
//! separate (and duplicated) keys; those are folded into the canonical key
//! on first read.

use serde_json::Value;
use std::sync::Arc;

use super::{decode_value, keys, KeyValueStore};
use crate::{
    error::AppResult,
    models::{Session, UserIdentity},
};

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the persisted session, migrating legacy keys if needed
    pub async fn load(&self) -> AppResult<Option<Session>> {
        if let Some(value) = self.store.get(keys::SESSION).await? {
            if let Some(session) = decode_value::<Session>(value) {
                return Ok(Some(session));
            }
            tracing::warn!("Discarding unreadable persisted session");
            self.store.remove(keys::SESSION).await?;
        }

        self.migrate_legacy().await
    }

    pub async fn save(&self, session: &Session) -> AppResult<()> {
        self.store
            .set(keys::SESSION, serde_json::to_value(session)?)
            .await
    }

    /// Remove the session and any legacy leftovers
    pub async fn clear(&self) -> AppResult<()> {
        self.store.remove(keys::SESSION).await?;
        self.remove_legacy().await
    }

    async fn migrate_legacy(&self) -> AppResult<Option<Session>> {
        let token = self.first_legacy(&keys::legacy::TOKENS).await?.and_then(|v| match v {
            Value::String(token) if !token.trim().is_empty() => Some(token),
            _ => None,
        });
        let user = self
            .first_legacy(&keys::legacy::USERS)
            .await?
            .and_then(decode_value::<UserIdentity>);

        let session = match (token, user) {
            (Some(token), Some(user)) => Some(Session { token, user }),
            (None, None) => return Ok(None),
            _ => {
                // Half a session is worse than none
                tracing::warn!("Dropping incomplete legacy session");
                None
            }
        };

        if let Some(ref session) = session {
            self.save(session).await?;
            tracing::info!("Migrated legacy session for {}", session.user.email);
        }
        self.remove_legacy().await?;

        Ok(session)
    }

    async fn first_legacy(&self, candidates: &[&str]) -> AppResult<Option<Value>> {
        for key in candidates {
            if let Some(value) = self.store.get(key).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn remove_legacy(&self) -> AppResult<()> {
        for key in keys::legacy::TOKENS.iter().chain(keys::legacy::USERS.iter()) {
            self.store.remove(key).await?;
        }
        Ok(())
    }
}
