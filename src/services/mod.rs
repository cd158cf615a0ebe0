//! Connectivity and session services

pub mod auth;
pub mod discovery;
pub mod http;
pub mod push;
pub mod session;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::AppResult,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub discovery: discovery::ServerResolver,
    pub sessions: session::SessionStore,
    pub auth: auth::SessionManager,
    pub api: http::ApiClient,
    pub push: push::PushTokenManager,
}

impl Services {
    /// Wire every service over the given repository.
    ///
    /// The health probe and push platform are injected so tests and the CLI
    /// can swap in their own.
    pub fn new(
        config: &AppConfig,
        repository: Repository,
        probe: Arc<dyn discovery::HealthProbe>,
        platform: Arc<dyn push::PushPlatform>,
    ) -> AppResult<Self> {
        let discovery = discovery::ServerResolver::new(config.discovery.clone(), repository.endpoints.clone(), probe);
        let sessions = session::SessionStore::new(repository.sessions.clone());
        let api = http::ApiClient::new(&config.http, discovery.clone(), sessions.clone())?;
        let push = push::PushTokenManager::new(
            config.push.clone(),
            repository.push,
            platform,
            sessions.clone(),
            api.clone(),
        );
        let auth = auth::SessionManager::new(sessions.clone(), api.clone(), push.clone());

        Ok(Self {
            discovery,
            sessions,
            auth,
            api,
            push,
        })
    }
}
