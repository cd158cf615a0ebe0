//! Server discovery
//!
//! Finds a reachable backend by probing `GET <base>/health` on the last
//! known-good address first, then on the static candidate list in order.
//! Resolution never fails: when nothing answers, the first static candidate
//! is handed out so callers always get a well-formed URL.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::{
    config::DiscoveryConfig,
    error::{AppError, AppResult},
    models::ServerEndpoint,
    repository::endpoints::EndpointRepository,
};

/// Liveness check against a candidate base URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// True when `<base_url>/health` answered with a 2xx
    async fn check(&self, base_url: &str, timeout: Duration) -> bool;
}

/// Health probe over plain HTTP
#[derive(Clone, Default)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, base_url: &str, timeout: Duration) -> bool {
        match self
            .client
            .get(format!("{}/health", base_url))
            .timeout(timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::debug!("Health check on {} returned HTTP {}", base_url, resp.status());
                false
            }
            Err(e) => {
                tracing::debug!("Health check on {} failed: {}", base_url, e);
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct ServerResolver {
    config: DiscoveryConfig,
    repository: EndpointRepository,
    health: Arc<dyn HealthProbe>,
    current: Arc<RwLock<Option<ServerEndpoint>>>,
}

impl ServerResolver {
    pub fn new(config: DiscoveryConfig, repository: EndpointRepository, health: Arc<dyn HealthProbe>) -> Self {
        Self {
            config,
            repository,
            health,
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Endpoint currently in use, if one was resolved in this process
    pub fn current(&self) -> Option<ServerEndpoint> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn api_prefix(&self) -> &str {
        &self.config.api_prefix
    }

    /// API base URL, resolving first if nothing is in use yet
    pub async fn base_url(&self) -> String {
        let endpoint = match self.current() {
            Some(endpoint) => endpoint,
            None => self.resolve().await,
        };
        endpoint.base_url(&self.config.api_prefix)
    }

    /// Static candidates in priority order; malformed entries are skipped
    pub fn candidates(&self) -> Vec<ServerEndpoint> {
        self.config
            .candidates
            .iter()
            .filter_map(|candidate| {
                match ServerEndpoint::parse(candidate, &self.config.scheme, self.config.port) {
                    Ok(endpoint) => Some(endpoint),
                    Err(e) => {
                        tracing::warn!("Ignoring server candidate '{}': {}", candidate, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Find a reachable server, preferring the last known-good one
    pub async fn resolve(&self) -> ServerEndpoint {
        let started = std::time::Instant::now();

        let persisted = match self.repository.load().await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::warn!("Could not read persisted server address: {}", e);
                None
            }
        };

        if let Some(ref endpoint) = persisted {
            tracing::debug!("Probing last known server {}", endpoint);
            if self.probe(endpoint, self.config.probe_timeout()).await {
                return self.adopt(endpoint.clone()).await;
            }
            tracing::info!("Last known server {} is unreachable", endpoint);
        }

        let candidates = self.candidates();
        for (idx, candidate) in candidates.iter().enumerate() {
            if persisted
                .as_ref()
                .is_some_and(|p| p.same_address(candidate))
            {
                continue;
            }

            tracing::debug!("Probing candidate {}/{}: {}", idx + 1, candidates.len(), candidate);
            if self.probe(candidate, self.config.probe_timeout()).await {
                tracing::info!(
                    "Discovered server {} in {:?}",
                    candidate,
                    started.elapsed()
                );
                return self.adopt(candidate.clone()).await;
            }
        }

        let fallback = candidates.into_iter().next().unwrap_or_else(|| {
            ServerEndpoint::new(&self.config.scheme, "127.0.0.1", self.config.port)
        });
        tracing::warn!(
            "No server answered after {:?}, falling back to {}",
            started.elapsed(),
            fallback
        );
        self.set_current(Some(fallback.clone()));
        fallback
    }

    /// Validate, probe and persist a user-entered address
    pub async fn set_manual(&self, address: &str) -> AppResult<ServerEndpoint> {
        let endpoint = ServerEndpoint::parse(address, &self.config.scheme, self.config.port)?;

        if !self.probe(&endpoint, self.config.manual_probe_timeout()).await {
            tracing::warn!("Manual server {} did not respond", endpoint);
            return Err(AppError::Network(format!("Server {} did not respond", endpoint)));
        }

        let endpoint = endpoint.verified_now();
        self.repository.save(&endpoint).await?;
        self.set_current(Some(endpoint.clone()));
        tracing::info!("Manual server set to {}", endpoint);

        Ok(endpoint)
    }

    /// Forget the persisted address and rediscover from the static list
    pub async fn reset(&self) -> ServerEndpoint {
        if let Err(e) = self.repository.clear().await {
            tracing::warn!("Could not clear persisted server address: {}", e);
        }
        self.set_current(None);
        tracing::info!("Server address reset, rediscovering");
        self.resolve().await
    }

    async fn probe(&self, endpoint: &ServerEndpoint, timeout: Duration) -> bool {
        let base_url = endpoint.base_url(&self.config.api_prefix);
        match tokio::time::timeout(timeout, self.health.check(&base_url, timeout)).await {
            Ok(alive) => alive,
            Err(_) => {
                tracing::debug!("Health check on {} timed out after {:?}", base_url, timeout);
                false
            }
        }
    }

    async fn adopt(&self, endpoint: ServerEndpoint) -> ServerEndpoint {
        let endpoint = endpoint.verified_now();
        if let Err(e) = self.repository.save(&endpoint).await {
            tracing::warn!("Could not persist server address {}: {}", endpoint, e);
        }
        self.set_current(Some(endpoint.clone()));
        endpoint
    }

    fn set_current(&self, endpoint: Option<ServerEndpoint>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = endpoint;
    }
}
