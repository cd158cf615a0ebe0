//! Campus Library client core
//!
//! Connectivity and session resilience for the campus library apps: backend
//! discovery across changing networks, a bearer session the server may
//! invalidate at any time, and a device push registration that outlives
//! logouts and restarts.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use models::{DataSource, PushState, ServerEndpoint, UserIdentity};
use repository::{FileStore, Repository};
use services::{
    discovery::{HealthProbe, HttpHealthProbe},
    push::PushPlatform,
    Services,
};

/// Client state shared by every caller.
///
/// One context per installation; independent contexts never share caches,
/// so several can live side by side in tests.
#[derive(Clone)]
pub struct ClientContext {
    pub config: Arc<AppConfig>,
    pub repository: Repository,
    pub services: Arc<Services>,
}

/// What the startup sequence found
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub endpoint: ServerEndpoint,
    pub user: Option<UserIdentity>,
    pub push_state: PushState,
}

impl ClientContext {
    /// Context with the HTTP health probe and the given push platform
    pub fn new(config: AppConfig, repository: Repository, platform: Arc<dyn PushPlatform>) -> AppResult<Self> {
        Self::with_parts(config, repository, Arc::new(HttpHealthProbe::default()), platform)
    }

    pub fn with_parts(
        config: AppConfig,
        repository: Repository,
        probe: Arc<dyn HealthProbe>,
        platform: Arc<dyn PushPlatform>,
    ) -> AppResult<Self> {
        let services = Services::new(&config, repository.clone(), probe, platform)?;
        Ok(Self {
            config: Arc::new(config),
            repository,
            services: Arc::new(services),
        })
    }

    /// Context persisted to the configured state file
    pub async fn open(config: AppConfig, platform: Arc<dyn PushPlatform>) -> AppResult<Self> {
        let store = FileStore::open(&config.storage.path).await?;
        tracing::debug!("Using state file {}", store.path().display());
        Self::new(config, Repository::new(Arc::new(store)), platform)
    }

    /// Bring the layer up at process start.
    ///
    /// Never fails: discovery degrades to a default endpoint, a missing
    /// session is normal and a failed push resend waits for the next
    /// lifecycle event.
    pub async fn startup(&self) -> StartupReport {
        let endpoint = self.services.discovery.resolve().await;
        let session = self.services.auth.initialize().await;
        self.services.push.restore().await;

        if session.is_some() {
            match self.services.push.retry_pending_sync().await {
                Ok(true) => tracing::info!("Resent pending push token"),
                Ok(false) => {}
                Err(e) => tracing::warn!("Pending push token sync failed: {}", e),
            }
        }

        StartupReport {
            endpoint,
            user: session.map(|s| s.user),
            push_state: self.services.push.state(),
        }
    }

    /// Demo or live data, as last chosen by the user
    pub async fn data_source(&self) -> DataSource {
        match self.repository.preferences.data_source().await {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Could not read data source preference: {}", e);
                DataSource::default()
            }
        }
    }

    pub async fn set_data_source(&self, source: DataSource) -> AppResult<()> {
        self.repository.preferences.set_data_source(source).await
    }
}
