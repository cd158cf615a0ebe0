//! Push token lifecycle
//!
//! `NoToken` → (OS grants permission, provider issues a token) → `LocalToken`
//! → (server acknowledges) → `SyncedToken`. The registration is persisted
//! apart from the session, so it survives logout and restarts, and the OS
//! permission prompt is only ever shown when no token is stored.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{
    config::PushConfig,
    error::{AppError, AppResult},
    models::{
        push::{PushTokenRequest, PushTokenResponse},
        session::redact_token,
        PermissionStatus, Platform, PushRegistration, PushState, RegistrationOutcome,
    },
    repository::push::PushRepository,
    services::{http::ApiClient, session::SessionStore},
};

/// Device-side push capabilities
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushPlatform: Send + Sync {
    fn platform(&self) -> Platform;

    /// False on emulators and simulators
    fn is_physical_device(&self) -> bool;

    /// Current permission, without prompting
    async fn permission_status(&self) -> PermissionStatus;

    /// Show the OS permission prompt
    async fn request_permission(&self) -> PermissionStatus;

    /// Ask the push provider for this installation's token
    async fn obtain_token(&self) -> AppResult<String>;
}

/// Platform for environments without push delivery (CLI, CI)
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    platform: Platform,
}

impl HeadlessPlatform {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PushPlatform for HeadlessPlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn is_physical_device(&self) -> bool {
        false
    }

    async fn permission_status(&self) -> PermissionStatus {
        PermissionStatus::Undetermined
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }

    async fn obtain_token(&self) -> AppResult<String> {
        Err(AppError::Configuration("Push notifications are not available on this device".to_string()))
    }
}

#[derive(Clone)]
pub struct PushTokenManager {
    config: PushConfig,
    repository: PushRepository,
    platform: Arc<dyn PushPlatform>,
    session: SessionStore,
    api: ApiClient,
    current: Arc<RwLock<Option<PushRegistration>>>,
    /// Set when the user declined or revoked permission during this run
    declined: Arc<AtomicBool>,
    /// Held from the token check until the new token is stored
    registration_gate: Arc<Mutex<()>>,
}

impl PushTokenManager {
    pub fn new(
        config: PushConfig,
        repository: PushRepository,
        platform: Arc<dyn PushPlatform>,
        session: SessionStore,
        api: ApiClient,
    ) -> Self {
        Self {
            config,
            repository,
            platform,
            session,
            api,
            current: Arc::new(RwLock::new(None)),
            declined: Arc::new(AtomicBool::new(false)),
            registration_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn registration(&self) -> Option<PushRegistration> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn state(&self) -> PushState {
        PushState::from(self.registration().as_ref())
    }

    /// Load the persisted registration into memory; never fails
    pub async fn restore(&self) -> Option<PushRegistration> {
        let registration = match self.repository.load(self.platform.platform()).await {
            Ok(registration) => registration,
            Err(e) => {
                tracing::warn!("Could not read persisted push registration: {}", e);
                None
            }
        };
        self.set_current(registration.clone());
        registration
    }

    /// Make sure this installation holds a push token.
    ///
    /// With a stored token the OS prompt is never shown again; only a
    /// non-prompting permission check runs, and a revoked permission drops
    /// the registration. A decline stands for the rest of this run.
    pub async fn ensure_registered(&self) -> AppResult<RegistrationOutcome> {
        // Overlapping callers wait here and then see the stored token
        let _gate = self.registration_gate.lock().await;

        let existing = match self.registration() {
            Some(registration) => Some(registration),
            None => self.restore().await,
        };

        if let Some(registration) = existing {
            if self.platform.permission_status().await == PermissionStatus::Denied {
                tracing::info!("Notification permission was revoked, dropping push token");
                self.declined.store(true, Ordering::SeqCst);
                self.forget().await;
                return Err(AppError::PermissionDenied);
            }
            return Ok(RegistrationOutcome::AlreadyRegistered(registration));
        }

        if self.declined.load(Ordering::SeqCst) {
            return Err(AppError::PermissionDenied);
        }

        if !self.platform.is_physical_device() {
            tracing::debug!("Push notifications need a physical device, skipping registration");
            return Ok(RegistrationOutcome::Unsupported);
        }

        let mut status = self.platform.permission_status().await;
        if status != PermissionStatus::Granted {
            status = self.platform.request_permission().await;
        }
        if status != PermissionStatus::Granted {
            self.declined.store(true, Ordering::SeqCst);
            tracing::info!("Notification permission declined");
            return Err(AppError::PermissionDenied);
        }

        let token = self.platform.obtain_token().await.map_err(|e| {
            tracing::warn!("Push provider did not issue a token: {}", e);
            e
        })?;

        let registration = self.persist_locally(&token).await?;
        tracing::info!("Registered for push notifications ({})", redact_token(&token));
        Ok(RegistrationOutcome::Registered(registration))
    }

    /// Durably store a token; an unchanged token keeps its sync state
    pub async fn persist_locally(&self, token: &str) -> AppResult<PushRegistration> {
        let registration = match self.registration() {
            Some(existing) if existing.token == token => existing,
            _ => PushRegistration::local(token, self.platform.platform()),
        };

        self.repository.save(&registration).await?;
        self.set_current(Some(registration.clone()));
        Ok(registration)
    }

    /// Send the token to the server under the current session.
    ///
    /// Failures leave the stored token untouched so a later lifecycle event
    /// can resend it.
    pub async fn sync_with_server(&self, token: &str) -> AppResult<()> {
        if !self.session.is_authenticated() {
            return Err(AppError::NotAuthenticated);
        }

        let body = PushTokenRequest {
            push_token: token,
            platform: self.platform.platform(),
        };

        let resp: PushTokenResponse = match self.api.post_json("/users/push-token", &body).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Push token sync failed, will retry later: {}", e);
                return Err(e);
            }
        };

        if !resp.success {
            tracing::warn!("Server did not acknowledge the push token");
            return Err(AppError::InvalidResponse("Push token was not acknowledged".to_string()));
        }

        let mut registration = match self.registration() {
            Some(existing) if existing.token == token => existing,
            _ => PushRegistration::local(token, self.platform.platform()),
        };
        registration.mark_synced();
        self.repository.save(&registration).await?;
        self.set_current(Some(registration));

        if let Some(user) = resp.user {
            if let Err(e) = self.session.update_user(user).await {
                tracing::warn!("Could not store refreshed profile: {}", e);
            }
        }

        tracing::info!("Push token synced with server ({})", redact_token(token));
        Ok(())
    }

    /// Resend the stored token for a freshly logged-in user
    pub async fn sync_after_login(&self) -> AppResult<()> {
        let registration = match self.registration() {
            Some(registration) => Some(registration),
            None => self.restore().await,
        };
        let Some(registration) = registration else {
            return Ok(());
        };
        self.sync_with_server(&registration.token).await
    }

    /// Resend the stored token if the server never acknowledged it.
    ///
    /// Returns whether a sync went through.
    pub async fn retry_pending_sync(&self) -> AppResult<bool> {
        let Some(registration) = self.registration() else {
            return Ok(false);
        };
        if registration.synced || !self.session.is_authenticated() {
            return Ok(false);
        }
        self.sync_with_server(&registration.token).await?;
        Ok(true)
    }

    /// Register and sync after the configured delay, off the calling task.
    ///
    /// Meant to be started once the first authenticated screen is shown so
    /// the permission prompt does not appear before the user sees the app.
    pub fn schedule_deferred_registration(&self) -> JoinHandle<()> {
        self.schedule_registration_after(self.config.registration_delay())
    }

    pub fn schedule_registration_after(&self, delay: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let registration = match manager.ensure_registered().await {
                Ok(outcome) => outcome.registration().cloned(),
                Err(AppError::PermissionDenied) => {
                    tracing::info!("Continuing without push notifications");
                    return;
                }
                Err(e) => {
                    tracing::warn!("Deferred push registration failed: {}", e);
                    return;
                }
            };

            let Some(registration) = registration else {
                return;
            };
            if registration.synced || !manager.session.is_authenticated() {
                return;
            }
            if let Err(e) = manager.sync_with_server(&registration.token).await {
                tracing::warn!("Deferred push token sync failed: {}", e);
            }
        })
    }

    async fn forget(&self) {
        self.set_current(None);
        if let Err(e) = self.repository.clear().await {
            tracing::warn!("Could not clear push registration: {}", e);
        }
    }

    fn set_current(&self, registration: Option<PushRegistration>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = registration;
    }
}
