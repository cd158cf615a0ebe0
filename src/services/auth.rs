//! Session manager: login, registration and logout flows

use std::sync::Arc;
use tokio::sync::Mutex;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        session::{redact_token, AuthResponse, ProfileResponse},
        LoginRequest, RegisterProfile, Session, UserIdentity,
    },
    services::{http::ApiClient, push::PushTokenManager, session::SessionStore},
};

#[derive(Clone)]
pub struct SessionManager {
    store: SessionStore,
    api: ApiClient,
    push: PushTokenManager,
    /// Held for the whole login/register round trip
    login_gate: Arc<Mutex<()>>,
}

impl SessionManager {
    pub fn new(store: SessionStore, api: ApiClient, push: PushTokenManager) -> Self {
        Self {
            store,
            api,
            push,
            login_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Restore the persisted session at process start.
    ///
    /// Having no session is a normal state, so this never fails.
    pub async fn initialize(&self) -> Option<Session> {
        self.store.restore().await
    }

    /// Authenticate with email and password.
    ///
    /// Either the token and identity are both persisted and cached, or
    /// nothing changes.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let _gate = self.login_gate.lock().await;

        let resp: AuthResponse = self
            .api
            .post_public_json("/auth/login", &request)
            .await
            .map_err(credentials_error)?;

        let session = Session::from(resp);
        self.adopt(session.clone()).await?;
        tracing::info!("Logged in as {}", session.user.email);
        Ok(session)
    }

    /// Create an account and sign into it
    pub async fn register(&self, profile: RegisterProfile) -> AppResult<Session> {
        profile
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let _gate = self.login_gate.lock().await;

        let resp: AuthResponse = self
            .api
            .post_public_json("/auth/register", &profile)
            .await
            .map_err(|e| match e {
                AppError::Server { status: 401, message } => AppError::InvalidCredentials(message),
                other => other,
            })?;

        let session = Session::from(resp);
        self.adopt(session.clone()).await?;
        tracing::info!("Registered and logged in as {}", session.user.email);
        Ok(session)
    }

    /// Forget the session; a no-op when already anonymous.
    ///
    /// Preferences and the push registration are kept.
    pub async fn logout(&self) -> AppResult<()> {
        if self.store.clear().await? {
            tracing::info!("Logged out");
        }
        Ok(())
    }

    /// Reload the signed-in user's profile from `/auth/me`
    pub async fn refresh_profile(&self) -> AppResult<UserIdentity> {
        if !self.store.is_authenticated() {
            return Err(AppError::NotAuthenticated);
        }

        let resp: ProfileResponse = self.api.get_json("/auth/me").await?;
        let user = UserIdentity::from(resp);
        self.store.update_user(user.clone()).await?;
        Ok(user)
    }

    pub fn get_token(&self) -> Option<String> {
        self.store.token()
    }

    pub fn get_user(&self) -> Option<UserIdentity> {
        self.store.user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    async fn adopt(&self, session: Session) -> AppResult<()> {
        tracing::debug!("Storing session {}", redact_token(&session.token));
        self.store.establish(session).await?;

        // Push delivery is secondary to signing in
        if let Err(e) = self.push.sync_after_login().await {
            tracing::warn!("Push token sync after login failed: {}", e);
        }

        // A 401 on the resend has already cleared the new session
        if !self.store.is_authenticated() {
            return Err(AppError::SessionExpired);
        }
        Ok(())
    }
}

/// Client-side rejections of a login attempt
fn credentials_error(e: AppError) -> AppError {
    match e {
        AppError::Server { status, message } if matches!(status, 400 | 401 | 403 | 404 | 422) => {
            AppError::InvalidCredentials(message)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoveryConfig, PushConfig};
    use crate::models::{DataSource, Platform};
    use crate::repository::Repository;
    use crate::services::discovery::{MockHealthProbe, ServerResolver};
    use crate::services::push::HeadlessPlatform;

    fn manager(repository: &Repository) -> SessionManager {
        let store = SessionStore::new(repository.sessions.clone());
        let resolver = ServerResolver::new(
            DiscoveryConfig::default(),
            repository.endpoints.clone(),
            Arc::new(MockHealthProbe::new()),
        );
        let api = ApiClient::with_client(reqwest::Client::new(), resolver, store.clone());
        let push = PushTokenManager::new(
            PushConfig::default(),
            repository.push.clone(),
            Arc::new(HeadlessPlatform::new(Platform::Android)),
            store.clone(),
            api.clone(),
        );
        SessionManager::new(store, api, push)
    }

    fn session() -> Session {
        Session {
            token: "tok".into(),
            user: UserIdentity {
                id: "u1".into(),
                name: "Ada".into(),
                email: "ada@campus.edu".into(),
                student_id: Some("S42".into()),
                department: None,
            },
        }
    }

    #[tokio::test]
    async fn test_login_validates_before_network() {
        let repository = Repository::in_memory();
        let manager = manager(&repository);

        let err = manager.login("not-an-email", "secret").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = manager.login("ada@campus.edu", "").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_register_validates_profile() {
        let manager = manager(&Repository::in_memory());
        let profile = RegisterProfile {
            name: "Ada".into(),
            email: "ada@campus.edu".into(),
            password: "123".into(),
            student_id: None,
            department: None,
        };
        assert!(matches!(manager.register(profile).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_keeps_preferences() {
        let repository = Repository::in_memory();
        repository.preferences.set_data_source(DataSource::Demo).await.unwrap();

        let manager = manager(&repository);
        manager.store().establish(session()).await.unwrap();
        assert!(manager.is_authenticated());
        assert_eq!(manager.get_token().as_deref(), Some("tok"));

        manager.logout().await.unwrap();
        manager.logout().await.unwrap();

        assert!(!manager.is_authenticated());
        assert!(manager.get_user().is_none());
        assert!(repository.sessions.load().await.unwrap().is_none());
        assert_eq!(repository.preferences.data_source().await.unwrap(), DataSource::Demo);
    }

    #[tokio::test]
    async fn test_initialize_restores_persisted_session() {
        let repository = Repository::in_memory();
        repository.sessions.save(&session()).await.unwrap();

        let manager = manager(&repository);
        assert!(!manager.is_authenticated());
        assert_eq!(manager.initialize().await, Some(session()));
        assert_eq!(manager.get_user().map(|u| u.name), Some("Ada".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_profile_requires_session() {
        let manager = manager(&Repository::in_memory());
        assert!(matches!(manager.refresh_profile().await, Err(AppError::NotAuthenticated)));
    }

    #[test]
    fn test_credentials_error_mapping() {
        let rejected = credentials_error(AppError::Server {
            status: 401,
            message: "Wrong password".into(),
        });
        assert!(matches!(rejected, AppError::InvalidCredentials(ref m) if m == "Wrong password"));

        let outage = credentials_error(AppError::Server {
            status: 503,
            message: "Maintenance".into(),
        });
        assert!(matches!(outage, AppError::Server { status: 503, .. }));

        let offline = credentials_error(AppError::Network("refused".into()));
        assert!(matches!(offline, AppError::Network(_)));
    }
}
