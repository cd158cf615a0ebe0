//! In-memory session cache backed by persisted storage

use std::sync::{Arc, RwLock};
use tokio::sync::watch;

use crate::{
    error::AppResult,
    models::{session::redact_token, Session, SessionState, UserIdentity},
    repository::sessions::SessionRepository,
};

/// Holds at most one session and mirrors it to storage
#[derive(Clone)]
pub struct SessionStore {
    repository: SessionRepository,
    cache: Arc<RwLock<Option<Session>>>,
    state_tx: Arc<watch::Sender<SessionState>>,
}

impl SessionStore {
    pub fn new(repository: SessionRepository) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Anonymous);
        Self {
            repository,
            cache: Arc::new(RwLock::new(None)),
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.session().map(|s| s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|s| !s.token.is_empty())
    }

    /// Watch session transitions (forced logout included)
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Load the persisted session into memory; never fails
    pub async fn restore(&self) -> Option<Session> {
        let session = match self.repository.load().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Could not restore persisted session: {}", e);
                None
            }
        };

        if let Some(ref s) = session {
            tracing::info!("Restored session for {} ({})", s.user.email, redact_token(&s.token));
        }
        self.replace(session.clone());
        session
    }

    /// Token for an outgoing request, re-reading storage once when memory is empty
    pub async fn token_or_reload(&self) -> Option<String> {
        if let Some(token) = self.token() {
            return Some(token);
        }
        match self.repository.load().await {
            Ok(Some(session)) => {
                tracing::debug!("Recovered session from storage for {}", session.user.email);
                let token = session.token.clone();
                self.replace(Some(session));
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Could not read persisted session: {}", e);
                None
            }
        }
    }

    /// Persist then cache a new session; on storage failure nothing changes
    pub async fn establish(&self, session: Session) -> AppResult<()> {
        self.repository.save(&session).await?;
        self.replace(Some(session));
        Ok(())
    }

    /// Swap the identity of the current session, keeping its token
    pub async fn update_user(&self, user: UserIdentity) -> AppResult<()> {
        let Some(mut session) = self.session() else {
            return Ok(());
        };
        if session.user == user {
            return Ok(());
        }
        session.user = user;
        self.establish(session).await
    }

    /// Drop the session from memory and storage; safe to call repeatedly.
    ///
    /// Memory is cleared first so nothing keeps acting as authenticated even
    /// when the storage write fails.
    pub async fn clear(&self) -> AppResult<bool> {
        let had_session = self.session().is_some();
        self.replace(None);
        self.repository.clear().await?;
        Ok(had_session)
    }

    fn replace(&self, session: Option<Session>) {
        let state = SessionState::from(session.as_ref());
        *self.cache.write().unwrap_or_else(|e| e.into_inner()) = session;
        self.state_tx.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryStore, Repository};

    fn session(token: &str) -> Session {
        Session {
            token: token.to_string(),
            user: UserIdentity {
                id: "u1".into(),
                name: "Ada".into(),
                email: "ada@campus.edu".into(),
                student_id: None,
                department: Some("Mathematics".into()),
            },
        }
    }

    #[tokio::test]
    async fn test_establish_and_clear() {
        let store = SessionStore::new(Repository::in_memory().sessions);
        assert!(!store.is_authenticated());

        store.establish(session("tok")).await.unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("tok"));

        assert!(store.clear().await.unwrap());
        assert!(!store.is_authenticated());
        assert!(!store.clear().await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_from_other_process() {
        let memory = MemoryStore::new();
        let first = SessionStore::new(Repository::new(Arc::new(memory.clone())).sessions);
        first.establish(session("tok")).await.unwrap();

        let second = SessionStore::new(Repository::new(Arc::new(memory)).sessions);
        assert!(!second.is_authenticated());
        assert_eq!(second.restore().await, Some(session("tok")));
        assert!(second.is_authenticated());
    }

    #[tokio::test]
    async fn test_token_or_reload_reads_storage_once() {
        let memory = MemoryStore::new();
        let writer = SessionStore::new(Repository::new(Arc::new(memory.clone())).sessions);
        let reader = SessionStore::new(Repository::new(Arc::new(memory)).sessions);

        assert_eq!(reader.token_or_reload().await, None);
        writer.establish(session("late")).await.unwrap();
        assert_eq!(reader.token_or_reload().await.as_deref(), Some("late"));
        assert!(reader.is_authenticated());
    }

    #[tokio::test]
    async fn test_subscribers_see_forced_logout() {
        let store = SessionStore::new(Repository::in_memory().sessions);
        let mut rx = store.subscribe();

        store.establish(session("tok")).await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated());

        store.clear().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_update_user_keeps_token() {
        let store = SessionStore::new(Repository::in_memory().sessions);
        store.update_user(session("x").user).await.unwrap();
        assert!(!store.is_authenticated());

        store.establish(session("tok")).await.unwrap();
        let mut user = session("tok").user;
        user.name = "Ada Lovelace".into();
        store.update_user(user.clone()).await.unwrap();

        assert_eq!(store.user(), Some(user));
        assert_eq!(store.token().as_deref(), Some("tok"));
    }
}
