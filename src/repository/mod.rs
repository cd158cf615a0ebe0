//! Repository layer for persisted client state

pub mod endpoints;
pub mod preferences;
pub mod push;
pub mod sessions;
pub mod store;

use std::sync::Arc;

pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Storage keys of the canonical schema
pub mod keys {
    pub const SERVER_ENDPOINT: &str = "server.endpoint";
    pub const SESSION: &str = "auth.session";
    pub const PUSH_REGISTRATION: &str = "push.registration";
    pub const DATA_SOURCE: &str = "prefs.data_source";

    /// Keys written by earlier releases, read once and migrated
    pub mod legacy {
        pub const SERVER_URL: &str = "serverUrl";
        pub const TOKENS: [&str; 2] = ["authToken", "token"];
        pub const USERS: [&str; 2] = ["userData", "user"];
        pub const PUSH_TOKEN: &str = "pushToken";
        pub const USE_MOCK_DATA: &str = "useMockData";
    }
}

/// Main repository struct holding the backing store
#[derive(Clone)]
pub struct Repository {
    pub store: Arc<dyn KeyValueStore>,
    pub endpoints: endpoints::EndpointRepository,
    pub sessions: sessions::SessionRepository,
    pub push: push::PushRepository,
    pub preferences: preferences::PreferencesRepository,
}

impl Repository {
    /// Create a new repository over the given store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            endpoints: endpoints::EndpointRepository::new(store.clone()),
            sessions: sessions::SessionRepository::new(store.clone()),
            push: push::PushRepository::new(store.clone()),
            preferences: preferences::PreferencesRepository::new(store.clone()),
            store,
        }
    }

    /// Repository over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

/// Decode a stored value that may be a JSON object or a JSON-encoded string
pub(crate) fn decode_value<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Option<T> {
    match value {
        serde_json::Value::String(raw) => serde_json::from_str(&raw).ok(),
        other => serde_json::from_value(other).ok(),
    }
}
