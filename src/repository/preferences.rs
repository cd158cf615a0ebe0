//! User preferences the core reads but does not own

use serde_json::Value;
use std::sync::Arc;

use super::{keys, KeyValueStore};
use crate::{error::AppResult, models::DataSource};

#[derive(Clone)]
pub struct PreferencesRepository {
    store: Arc<dyn KeyValueStore>,
}

impl PreferencesRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Selected data source, falling back to the legacy boolean flag
    pub async fn data_source(&self) -> AppResult<DataSource> {
        if let Some(value) = self.store.get(keys::DATA_SOURCE).await? {
            if let Some(source) = value.as_str().and_then(|s| s.parse().ok()) {
                return Ok(source);
            }
        }

        let source = match self.store.get(keys::legacy::USE_MOCK_DATA).await? {
            Some(Value::Bool(true)) => DataSource::Demo,
            Some(Value::String(flag)) if flag == "true" => DataSource::Demo,
            _ => DataSource::Live,
        };
        Ok(source)
    }

    pub async fn set_data_source(&self, source: DataSource) -> AppResult<()> {
        self.store
            .set(keys::DATA_SOURCE, serde_json::to_value(source)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_data_source_default_and_legacy() {
        let store = MemoryStore::new();
        let repo = PreferencesRepository::new(Arc::new(store.clone()));
        assert_eq!(repo.data_source().await.unwrap(), DataSource::Live);

        store.set("useMockData", json!("true")).await.unwrap();
        assert_eq!(repo.data_source().await.unwrap(), DataSource::Demo);

        repo.set_data_source(DataSource::Live).await.unwrap();
        assert_eq!(repo.data_source().await.unwrap(), DataSource::Live);
    }
}
