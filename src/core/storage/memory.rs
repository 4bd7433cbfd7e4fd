use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::rules::StoreRules;
use super::{KeyValueStore, StorageError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    rules: Option<StoreRules>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: StoreRules) -> Self {
        Self {
            entries: RwLock::default(),
            rules: Some(rules),
        }
    }

    pub fn with_entry(mut self, path: &str, value: &str) -> Self {
        self.entries
            .get_mut()
            .insert(path.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, value: &str) -> Result<(), StorageError> {
        if let Some(rules) = &self.rules {
            rules
                .validate_write(path, value)
                .map_err(|violation| StorageError::RuleViolation {
                    path: path.to_string(),
                    violation,
                })?;
        }
        self.entries
            .write()
            .await
            .insert(path.to_string(), value.to_string());
        Ok(())
    }
}
