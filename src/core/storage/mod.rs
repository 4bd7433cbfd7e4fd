pub mod memory;
pub mod remote;
pub mod repository;
pub mod rules;

use async_trait::async_trait;

use rules::RuleViolation;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("value at {path} is neither a string nor null")]
    UnexpectedValue { path: String },
    #[error("invalid store response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("write to {path} rejected: {violation}")]
    RuleViolation {
        path: String,
        violation: RuleViolation,
    },
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, path: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct StorageService;

impl StorageService {
    pub fn name(&self) -> &'static str {
        "storage"
    }

    pub fn status(&self) -> &'static str {
        "ready"
    }
}
