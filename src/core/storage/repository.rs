use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use super::rules::StoreRules;
use super::{KeyValueStore, StorageError};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    rules: StoreRules,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, rules: StoreRules) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool, rules })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, path: &str) -> Result<Option<String>, StorageError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_entries WHERE path = ?1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, path: &str, value: &str) -> Result<(), StorageError> {
        self.rules
            .validate_write(path, value)
            .map_err(|violation| StorageError::RuleViolation {
                path: path.to_string(),
                violation,
            })?;

        sqlx::query(
            r#"
            INSERT INTO kv_entries (path, value)
            VALUES (?1, ?2)
            ON CONFLICT(path) DO UPDATE SET
              value = excluded.value,
              updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(path)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
