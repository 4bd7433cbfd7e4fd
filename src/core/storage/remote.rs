use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{KeyValueStore, StorageError};

#[derive(Debug, Clone)]
pub struct RealtimeDbStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RealtimeDbStore {
    pub fn connect(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }
}

#[async_trait]
impl KeyValueStore for RealtimeDbStore {
    async fn get(&self, path: &str) -> Result<Option<String>, StorageError> {
        let response = self
            .authorize(self.client.get(self.endpoint(path)))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        match serde_json::from_slice::<Value>(&body)? {
            Value::Null => Ok(None),
            Value::String(value) => Ok(Some(value)),
            _ => Err(StorageError::UnexpectedValue {
                path: path.to_string(),
            }),
        }
    }

    async fn set(&self, path: &str, value: &str) -> Result<(), StorageError> {
        let response = self
            .authorize(self.client.put(self.endpoint(path)))
            .json(&value)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}
