use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UpstreamFeed {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl UpstreamFeed {
    pub fn has_feed_content_type(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|value| value.to_ascii_lowercase().contains("xml"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<UpstreamFeed, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let body = response.bytes().await?.to_vec();

    Ok(UpstreamFeed {
        status,
        body,
        content_type,
    })
}

pub async fn fetch_feed_with_retry(
    client: &reqwest::Client,
    url: &str,
    max_retries: usize,
) -> Result<UpstreamFeed, FetchError> {
    let mut attempt = 0_usize;
    loop {
        match fetch_feed(client, url).await {
            Ok(result) => return Ok(result),
            Err(err) => {
                let should_retry = matches!(err, FetchError::Request(_))
                    || matches!(err, FetchError::HttpStatus(code) if code >= 500);
                if !should_retry || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                tracing::warn!(url, attempt, error = %err, "retrying upstream feed fetch");
                tokio::time::sleep(Duration::from_millis(40 * attempt as u64)).await;
            }
        }
    }
}
