pub mod config;
pub mod core;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ConfigError, StoreBackend};
use crate::core::feed::fetcher::{build_client, fetch_feed_with_retry, FetchError};
use crate::core::feed::filter::{filter_writeups_bytes, FilterError};
use crate::core::preferences::codec::ENTRY_SEPARATOR;
use crate::core::preferences::{PreferenceError, PreferenceStore};
use crate::core::storage::memory::MemoryStore;
use crate::core::storage::remote::RealtimeDbStore;
use crate::core::storage::repository::SqliteStore;
use crate::core::storage::{KeyValueStore, StorageError};
use crate::core::AppServices;

#[derive(Clone)]
pub struct SharedState {
    services: AppServices,
    preferences: PreferenceStore,
    http: reqwest::Client,
    feed_url: Arc<str>,
    fetch_retries: usize,
}

impl SharedState {
    pub fn new(
        preferences: PreferenceStore,
        http: reqwest::Client,
        feed_url: &str,
        fetch_retries: usize,
    ) -> Self {
        Self {
            services: AppServices::default(),
            preferences,
            http,
            feed_url: Arc::from(feed_url),
            fetch_retries,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let store = connect_store(config).await?;
        let preferences = PreferenceStore::new(store, config.limits, config.uid_policy);
        let http = build_client(&config.user_agent, config.fetch_timeout)?;
        Ok(Self::new(
            preferences,
            http,
            &config.feed_url,
            config.fetch_retries,
        ))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Preferences(#[from] PreferenceError),
    #[error("upstream feed fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("unexpected upstream content type: {0:?}")]
    UnexpectedContentType(Option<String>),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("store initialization failed: {0}")]
    Storage(#[from] StorageError),
    #[error("http client initialization failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
struct LimitsResponse {
    max_entries: usize,
    max_total_len: usize,
    max_name_len: usize,
    separator: char,
}

async fn writeups(State(state): State<SharedState>, Path(uid): Path<String>) -> Response {
    match filtered_writeups(&state, &uid).await {
        Ok(response) => response,
        Err(error) => {
            tracing::error!(
                %uid,
                error = %error,
                cause = ?std::error::Error::source(&error),
                "writeups request failed"
            );
            error.into_response()
        }
    }
}

async fn filtered_writeups(state: &SharedState, uid: &str) -> Result<Response, AppError> {
    let names = state.preferences.load(uid).await?;
    let upstream = fetch_feed_with_retry(&state.http, &state.feed_url, state.fetch_retries).await?;
    let content_type = match upstream.content_type.clone() {
        Some(value) if upstream.has_feed_content_type() => value,
        other => return Err(AppError::UnexpectedContentType(other)),
    };

    let filtered = filter_writeups_bytes(&upstream.body, &names)?;
    Ok((upstream.status, [(CONTENT_TYPE, content_type)], filtered).into_response())
}

async fn limits(State(state): State<SharedState>) -> Json<LimitsResponse> {
    let limits = state.preferences.limits();
    Json(LimitsResponse {
        max_entries: limits.max_entries(),
        max_total_len: limits.max_total_len(),
        max_name_len: limits.max_name_len(),
        separator: ENTRY_SEPARATOR,
    })
}

async fn app_health(State(state): State<SharedState>) -> Json<BTreeMap<String, String>> {
    Json(state.services.health_report())
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/writeups/{uid}", get(writeups))
        .route("/limits", get(limits))
        .route("/health", get(app_health))
        .with_state(state)
}

pub async fn connect_store(config: &Config) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    let rules = config.limits.store_rules();
    let store: Arc<dyn KeyValueStore> = match &config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::with_rules(rules)),
        StoreBackend::Sqlite { url } => Arc::new(SqliteStore::connect(url, rules).await?),
        StoreBackend::Firebase { url, auth_token } => Arc::new(RealtimeDbStore::connect(
            url,
            auth_token.clone(),
            config.fetch_timeout,
        )?),
    };
    Ok(store)
}

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,writeups_filter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn run(config: Config) -> Result<(), StartupError> {
    let state = SharedState::from_config(&config).await?;
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        feed_url = %config.feed_url,
        max_entries = config.limits.max_entries(),
        "serving filtered writeups"
    );
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::preferences::codec::Limits;
    use crate::core::preferences::user_id::UidPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const FIXTURE: &str = include_str!("../fixtures/writeups.rss.xml");

    async fn spawn_upstream(content_type: &'static str) -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new().route(
            "/writeups/rss/",
            get(move || async move { ([(CONTENT_TYPE, content_type)], FIXTURE) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}/writeups/rss/"), join_handle)
    }

    fn router_with(store: MemoryStore, feed_url: &str) -> Router {
        let preferences =
            PreferenceStore::new(Arc::new(store), Limits::default(), UidPolicy::Alphanumeric);
        build_router(SharedState::new(
            preferences,
            reqwest::Client::new(),
            feed_url,
            0,
        ))
    }

    async fn get_path(router: Router, path: &str) -> (StatusCode, Option<String>, String) {
        let response = router
            .oneshot(
                Request::builder()
                    .uri(path)
                    .body(Body::empty())
                    .expect("request must build"),
            )
            .await
            .expect("router must answer");
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body must read");
        (
            status,
            content_type,
            String::from_utf8(body.to_vec()).expect("body must be utf-8"),
        )
    }

    #[tokio::test]
    async fn serves_the_feed_filtered_for_the_user() {
        let (feed_url, upstream) = spawn_upstream("application/rss+xml; charset=utf-8").await;
        let store =
            MemoryStore::new().with_entry("data/user1/ctf_names", "def con\u{241E}PICOctf");

        let (status, content_type, body) =
            get_path(router_with(store, &feed_url), "/writeups/user1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/rss+xml; charset=utf-8"));
        assert!(body.contains("DEF CON CTF Finals 2020"));
        assert!(body.contains("picoCTF 2021"));
        assert!(!body.contains("HITCON"));
        assert!(!body.contains("Dragon CTF"));
        upstream.abort();
    }

    #[tokio::test]
    async fn user_with_empty_list_gets_an_empty_channel() {
        let (feed_url, upstream) = spawn_upstream("application/rss+xml").await;
        let store = MemoryStore::new().with_entry("data/user1/ctf_names", "");

        let (status, _, body) = get_path(router_with(store, &feed_url), "/writeups/user1").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<title>CTFtime.org: New writeups</title>"));
        assert!(!body.contains("<item>"));
        upstream.abort();
    }

    #[tokio::test]
    async fn every_failure_is_a_bare_server_error() {
        let (feed_url, upstream) = spawn_upstream("application/rss+xml").await;
        let (html_url, html_upstream) = spawn_upstream("text/html").await;
        let seeded = || {
            MemoryStore::new()
                .with_entry("data/user1/ctf_names", "DEF CON")
                .with_entry("data/mixed/ctf_names", "\u{241E}DEF CON")
        };

        let cases = [
            (router_with(seeded(), &feed_url), "/writeups/unknown"),
            (router_with(seeded(), &feed_url), "/writeups/bad.id"),
            (router_with(seeded(), &feed_url), "/writeups/mixed"),
            (router_with(seeded(), &html_url), "/writeups/user1"),
        ];
        for (router, path) in cases {
            let (status, _, body) = get_path(router, path).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{path}");
            assert!(body.is_empty(), "{path}");
        }

        upstream.abort();
        html_upstream.abort();
    }

    #[tokio::test]
    async fn limits_are_published_for_forms() {
        let (status, _, body) =
            get_path(router_with(MemoryStore::new(), "http://127.0.0.1:9/"), "/limits").await;

        assert_eq!(status, StatusCode::OK);
        let limits: serde_json::Value = serde_json::from_str(&body).expect("json body");
        assert_eq!(limits["max_entries"], 20);
        assert_eq!(limits["max_total_len"], 620);
        assert_eq!(limits["max_name_len"], 30);
        assert_eq!(limits["separator"], "\u{241E}");
    }

    #[tokio::test]
    async fn health_lists_every_service() {
        let (status, _, body) =
            get_path(router_with(MemoryStore::new(), "http://127.0.0.1:9/"), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let report: BTreeMap<String, String> = serde_json::from_str(&body).expect("json body");
        assert_eq!(
            report.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["feed", "preferences", "storage"]
        );
    }

    #[tokio::test]
    async fn memory_backend_enforces_store_rules() {
        let config = Config::from_lookup(|_| None).expect("default config");
        let store = connect_store(&config).await.expect("memory store");

        let error = store
            .set("data/user1/profile", "x")
            .await
            .expect_err("sibling key must be rejected");
        assert!(matches!(error, StorageError::RuleViolation { .. }));
    }
}
