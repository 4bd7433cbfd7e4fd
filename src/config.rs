use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::core::preferences::codec::{
    Limits, LimitsError, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_TOTAL_LEN,
};
use crate::core::preferences::user_id::UidPolicy;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_FEED_URL: &str = "https://ctftime.org/writeups/rss/";
pub const DEFAULT_USER_AGENT: &str = "CTFTime Writeups Filter 1.0";
pub const DEFAULT_SQLITE_URL: &str = "sqlite://writeups-filter.db?mode=rwc";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("{key} must be set when {requirement}")]
    Missing {
        key: &'static str,
        requirement: &'static str,
    },
    #[error("invalid list limits: {0}")]
    Limits(#[from] LimitsError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite { url: String },
    Firebase {
        url: String,
        auth_token: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub feed_url: String,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub fetch_retries: usize,
    pub store: StoreBackend,
    pub limits: Limits,
    pub uid_policy: UidPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::from_filename(".env.local");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let store = match var("WFF_STORE").as_deref().unwrap_or("memory") {
            "memory" => StoreBackend::Memory,
            "sqlite" => StoreBackend::Sqlite {
                url: var("WFF_SQLITE_URL").unwrap_or_else(|| DEFAULT_SQLITE_URL.to_string()),
            },
            "firebase" => StoreBackend::Firebase {
                url: var("WFF_FIREBASE_URL").ok_or(ConfigError::Missing {
                    key: "WFF_FIREBASE_URL",
                    requirement: "WFF_STORE=firebase",
                })?,
                auth_token: var("WFF_FIREBASE_AUTH"),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "WFF_STORE",
                    reason: format!("unknown store backend {other:?}"),
                })
            }
        };

        let limits = Limits::new(
            parse_or(var("WFF_MAX_ENTRIES"), "WFF_MAX_ENTRIES", DEFAULT_MAX_ENTRIES)?,
            parse_or(
                var("WFF_MAX_TOTAL_LEN"),
                "WFF_MAX_TOTAL_LEN",
                DEFAULT_MAX_TOTAL_LEN,
            )?,
        )?;
        let timeout_secs: u64 =
            parse_or(var("WFF_FETCH_TIMEOUT_SECS"), "WFF_FETCH_TIMEOUT_SECS", 20)?;

        Ok(Self {
            bind_addr: parse_or(
                var("WFF_BIND_ADDR"),
                "WFF_BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            )?,
            feed_url: var("WFF_FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            user_agent: var("WFF_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            fetch_timeout: Duration::from_secs(timeout_secs),
            fetch_retries: parse_or(var("WFF_FETCH_RETRIES"), "WFF_FETCH_RETRIES", 2)?,
            store,
            limits,
            uid_policy: parse_or(var("WFF_UID_POLICY"), "WFF_UID_POLICY", UidPolicy::default())?,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(value) => value.parse().map_err(|error: T::Err| ConfigError::Invalid {
            key,
            reason: error.to_string(),
        }),
        None => {
            tracing::debug!("{key} not set, using default");
            Ok(default)
        }
    }
}
