use std::fmt;
use std::str::FromStr;

use crate::core::storage::rules::is_legal_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UidPolicy {
    #[default]
    Alphanumeric,
    StoreKey,
}

impl FromStr for UidPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alphanumeric" => Ok(Self::Alphanumeric),
            "store-key" | "store_key" => Ok(Self::StoreKey),
            other => Err(format!("unknown uid policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user id: {0:?}")]
pub struct InvalidUserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str, policy: UidPolicy) -> Result<Self, InvalidUserId> {
        let legal = match policy {
            UidPolicy::Alphanumeric => {
                !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric())
            }
            UidPolicy::StoreKey => is_legal_key(raw),
        };
        if !legal {
            return Err(InvalidUserId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
