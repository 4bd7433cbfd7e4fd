pub mod codec;
pub mod user_id;

use std::sync::Arc;

use codec::{decode, encode, Limits, ListViolation};
use user_id::{InvalidUserId, UidPolicy, UserId};

use crate::core::storage::rules::{CTF_NAMES_KEY, USER_DATA_ROOT};
use crate::core::storage::{KeyValueStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error(transparent)]
    InvalidUserId(#[from] InvalidUserId),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("stored list for user {uid} is out of policy: {violation}")]
    CapacityExceeded {
        uid: String,
        violation: ListViolation,
    },
    #[error("invalid followed name list: {0}")]
    InvalidList(#[from] ListViolation),
    #[error("store failure: {0}")]
    Storage(#[from] StorageError),
}

pub fn ctf_names_path(uid: &UserId) -> String {
    format!("{}/{}/{}", USER_DATA_ROOT, uid, CTF_NAMES_KEY)
}

#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
    limits: Limits,
    uid_policy: UidPolicy,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>, limits: Limits, uid_policy: UidPolicy) -> Self {
        Self {
            store,
            limits,
            uid_policy,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn parse_user_id(&self, raw: &str) -> Result<UserId, PreferenceError> {
        Ok(UserId::parse(raw, self.uid_policy)?)
    }

    pub async fn load(&self, raw_uid: &str) -> Result<Vec<String>, PreferenceError> {
        let uid = self.parse_user_id(raw_uid)?;
        self.load_user(&uid).await
    }

    /// A user without a record is [`PreferenceError::UnknownUser`]; a user who
    /// stored an empty list reads back as `[""]`.
    pub async fn load_user(&self, uid: &UserId) -> Result<Vec<String>, PreferenceError> {
        let raw = self
            .store
            .get(&ctf_names_path(uid))
            .await?
            .ok_or_else(|| PreferenceError::UnknownUser(uid.to_string()))?;

        let names = decode(&raw, &self.limits).map_err(|violation| {
            tracing::error!(%uid, %violation, "stored followed names are out of policy");
            PreferenceError::CapacityExceeded {
                uid: uid.to_string(),
                violation,
            }
        })?;
        tracing::debug!(%uid, entries = names.len(), "loaded followed names");
        Ok(names)
    }

    pub async fn save<S: AsRef<str>>(
        &self,
        raw_uid: &str,
        names: &[S],
    ) -> Result<(), PreferenceError> {
        let uid = self.parse_user_id(raw_uid)?;
        self.save_user(&uid, names).await
    }

    pub async fn save_user<S: AsRef<str>>(
        &self,
        uid: &UserId,
        names: &[S],
    ) -> Result<(), PreferenceError> {
        let encoded = encode(names, &self.limits)?;
        self.store.set(&ctf_names_path(uid), &encoded).await?;
        tracing::debug!(%uid, entries = names.len(), "saved followed names");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreferenceService;

impl PreferenceService {
    pub fn name(&self) -> &'static str {
        "preferences"
    }

    pub fn status(&self) -> &'static str {
        "ready"
    }
}
