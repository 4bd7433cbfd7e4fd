pub const USER_DATA_ROOT: &str = "data";
pub const CTF_NAMES_KEY: &str = "ctf_names";

pub const MAX_KEY_BYTES: usize = 768;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("only data/<uid>/ctf_names is writable")]
    PathNotWritable,
    #[error("value length {len} is not below {max}")]
    ValueTooLong { len: usize, max: usize },
}

/// Length as the hosted rule language counts it (UTF-16 code units).
pub fn value_len(value: &str) -> usize {
    value.encode_utf16().count()
}

pub fn is_legal_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_BYTES
        && !key
            .chars()
            .any(|c| matches!(c, '.' | '$' | '#' | '[' | ']' | '/') || c.is_ascii_control())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRules {
    max_value_len: usize,
}

impl StoreRules {
    pub fn new(max_value_len: usize) -> Self {
        Self { max_value_len }
    }

    pub fn max_value_len(&self) -> usize {
        self.max_value_len
    }

    pub fn validate_write(&self, path: &str, value: &str) -> Result<(), RuleViolation> {
        let mut segments = path.split('/');
        let writable = matches!(
            (segments.next(), segments.next(), segments.next(), segments.next()),
            (Some(USER_DATA_ROOT), Some(uid), Some(CTF_NAMES_KEY), None) if is_legal_key(uid)
        );
        if !writable {
            return Err(RuleViolation::PathNotWritable);
        }

        let len = value_len(value);
        if len >= self.max_value_len {
            return Err(RuleViolation::ValueTooLong {
                len,
                max: self.max_value_len,
            });
        }
        Ok(())
    }
}
