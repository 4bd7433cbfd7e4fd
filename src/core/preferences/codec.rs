use serde::Serialize;

use crate::core::storage::rules::{value_len, StoreRules};

/// SYMBOL FOR RECORD SEPARATOR. Stored data depends on this exact character.
pub const ENTRY_SEPARATOR: char = '\u{241E}';

pub const DEFAULT_MAX_ENTRIES: usize = 20;

pub const DEFAULT_MAX_TOTAL_LEN: usize = 620;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitsError {
    #[error("max entries must be at least 1")]
    NoEntries,
    #[error("max total length {max_total_len} leaves no room for names across {max_entries} entries")]
    NoRoom {
        max_entries: usize,
        max_total_len: usize,
    },
}

/// Lengths are UTF-16 code units, the unit of the hosted store's rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    max_entries: usize,
    max_total_len: usize,
}

impl Limits {
    pub fn new(max_entries: usize, max_total_len: usize) -> Result<Self, LimitsError> {
        if max_entries == 0 {
            return Err(LimitsError::NoEntries);
        }
        if max_total_len.saturating_sub(max_entries) < max_entries {
            return Err(LimitsError::NoRoom {
                max_entries,
                max_total_len,
            });
        }
        Ok(Self {
            max_entries,
            max_total_len,
        })
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn max_total_len(&self) -> usize {
        self.max_total_len
    }

    pub fn max_name_len(&self) -> usize {
        (self.max_total_len - self.max_entries) / self.max_entries
    }

    pub fn store_rules(&self) -> StoreRules {
        StoreRules::new(self.max_total_len)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_total_len: DEFAULT_MAX_TOTAL_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListViolation {
    #[error("{count} entries exceed the maximum of {max}")]
    TooManyEntries { count: usize, max: usize },
    #[error("entry {index} contains the reserved separator")]
    SeparatorInName { index: usize },
    #[error("entry {index} is empty in a list of several names")]
    EmptyName { index: usize },
    #[error("encoded length {len} is not below {max}")]
    TooLong { len: usize, max: usize },
}

pub fn encode<S: AsRef<str>>(names: &[S], limits: &Limits) -> Result<String, ListViolation> {
    check_count(names.len(), limits)?;
    if let Some(index) = names
        .iter()
        .position(|name| name.as_ref().contains(ENTRY_SEPARATOR))
    {
        return Err(ListViolation::SeparatorInName { index });
    }
    // "" may only stand alone.
    if names.len() > 1 {
        if let Some(index) = names.iter().position(|name| name.as_ref().is_empty()) {
            return Err(ListViolation::EmptyName { index });
        }
    }

    let mut encoded = String::new();
    for (index, name) in names.iter().enumerate() {
        if index > 0 {
            encoded.push(ENTRY_SEPARATOR);
        }
        encoded.push_str(name.as_ref());
    }
    check_len(&encoded, limits)?;
    Ok(encoded)
}

/// An empty value decodes to `[""]`, never to an empty list.
pub fn decode(raw: &str, limits: &Limits) -> Result<Vec<String>, ListViolation> {
    check_len(raw, limits)?;
    let names: Vec<String> = raw.split(ENTRY_SEPARATOR).map(ToString::to_string).collect();
    check_count(names.len(), limits)?;
    Ok(names)
}

fn check_count(count: usize, limits: &Limits) -> Result<(), ListViolation> {
    if count > limits.max_entries {
        return Err(ListViolation::TooManyEntries {
            count,
            max: limits.max_entries,
        });
    }
    Ok(())
}

fn check_len(encoded: &str, limits: &Limits) -> Result<(), ListViolation> {
    let len = value_len(encoded);
    if len >= limits.max_total_len {
        return Err(ListViolation::TooLong {
            len,
            max: limits.max_total_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_the_store_rule() {
        let limits = Limits::default();

        assert_eq!(limits.max_entries(), 20);
        assert_eq!(limits.max_total_len(), 620);
        assert_eq!(limits.max_name_len(), 30);
        assert_eq!(limits.store_rules().max_value_len(), 620);
        assert_eq!(Limits::new(10, 620).expect("valid").max_name_len(), 61);
    }

    #[test]
    fn limits_reject_degenerate_values() {
        assert_eq!(Limits::new(0, 620), Err(LimitsError::NoEntries));
        assert!(matches!(Limits::new(20, 39), Err(LimitsError::NoRoom { .. })));
        assert!(matches!(Limits::new(20, 10), Err(LimitsError::NoRoom { .. })));
        assert!(Limits::new(20, 40).is_ok());
    }

    #[test]
    fn full_list_of_longest_names_fits() {
        let limits = Limits::default();
        let names: Vec<String> = (0..limits.max_entries())
            .map(|_| "n".repeat(limits.max_name_len()))
            .collect();

        let encoded = encode(&names, &limits).expect("full list must fit");
        assert!(value_len(&encoded) < limits.max_total_len());
    }

    #[test]
    fn round_trip_keeps_names_and_order() {
        let limits = Limits::default();
        let lists: Vec<Vec<&str>> = vec![
            vec!["DEF CON CTF"],
            vec!["picoCTF", "HITCON", "Dragon CTF"],
            vec!["A|B", "(weird) [name]", "Ünïcødé 🚩"],
            vec![""],
        ];

        for names in lists {
            let encoded = encode(&names, &limits).expect("encode");
            assert_eq!(decode(&encoded, &limits).expect("decode"), names);
        }
    }

    #[test]
    fn empty_list_comes_back_as_single_empty_name() {
        let limits = Limits::default();
        let empty: [&str; 0] = [];

        let encoded = encode(&empty, &limits).expect("empty list is storable");
        assert_eq!(encoded, "");
        assert_eq!(decode(&encoded, &limits).expect("decode"), vec![String::new()]);
    }

    #[test]
    fn encode_rejects_each_violation() {
        let limits = Limits::new(3, 20).expect("valid");

        assert_eq!(
            encode(&["a", "b", "c", "d"], &limits),
            Err(ListViolation::TooManyEntries { count: 4, max: 3 })
        );
        assert_eq!(
            encode(&["a", "b\u{241E}c"], &limits),
            Err(ListViolation::SeparatorInName { index: 1 })
        );
        assert_eq!(
            encode(&["aaaaaaaaaa", "bbbbbbbbb"], &limits),
            Err(ListViolation::TooLong { len: 20, max: 20 })
        );
        assert!(encode(&["aaaaaaaaaa", "bbbbbbbb"], &limits).is_ok());
    }

    #[test]
    fn empty_name_is_only_allowed_alone() {
        let limits = Limits::default();

        assert_eq!(
            encode(&["DEF CON", ""], &limits),
            Err(ListViolation::EmptyName { index: 1 })
        );
        assert_eq!(
            encode(&["", "picoCTF", "HITCON"], &limits),
            Err(ListViolation::EmptyName { index: 0 })
        );
        assert_eq!(encode(&[""], &limits), Ok(String::new()));
    }

    #[test]
    fn decode_rejects_out_of_policy_values() {
        let limits = Limits::new(2, 20).expect("valid");

        assert_eq!(
            decode("a\u{241E}b\u{241E}c", &limits),
            Err(ListViolation::TooManyEntries { count: 3, max: 2 })
        );
        assert_eq!(
            decode(&"x".repeat(25), &limits),
            Err(ListViolation::TooLong { len: 25, max: 20 })
        );
    }
}
