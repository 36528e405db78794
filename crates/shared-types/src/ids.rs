//! Account names and fixed-width object ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 20-byte block id. The leading 4 bytes carry the big-endian block number so
/// a number can be recovered from an id without a lookup.
pub type BlockId = [u8; 20];

/// 20-byte transaction id (truncated digest of the unsigned transaction).
pub type TransactionId = [u8; 20];

/// Recover the block number embedded in a block id.
pub fn block_num_from_id(id: &BlockId) -> u32 {
    u32::from_be_bytes([id[0], id[1], id[2], id[3]])
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("account name length must be 1..=16, got {0}")]
    BadLength(usize),

    #[error("account name contains invalid character {0:?}")]
    BadCharacter(char),

    #[error("account name segment must start with a letter")]
    BadSegmentStart,
}

/// A validated account name.
///
/// Names are 1..=16 characters of `a-z`, `0-9`, `.` and `-`; dot-separated
/// segments must start with a letter. The empty name is reserved as the
/// proxy-to-self sentinel and the root post parent; it is only constructible
/// through [`AccountName::none`].
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountName(String);

impl AccountName {
    pub fn new(name: &str) -> Result<Self, NameError> {
        if name.is_empty() || name.len() > 16 {
            return Err(NameError::BadLength(name.len()));
        }
        for segment in name.split('.') {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if c.is_ascii_lowercase() => {}
                Some(c) => {
                    return Err(if c.is_ascii_digit() || c == '-' {
                        NameError::BadSegmentStart
                    } else {
                        NameError::BadCharacter(c)
                    })
                }
                None => return Err(NameError::BadSegmentStart),
            }
            for c in chars {
                if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
                    return Err(NameError::BadCharacter(c));
                }
            }
        }
        Ok(AccountName(name.to_owned()))
    }

    /// The empty sentinel: proxy-to-self and root post parent.
    pub fn none() -> Self {
        AccountName(String::new())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["alice", "a", "bob-1", "a.b.c", "witness0", "x-y.z9"] {
            assert!(AccountName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(AccountName::new(""), Err(NameError::BadLength(0)));
        assert_eq!(
            AccountName::new("averyverylongaccountname"),
            Err(NameError::BadLength(24))
        );
        assert_eq!(AccountName::new("9lives"), Err(NameError::BadSegmentStart));
        assert_eq!(AccountName::new("a..b"), Err(NameError::BadSegmentStart));
        assert_eq!(
            AccountName::new("Alice"),
            Err(NameError::BadCharacter('A'))
        );
        assert_eq!(
            AccountName::new("under_score"),
            Err(NameError::BadCharacter('_'))
        );
    }

    #[test]
    fn test_block_num_round_trip() {
        let mut id: BlockId = [0xAA; 20];
        id[..4].copy_from_slice(&42_000u32.to_be_bytes());
        assert_eq!(block_num_from_id(&id), 42_000);
    }
}
