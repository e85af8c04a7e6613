//! Validated user and group identifiers.
//!
//! Both newtypes reject malformed input synchronously, before any service
//! call is made. The format checks are deliberately conservative: a handle
//! is 3-24 characters from `[A-Za-z0-9_.-]`, a group id is 1-16 ASCII
//! alphanumerics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,24}$").expect("handle pattern is valid"));

static GROUP_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,16}$").expect("group id pattern is valid"));

/// A validated user handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    /// Parse and validate a raw handle string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyHandle);
        }
        if !HANDLE_RE.is_match(trimmed) {
            return Err(ValidationError::BadHandle {
                handle: raw.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The validated handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Handle {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

/// A validated catalog group identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    /// Parse and validate a raw group id string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if !GROUP_ID_RE.is_match(trimmed) {
            return Err(ValidationError::BadGroupId {
                group_id: raw.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The validated group id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GroupId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GroupId> for String {
    fn from(group_id: GroupId) -> Self {
        group_id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_accepts_typical_names() {
        for raw in ["tourist", "Benq_2", "user.name-x", "abc"] {
            assert!(Handle::parse(raw).is_ok(), "expected {raw:?} to parse");
        }
    }

    #[test]
    fn test_handle_rejects_too_short() {
        assert_eq!(
            Handle::parse("ab"),
            Err(ValidationError::BadHandle {
                handle: "ab".to_string()
            })
        );
    }

    #[test]
    fn test_handle_rejects_control_characters() {
        let raw = "tou\u{0007}rist";
        assert!(matches!(
            Handle::parse(raw),
            Err(ValidationError::BadHandle { .. })
        ));
    }

    #[test]
    fn test_handle_rejects_empty() {
        assert_eq!(Handle::parse("   "), Err(ValidationError::EmptyHandle));
    }

    #[test]
    fn test_handle_trims_whitespace() {
        assert_eq!(Handle::parse(" tourist ").unwrap().as_str(), "tourist");
    }

    #[test]
    fn test_group_id_rejects_separator_characters() {
        assert!(GroupId::parse("15-34").is_err());
        assert!(GroupId::parse("").is_err());
        assert!(GroupId::parse("1534").is_ok());
    }

    #[test]
    fn test_handle_serde_roundtrip() {
        let handle = Handle::parse("tourist").unwrap();
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, "\"tourist\"");
        let back: Handle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }

    #[test]
    fn test_handle_serde_rejects_invalid() {
        assert!(serde_json::from_str::<Handle>("\"x\"").is_err());
    }
}
