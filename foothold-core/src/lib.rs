//! Foothold Core - Entity Types
//!
//! Pure data structures with no behavior beyond identifier normalization
//! and validation. All other crates depend on this.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod ident;

pub use config::{RetryConfig, SessionConfig};
pub use error::{
    ConfigError, FetchError, FootholdError, FootholdResult, StorageError, ValidationError,
};
pub use ident::{GroupId, Handle};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp in seconds since the Unix epoch, as reported by the services.
pub type EpochSeconds = i64;

/// Canonical identifier for a catalog problem.
///
/// Formed from a group identifier and a normalized index: the index is
/// trimmed and upper-cased on construction, so `("1534", " a ")` and
/// `("1534", "A")` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemKey {
    group_id: String,
    index: String,
}

impl ProblemKey {
    /// Build a key, normalizing the index (trim + uppercase).
    pub fn new(group_id: impl Into<String>, index: &str) -> Self {
        Self {
            group_id: group_id.into(),
            index: index.trim().to_ascii_uppercase(),
        }
    }

    /// The group this problem belongs to.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The normalized problem index within the group.
    pub fn index(&self) -> &str {
        &self.index
    }
}

impl std::fmt::Display for ProblemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.group_id, self.index)
    }
}

// ============================================================================
// CATALOG TYPES
// ============================================================================

/// A problem in the reference catalog.
///
/// Immutable once fetched; the catalog is replaced wholesale on refetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Group (contest) identifier.
    pub group_id: String,
    /// Index within the group, e.g. "A", "B1".
    pub index: String,
    /// Display name.
    pub name: String,
    /// Difficulty rating, when the catalog provides one.
    pub rating: Option<i32>,
    /// Unordered tag list; tags repeat across problems.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Popularity counter merged from the catalog statistics feed.
    #[serde(default)]
    pub solved_count: u64,
}

impl Problem {
    /// Canonical key for this problem.
    pub fn key(&self) -> ProblemKey {
        ProblemKey::new(self.group_id.clone(), &self.index)
    }
}

// ============================================================================
// ACTIVITY TYPES
// ============================================================================

/// Outcome label of one submission.
///
/// `Accepted` is the success outcome; every other label (including labels
/// this build does not know about, mapped to `Other`) marks an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompilationError,
    Skipped,
    #[serde(other)]
    Other,
}

impl Verdict {
    /// Whether this verdict marks the problem as solved.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// One observed activity record for a user.
///
/// Immutable once observed. Identity is the service-assigned `id`; the
/// ledger deduplicates on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Unique record identifier assigned by the activity service.
    pub id: u64,
    /// Group of the problem this submission targets.
    pub group_id: String,
    /// Index of the problem within the group (not necessarily normalized).
    pub index: String,
    /// Recorded outcome.
    pub verdict: Verdict,
    /// Submission time in seconds since the Unix epoch.
    pub created_at: EpochSeconds,
}

impl Submission {
    /// Canonical key of the problem this submission touches.
    pub fn key(&self) -> ProblemKey {
        ProblemKey::new(self.group_id.clone(), &self.index)
    }

    /// Whether this submission solved the problem.
    pub fn is_accepted(&self) -> bool {
        self.verdict.is_accepted()
    }
}

/// Derived per-problem attempt summary.
///
/// Exists for every key touched by at least one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptInfo {
    /// Number of submissions touching this key.
    pub attempts: u32,
    /// Verdict of the chronologically latest submission.
    pub last_verdict: Verdict,
    /// Timestamp of the chronologically latest submission.
    pub last_submitted_at: EpochSeconds,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_key_normalizes_index() {
        let a = ProblemKey::new("1534", " a ");
        let b = ProblemKey::new("1534", "A");
        assert_eq!(a, b);
        assert_eq!(a.index(), "A");
        assert_eq!(a.to_string(), "1534-A");
    }

    #[test]
    fn test_problem_key_distinct_groups() {
        assert_ne!(ProblemKey::new("1534", "A"), ProblemKey::new("1535", "A"));
    }

    #[test]
    fn test_verdict_accepted() {
        assert!(Verdict::Accepted.is_accepted());
        assert!(!Verdict::WrongAnswer.is_accepted());
        assert!(!Verdict::Other.is_accepted());
    }

    #[test]
    fn test_verdict_unknown_label_maps_to_other() {
        let v: Verdict = serde_json::from_str("\"judging\"").unwrap();
        assert_eq!(v, Verdict::Other);
    }

    #[test]
    fn test_submission_key_uses_normalized_index() {
        let s = Submission {
            id: 1,
            group_id: "4".to_string(),
            index: "a".to_string(),
            verdict: Verdict::Accepted,
            created_at: 1_700_000_000,
        };
        assert_eq!(s.key(), ProblemKey::new("4", "A"));
    }

    #[test]
    fn test_problem_deserialize_defaults() {
        let p: Problem =
            serde_json::from_str(r#"{"group_id":"4","index":"A","name":"Watermelon","rating":800}"#)
                .unwrap();
        assert!(p.tags.is_empty());
        assert_eq!(p.solved_count, 0);
    }
}
