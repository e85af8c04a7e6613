//! Service trait seams and payload validation.
//!
//! The services return loosely-shaped raw records; everything is parsed
//! into typed values before it touches the ledger or the cache. A raw
//! submission missing its identity or timestamp is dropped with a warning;
//! a catalog that yields no valid item at all is rejected wholesale and
//! treated like a network failure, so an invalid payload is never cached.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use foothold_core::{FetchError, GroupId, Handle, Problem, ProblemKey, Submission, Verdict};

// ============================================================================
// RAW PAYLOAD TYPES
// ============================================================================

/// Raw catalog response: an item list plus a popularity-statistics list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPayload {
    #[serde(default)]
    pub problems: Vec<RawProblem>,
    #[serde(default)]
    pub statistics: Vec<RawProblemStat>,
}

/// One catalog item as the service reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProblem {
    pub group_id: Option<String>,
    pub index: Option<String>,
    pub name: Option<String>,
    pub rating: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One popularity-statistics row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProblemStat {
    pub group_id: Option<String>,
    pub index: Option<String>,
    pub solved_count: Option<u64>,
}

/// One activity record as the service reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSubmission {
    pub id: Option<u64>,
    pub group_id: Option<String>,
    pub index: Option<String>,
    pub verdict: Option<Verdict>,
    pub created_at: Option<i64>,
}

// ============================================================================
// SERVICE TRAITS
// ============================================================================

/// Reference-catalog provider.
///
/// One opaque operation; transport-level retries, timeouts and header
/// policy live in the implementation, not here.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetch the full catalog plus its statistics feed.
    async fn fetch_catalog(&self) -> Result<CatalogPayload, FetchError>;
}

/// User-activity provider.
///
/// Responses are not guaranteed to be sorted by timestamp.
#[async_trait]
pub trait ActivityService: Send + Sync {
    /// Fetch the user's bounded-size full history.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] when the service reports no such
    /// user, [`FetchError::Network`] on transient failure.
    async fn fetch_full(&self, handle: &Handle) -> Result<Vec<RawSubmission>, FetchError>;

    /// Fetch recent records, optionally scoped to one catalog group.
    async fn fetch_incremental(
        &self,
        handle: &Handle,
        scope: Option<&GroupId>,
    ) -> Result<Vec<RawSubmission>, FetchError>;
}

// ============================================================================
// PAYLOAD VALIDATION
// ============================================================================

/// Validate a raw catalog payload into typed problems, merging the
/// popularity statistics onto the item list.
///
/// Rows missing their identity are dropped. Statistics rows matching no
/// item are ignored; items without a statistics row keep a zero counter.
///
/// # Errors
///
/// Returns [`FetchError::Malformed`] when no valid item remains - an empty
/// catalog is handled exactly like a network failure and never cached.
pub fn parse_catalog(payload: CatalogPayload) -> Result<Vec<Problem>, FetchError> {
    let mut popularity: HashMap<ProblemKey, u64> = HashMap::new();
    for stat in payload.statistics {
        let (Some(group_id), Some(index)) = (stat.group_id, stat.index) else {
            continue;
        };
        popularity.insert(
            ProblemKey::new(group_id, &index),
            stat.solved_count.unwrap_or(0),
        );
    }

    let total = payload.problems.len();
    let mut problems = Vec::with_capacity(total);
    for raw in payload.problems {
        let (Some(group_id), Some(index)) = (raw.group_id, raw.index) else {
            warn!("dropping catalog row without identity");
            continue;
        };
        let key = ProblemKey::new(group_id.clone(), &index);
        problems.push(Problem {
            group_id,
            index,
            name: raw.name.unwrap_or_default(),
            rating: raw.rating,
            tags: raw.tags,
            solved_count: popularity.get(&key).copied().unwrap_or(0),
        });
    }

    if problems.is_empty() {
        return Err(FetchError::Malformed {
            reason: format!("no valid catalog items in a payload of {total} rows"),
        });
    }
    Ok(problems)
}

/// Validate raw activity records into typed submissions.
///
/// Records missing id, problem identity or timestamp are dropped with a
/// warning. A missing verdict (a record still being judged) maps to
/// [`Verdict::Other`]: it is an attempt, not a parse failure.
pub fn parse_submissions(raw: Vec<RawSubmission>) -> Vec<Submission> {
    let mut submissions = Vec::with_capacity(raw.len());
    for record in raw {
        let (Some(id), Some(group_id), Some(index), Some(created_at)) =
            (record.id, record.group_id, record.index, record.created_at)
        else {
            warn!("dropping activity record with missing fields");
            continue;
        };
        submissions.push(Submission {
            id,
            group_id,
            index,
            verdict: record.verdict.unwrap_or(Verdict::Other),
            created_at,
        });
    }
    submissions
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_problem(group: &str, index: &str, name: &str) -> RawProblem {
        RawProblem {
            group_id: Some(group.to_string()),
            index: Some(index.to_string()),
            name: Some(name.to_string()),
            rating: Some(800),
            tags: vec!["math".to_string()],
        }
    }

    #[test]
    fn test_parse_catalog_merges_popularity() {
        let payload = CatalogPayload {
            problems: vec![raw_problem("4", "A", "Watermelon"), raw_problem("4", "B", "Ants")],
            statistics: vec![
                RawProblemStat {
                    group_id: Some("4".to_string()),
                    index: Some("a".to_string()), // joined through the normalized key
                    solved_count: Some(12_345),
                },
                RawProblemStat {
                    group_id: Some("999".to_string()),
                    index: Some("Z".to_string()),
                    solved_count: Some(1),
                },
            ],
        };

        let problems = parse_catalog(payload).unwrap();
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].solved_count, 12_345);
        assert_eq!(problems[1].solved_count, 0);
    }

    #[test]
    fn test_parse_catalog_drops_rows_without_identity() {
        let payload = CatalogPayload {
            problems: vec![RawProblem::default(), raw_problem("4", "A", "Watermelon")],
            statistics: vec![],
        };
        let problems = parse_catalog(payload).unwrap();
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn test_parse_catalog_rejects_empty_payload() {
        let err = parse_catalog(CatalogPayload::default()).unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));

        let only_invalid = CatalogPayload {
            problems: vec![RawProblem::default()],
            statistics: vec![],
        };
        assert!(parse_catalog(only_invalid).is_err());
    }

    #[test]
    fn test_parse_submissions_drops_incomplete_records() {
        let raw = vec![
            RawSubmission {
                id: Some(1),
                group_id: Some("4".to_string()),
                index: Some("A".to_string()),
                verdict: Some(Verdict::Accepted),
                created_at: Some(100),
            },
            RawSubmission {
                id: None,
                group_id: Some("4".to_string()),
                index: Some("B".to_string()),
                verdict: Some(Verdict::Accepted),
                created_at: Some(100),
            },
        ];
        let parsed = parse_submissions(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, 1);
    }

    #[test]
    fn test_parse_submissions_missing_verdict_is_an_attempt() {
        let raw = vec![RawSubmission {
            id: Some(1),
            group_id: Some("4".to_string()),
            index: Some("A".to_string()),
            verdict: None,
            created_at: Some(100),
        }];
        let parsed = parse_submissions(raw);
        assert_eq!(parsed[0].verdict, Verdict::Other);
    }
}
