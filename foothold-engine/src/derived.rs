//! Wholesale recomputation of derived aggregates.
//!
//! `DerivedState::compute` is a pure, synchronous, total function: it never
//! suspends and touches nothing outside its arguments. The fold processes
//! submissions in chronological order (`created_at` ascending, id ascending
//! as tie-break) regardless of arrival or merge order, so derived state is
//! invariant under permutation and re-batching of the same submission set;
//! a property test pins that. The chronologically latest record sets
//! `last_verdict` / `last_submitted_at` for its key.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use foothold_core::{AttemptInfo, EpochSeconds, ProblemKey, Submission};

use crate::SubmissionLedger;

/// Intersection of the derived sets with the loaded catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogCounts {
    /// Solved keys that exist in the catalog.
    pub solved_in_catalog: usize,
    /// Attempted-but-unsolved keys that exist in the catalog.
    pub attempted_in_catalog: usize,
    /// Catalog keys never touched by any submission.
    pub untouched_in_catalog: usize,
}

/// Observable aggregates derived from the ledger.
///
/// Invariants: `solved` and the keys of `attempted_unsolved` are disjoint;
/// `daily_counts` counts only accepted submissions, bucketed by local
/// calendar date; `streak` is a pure function of `daily_counts` and today.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedState {
    /// Keys with at least one accepted submission.
    pub solved: HashSet<ProblemKey>,
    /// Keys with submissions but no accepted one.
    pub attempted_unsolved: HashMap<ProblemKey, AttemptInfo>,
    /// Accepted submissions per local calendar date.
    pub daily_counts: BTreeMap<NaiveDate, u32>,
    /// Consecutive active days ending at or adjacent to today.
    pub streak: u32,
    /// Catalog-intersected counts.
    pub catalog: CatalogCounts,
}

impl DerivedState {
    /// Recompute every aggregate from the full ledger.
    pub fn compute(
        ledger: &SubmissionLedger,
        catalog_keys: &HashSet<ProblemKey>,
        today: NaiveDate,
        offset: FixedOffset,
    ) -> Self {
        let mut ordered: Vec<&Submission> = ledger.iter().collect();
        ordered.sort_by_key(|s| (s.created_at, s.id));

        let mut solved: HashSet<ProblemKey> = HashSet::new();
        let mut attempts: HashMap<ProblemKey, AttemptInfo> = HashMap::new();
        let mut daily_counts: BTreeMap<NaiveDate, u32> = BTreeMap::new();

        for submission in ordered {
            let key = submission.key();
            let info = attempts.entry(key.clone()).or_insert(AttemptInfo {
                attempts: 0,
                last_verdict: submission.verdict,
                last_submitted_at: submission.created_at,
            });
            info.attempts += 1;
            info.last_verdict = submission.verdict;
            info.last_submitted_at = submission.created_at;

            if submission.is_accepted() {
                solved.insert(key);
                let date = local_date(submission.created_at, offset);
                *daily_counts.entry(date).or_insert(0) += 1;
            }
        }

        let attempted_unsolved: HashMap<ProblemKey, AttemptInfo> = attempts
            .into_iter()
            .filter(|(key, _)| !solved.contains(key))
            .collect();

        let streak = streak_from(&daily_counts, today);
        let catalog = catalog_counts(&solved, &attempted_unsolved, catalog_keys);

        Self {
            solved,
            attempted_unsolved,
            daily_counts,
            streak,
            catalog,
        }
    }
}

/// Local calendar date of an epoch timestamp under `offset`.
///
/// Out-of-range timestamps clamp to the Unix epoch.
pub fn local_date(ts: EpochSeconds, offset: FixedOffset) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .with_timezone(&offset)
        .date_naive()
}

/// Walk active dates backward from today, extending while each next active
/// date is the cursor date or exactly one day earlier.
fn streak_from(daily_counts: &BTreeMap<NaiveDate, u32>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut cursor = today;
    for (&date, &count) in daily_counts.iter().rev() {
        if count == 0 || date > today {
            continue;
        }
        if date == cursor || Some(date) == cursor.pred_opt() {
            streak += 1;
            cursor = date;
        } else {
            break;
        }
    }
    streak
}

fn catalog_counts(
    solved: &HashSet<ProblemKey>,
    attempted_unsolved: &HashMap<ProblemKey, AttemptInfo>,
    catalog_keys: &HashSet<ProblemKey>,
) -> CatalogCounts {
    let solved_in_catalog = solved.iter().filter(|k| catalog_keys.contains(*k)).count();
    let attempted_in_catalog = attempted_unsolved
        .keys()
        .filter(|k| catalog_keys.contains(*k))
        .count();
    CatalogCounts {
        solved_in_catalog,
        attempted_in_catalog,
        untouched_in_catalog: catalog_keys.len() - solved_in_catalog - attempted_in_catalog,
    }
}

// =============================================================================
// TESTS
// =============================================================================
