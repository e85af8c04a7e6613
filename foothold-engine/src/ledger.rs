//! Append-only, deduplicated submission ledger.
//!
//! Two fetch modes feed the ledger: a full replace (initial fetch) and an
//! incremental merge (refresh). Records are unique by `id`; re-merging a
//! batch that is already fully represented leaves the ledger unchanged.
//! Later merges are prepended ahead of older entries, so iteration sees
//! the most recent batch first. Nothing downstream may depend on that
//! order: the derived-state fold sorts chronologically (see `derived`).

use std::collections::HashSet;

use foothold_core::Submission;

/// Result of one incremental merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Records appended to the ledger.
    pub added: usize,
    /// Records dropped because their id was already present.
    pub duplicates: usize,
}

impl MergeOutcome {
    /// Whether the merge changed the ledger at all.
    pub fn is_noop(&self) -> bool {
        self.added == 0
    }
}

/// Ordered collection of submissions, unique by id.
#[derive(Debug, Clone, Default)]
pub struct SubmissionLedger {
    entries: Vec<Submission>,
    seen: HashSet<u64>,
}

impl SubmissionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate records in storage order (most recent batch first).
    pub fn iter(&self) -> impl Iterator<Item = &Submission> {
        self.entries.iter()
    }

    /// Whether a record with this id has been observed.
    pub fn contains(&self, id: u64) -> bool {
        self.seen.contains(&id)
    }

    /// Full-replace mode: discard everything and adopt `batch`.
    ///
    /// Duplicate ids within the batch keep their first occurrence.
    /// Returns the number of records adopted.
    pub fn replace(&mut self, batch: Vec<Submission>) -> usize {
        self.entries.clear();
        self.seen.clear();
        for submission in batch {
            if self.seen.insert(submission.id) {
                self.entries.push(submission);
            }
        }
        self.entries.len()
    }

    /// Incremental mode: prepend every record whose id is unseen.
    ///
    /// Records already present (and duplicate ids within the batch) are
    /// silently dropped. Merging an already-merged batch is a no-op.
    pub fn merge(&mut self, batch: Vec<Submission>) -> MergeOutcome {
        let mut fresh = Vec::new();
        let mut duplicates = 0;
        for submission in batch {
            if self.seen.insert(submission.id) {
                fresh.push(submission);
            } else {
                duplicates += 1;
            }
        }
        let added = fresh.len();
        fresh.append(&mut self.entries);
        self.entries = fresh;
        MergeOutcome { added, duplicates }
    }

    /// Discard every record.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use foothold_core::Verdict;

    fn submission(id: u64, index: &str, verdict: Verdict, created_at: i64) -> Submission {
        Submission {
            id,
            group_id: "4".to_string(),
            index: index.to_string(),
            verdict,
            created_at,
        }
    }

    #[test]
    fn test_replace_discards_prior_entries() {
        let mut ledger = SubmissionLedger::new();
        ledger.replace(vec![submission(1, "A", Verdict::Accepted, 10)]);
        ledger.replace(vec![submission(2, "B", Verdict::WrongAnswer, 20)]);

        assert_eq!(ledger.len(), 1);
        assert!(!ledger.contains(1));
        assert!(ledger.contains(2));
    }

    #[test]
    fn test_merge_drops_known_ids() {
        let mut ledger = SubmissionLedger::new();
        ledger.replace(vec![submission(1, "A", Verdict::Accepted, 10)]);

        let outcome = ledger.merge(vec![
            submission(1, "A", Verdict::Accepted, 10),
            submission(2, "B", Verdict::WrongAnswer, 20),
        ]);

        assert_eq!(outcome, MergeOutcome { added: 1, duplicates: 1 });
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_merging_same_batch_twice_is_noop() {
        let mut ledger = SubmissionLedger::new();
        let batch = vec![
            submission(1, "A", Verdict::Accepted, 10),
            submission(2, "B", Verdict::WrongAnswer, 20),
        ];
        ledger.merge(batch.clone());
        let before: Vec<u64> = ledger.iter().map(|s| s.id).collect();

        let outcome = ledger.merge(batch);
        assert!(outcome.is_noop());
        assert_eq!(outcome.duplicates, 2);
        let after: Vec<u64> = ledger.iter().map(|s| s.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_merge_prepends_newer_batch() {
        let mut ledger = SubmissionLedger::new();
        ledger.replace(vec![submission(1, "A", Verdict::WrongAnswer, 10)]);
        ledger.merge(vec![submission(2, "B", Verdict::Accepted, 20)]);

        let ids: Vec<u64> = ledger.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_duplicate_ids_within_batch_keep_first() {
        let mut ledger = SubmissionLedger::new();
        let outcome = ledger.merge(vec![
            submission(7, "A", Verdict::WrongAnswer, 10),
            submission(7, "A", Verdict::Accepted, 99),
        ]);

        assert_eq!(outcome, MergeOutcome { added: 1, duplicates: 1 });
        assert_eq!(ledger.iter().next().unwrap().verdict, Verdict::WrongAnswer);
    }

    #[test]
    fn test_clear_empties_ledger() {
        let mut ledger = SubmissionLedger::new();
        ledger.replace(vec![submission(1, "A", Verdict::Accepted, 10)]);
        ledger.clear();

        assert!(ledger.is_empty());
        assert!(!ledger.contains(1));
    }
}
