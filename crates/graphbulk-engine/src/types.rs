//! Core data model: batches, step tags and outcomes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Opaque payload fragment returned for an identifier.
pub type Payload = serde_json::Value;

/// Identifier -> ordered payload fragments.
pub type ResultMap = BTreeMap<String, Vec<Payload>>;

/// A non-empty group of identifiers submitted together as one batch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    identifiers: Vec<String>,
    attempt: u32,
}

impl Batch {
    /// Creates a first-attempt batch.
    #[must_use]
    pub fn new(identifiers: Vec<String>) -> Self {
        Self::retry(identifiers, 0)
    }

    /// Creates a batch carrying the still-pending identifiers of an earlier one.
    #[must_use]
    pub fn retry(identifiers: Vec<String>, attempt: u32) -> Self {
        debug_assert!(!identifiers.is_empty(), "batches are never empty");
        Self {
            identifiers,
            attempt,
        }
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Number of times this set of identifiers has been requeued.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// Correlates one request inside a batch with its response.
///
/// Unique within a batch only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(u32);

impl StepId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StepId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Terminal result for one identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The resource was fetched; fragments are kept in response order.
    Success(Vec<Payload>),
    /// The resource does not exist for this identifier.
    Empty,
    /// The identifier could not be fetched.
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Removes repeated identifiers, keeping the first occurrence of each.
///
/// Returns the distinct identifiers in input order and the number of
/// duplicates dropped.
#[must_use]
pub fn dedup_identifiers(identifiers: &[String]) -> (Vec<String>, usize) {
    let mut seen = HashSet::with_capacity(identifiers.len());
    let distinct: Vec<String> = identifiers
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();
    let duplicates = identifiers.len() - distinct.len();
    (distinct, duplicates)
}

/// Splits identifiers into batches of at most `batch_size`.
///
/// # Panics
///
/// Panics if `batch_size` is zero.
#[must_use]
pub fn partition(identifiers: &[String], batch_size: usize) -> Vec<Batch> {
    assert!(batch_size > 0, "batch_size must be > 0");
    identifiers
        .chunks(batch_size)
        .map(|chunk| Batch::new(chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_partition_even_split() {
        let batches = partition(&ids(&["a", "b", "c", "d"]), 2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].identifiers(), ids(&["a", "b"]).as_slice());
        assert_eq!(batches[1].identifiers(), ids(&["c", "d"]).as_slice());
    }

    #[test]
    fn test_partition_remainder() {
        let batches = partition(&ids(&["a", "b", "c", "d", "e"]), 2);
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(batches.iter().all(|b| b.attempt() == 0));
    }

    #[test]
    fn test_partition_empty_input() {
        assert!(partition(&[], 20).is_empty());
    }

    #[test]
    fn test_partition_batch_larger_than_input() {
        let batches = partition(&ids(&["a", "b"]), 20);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let (distinct, duplicates) = dedup_identifiers(&ids(&["b", "a", "b", "c", "a"]));
        assert_eq!(distinct, ids(&["b", "a", "c"]));
        assert_eq!(duplicates, 2);
    }

    #[test]
    fn test_retry_batch_carries_attempt() {
        let batch = Batch::retry(ids(&["x"]), 3);
        assert_eq!(batch.attempt(), 3);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_step_id_round_trip_through_string() {
        let step = StepId::new(7);
        assert_eq!(step.to_string(), "7");
        assert_eq!("7".parse::<StepId>().unwrap(), step);
        assert!("seven".parse::<StepId>().is_err());
    }
}
