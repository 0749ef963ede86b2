//! Result aggregation.
//!
//! The aggregator owns every recorded outcome. Workers only reach it
//! through [`ResultAggregator::record`], which enforces that each
//! identifier gets at most one terminal outcome.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::error;

use crate::metrics::FetchStats;
use crate::types::{Outcome, ResultMap};
use crate::{FetchError, FetchResult};

/// Aggregated result of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Payload fragments per successfully fetched identifier.
    pub results: ResultMap,
    /// Identifiers whose resource does not exist.
    pub empty: BTreeSet<String>,
    /// Identifiers that failed, with the reason.
    pub failed: BTreeMap<String, String>,
    /// Identifiers with no terminal outcome (only non-empty after an abort).
    pub unresolved: Vec<String>,
    /// Run counters.
    pub stats: FetchStats,
}

impl FetchReport {
    /// Number of identifiers that reached a terminal outcome.
    pub fn completed(&self) -> usize {
        self.results.len() + self.empty.len() + self.failed.len()
    }

    /// Number of distinct identifiers in the run.
    pub fn total(&self) -> usize {
        self.completed() + self.unresolved.len()
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[derive(Debug)]
struct AggregatorInner {
    /// Run identifiers in input order.
    expected: Vec<String>,
    members: HashSet<String>,
    outcomes: HashMap<String, Outcome>,
}

/// Owner of the per-identifier outcomes.
#[derive(Debug)]
pub struct ResultAggregator {
    inner: Mutex<AggregatorInner>,
}

impl ResultAggregator {
    /// Creates an aggregator for the given distinct identifiers.
    #[must_use]
    pub fn new(identifiers: Vec<String>) -> Self {
        let capacity = identifiers.len();
        let members = identifiers.iter().cloned().collect();
        Self {
            inner: Mutex::new(AggregatorInner {
                expected: identifiers,
                members,
                outcomes: HashMap::with_capacity(capacity),
            }),
        }
    }

    /// Records the terminal outcome of an identifier.
    ///
    /// Fails if the identifier already has an outcome or is not part of the
    /// run; both indicate a bookkeeping bug in the caller.
    pub fn record(&self, identifier: &str, outcome: Outcome) -> FetchResult<()> {
        let mut inner = self.inner.lock();
        if inner.outcomes.contains_key(identifier) {
            error!("Duplicate outcome for identifier {}", identifier);
            return Err(FetchError::AlreadyTerminal(identifier.to_string()));
        }
        if !inner.members.contains(identifier) {
            return Err(FetchError::UnknownIdentifier(identifier.to_string()));
        }
        inner.outcomes.insert(identifier.to_string(), outcome);
        Ok(())
    }

    pub fn is_terminal(&self, identifier: &str) -> bool {
        self.inner.lock().outcomes.contains_key(identifier)
    }

    pub fn terminal_count(&self) -> usize {
        self.inner.lock().outcomes.len()
    }

    /// Builds the report from the outcomes recorded so far.
    #[must_use]
    pub fn report(&self, stats: FetchStats) -> FetchReport {
        let inner = self.inner.lock();
        let mut report = FetchReport {
            stats,
            ..FetchReport::default()
        };

        for identifier in &inner.expected {
            match inner.outcomes.get(identifier) {
                Some(Outcome::Success(fragments)) => {
                    report
                        .results
                        .entry(identifier.clone())
                        .or_default()
                        .extend(fragments.iter().cloned());
                }
                Some(Outcome::Empty) => {
                    report.empty.insert(identifier.clone());
                }
                Some(Outcome::Failed(reason)) => {
                    report.failed.insert(identifier.clone(), reason.clone());
                }
                None => report.unresolved.push(identifier.clone()),
            }
        }

        report
    }
}
