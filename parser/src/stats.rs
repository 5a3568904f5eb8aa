use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::DataQualityIssue;

/// Per-kind count of the data-quality issues seen by one stage.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IssueTally {
    counts: BTreeMap<&'static str, usize>,
}

impl IssueTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs the issue and counts it. Missing identities are expected while
    /// players connect, so they only show up at debug level.
    pub fn record(&mut self, issue: DataQualityIssue) {
        match &issue {
            DataQualityIssue::UnresolvedIdentity { .. } => debug!("{issue}, skipping"),
            _ => warn!("{issue}"),
        }
        self.tally(&issue);
    }

    /// Counts an issue that has already been logged.
    pub fn tally(&mut self, issue: &DataQualityIssue) {
        *self.counts.entry(issue.kind()).or_default() += 1;
    }

    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn merge(&mut self, other: &IssueTally) {
        for (kind, count) in &other.counts {
            *self.counts.entry(*kind).or_default() += *count;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counts.iter().map(|(kind, count)| (*kind, *count))
    }
}

/// Summary of one extraction run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExtractionStats {
    pub total_records: usize,
    pub schema_records: usize,
    pub message_records: usize,
    /// Distinct ticks present in the result
    pub ticks: usize,
    /// (tick, identity) snapshots written
    pub snapshots: usize,
    pub issues: IssueTally,
}
