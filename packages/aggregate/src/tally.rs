//! Frequency counter that remembers first-seen order.

use std::collections::{BTreeMap, HashMap};

use incident_etl_models::LocationCount;

/// Counts occurrences of string labels.
///
/// Ranking is stable: labels with equal counts keep the order in which they
/// were first seen.
#[derive(Debug, Default, Clone)]
pub struct Tally {
    counts: HashMap<String, u64>,
    order: Vec<String>,
}

impl Tally {
    /// Creates an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one occurrence of `label`.
    pub fn add(&mut self, label: String) {
        if let Some(count) = self.counts.get_mut(&label) {
            *count += 1;
        } else {
            self.order.push(label.clone());
            self.counts.insert(label, 1);
        }
    }

    /// Number of occurrences of `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or_default()
    }

    /// The `n` most frequent labels, most frequent first.
    #[must_use]
    pub fn most_common(&self, n: usize) -> Vec<LocationCount> {
        let mut ranked: Vec<LocationCount> = self
            .order
            .iter()
            .map(|label| LocationCount(label.clone(), self.get(label)))
            .collect();
        ranked.sort_by(|a, b| b.count().cmp(&a.count()));
        ranked.truncate(n);
        ranked
    }

    /// Label → count mapping.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, u64> {
        self.counts.into_iter().collect()
    }
}
