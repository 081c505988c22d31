//! Label counts over a result table.

use crate::types::result::{Outcome, ResultTable};
use serde::Serialize;
use std::collections::BTreeMap;

/// Count of rows per predicted label. Both labels are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Summary {
    counts: BTreeMap<Outcome, usize>,
}

impl Summary {
    /// Summary with every label at zero.
    pub fn empty() -> Self {
        Self {
            counts: Outcome::ALL.iter().map(|&o| (o, 0)).collect(),
        }
    }

    pub fn get(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    /// Count by label string (`"Dropout"` / `"Graduate"`).
    pub fn get_label(&self, label: &str) -> Option<usize> {
        Outcome::ALL
            .iter()
            .find(|o| o.label() == label)
            .map(|&o| self.get(o))
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Share of rows with `outcome`, 0.0 for an empty summary.
    pub fn fraction(&self, outcome: Outcome) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.get(outcome) as f64 / total as f64
        }
    }

    /// `(label, count)` pairs in class-index order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counts.iter().map(|(o, &c)| (o.label(), c))
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::empty()
    }
}

/// Count every row of `table` exactly once by its predicted label.
pub fn summarize(table: &ResultTable) -> Summary {
    let mut summary = Summary::empty();
    for prediction in table.predictions() {
        *summary.counts.entry(prediction.outcome).or_insert(0) += 1;
    }
    summary
}
