//! Relaxation table for forecast retries.

use crate::config::{DEFAULT_RELAXATION_RATIOS, DEFAULT_RELAXATION_TIME_STEPS};

/// One set of time-stepping parameters tried after a forecast failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaxationEntry {
    /// Outer domain time step, in seconds.
    pub time_step: i64,
    /// `parent_time_step_ratio` list, one value per domain.
    pub parent_time_step_ratio: Vec<i64>,
}

/// Ordered relaxation entries, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaxationTable {
    entries: Vec<RelaxationEntry>,
}

impl RelaxationTable {
    /// Creates a table from entries in the order they are tried.
    pub fn new(entries: Vec<RelaxationEntry>) -> Self {
        Self { entries }
    }

    /// Builds a table from parallel lists of time steps and ratios.
    ///
    /// Returns `None` when the lists differ in length.
    pub fn from_columns(time_steps: &[i64], ratios: &[Vec<i64>]) -> Option<Self> {
        if time_steps.len() != ratios.len() {
            return None;
        }
        let entries = time_steps
            .iter()
            .zip(ratios)
            .map(|(&time_step, ratio)| RelaxationEntry {
                time_step,
                parent_time_step_ratio: ratio.clone(),
            })
            .collect();
        Some(Self { entries })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry `n`, counting from 1.
    pub fn entry(&self, n: usize) -> Option<&RelaxationEntry> {
        n.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn entries(&self) -> &[RelaxationEntry] {
        &self.entries
    }
}

impl Default for RelaxationTable {
    fn default() -> Self {
        let entries = DEFAULT_RELAXATION_TIME_STEPS
            .iter()
            .zip(DEFAULT_RELAXATION_RATIOS.iter())
            .map(|(&time_step, ratio)| RelaxationEntry {
                time_step,
                parent_time_step_ratio: ratio.to_vec(),
            })
            .collect();
        Self { entries }
    }
}
