//! Forecast retry states.

use std::fmt;

/// Where the forecast step is in its retry sequence.
///
/// `Attempt(0)` is the baseline run with the configured namelist.
/// `Attempt(n)` for `n >= 1` runs with relaxation entry `n` applied.
/// `Fallback` runs from the preserved first guess, without assimilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryState {
    Attempt(usize),
    Fallback,
}

impl RetryState {
    pub const INITIAL: RetryState = RetryState::Attempt(0);

    /// State after a failed run, given a table of `table_len` entries.
    ///
    /// Returns `None` once the fallback run has failed too.
    pub fn on_failure(self, table_len: usize) -> Option<RetryState> {
        match self {
            RetryState::Attempt(n) if n < table_len => Some(RetryState::Attempt(n + 1)),
            RetryState::Attempt(_) => Some(RetryState::Fallback),
            RetryState::Fallback => None,
        }
    }

    /// Relaxation entry (numbered from 1) this state runs with.
    pub fn relaxation_entry(&self) -> Option<usize> {
        match self {
            RetryState::Attempt(n) if *n >= 1 => Some(*n),
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RetryState::Fallback)
    }
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryState::Attempt(0) => write!(f, "baseline"),
            RetryState::Attempt(n) => write!(f, "relaxation {n}"),
            RetryState::Fallback => write!(f, "fallback"),
        }
    }
}
