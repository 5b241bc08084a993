//! Worker lifecycle states.

use paylater_core::Error;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Lifecycle of one worker (one cache generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, install not yet dispatched (or a failed install rolled back).
    Uninitialized,
    /// Install event running: manifest being fetched and stored.
    Installing,
    /// Precache complete, waiting to activate.
    Installed,
    /// Activate event running: stale stores being deleted.
    Activating,
    /// Controlling requests.
    Active,
    /// Replaced by a newer generation.
    Redundant,
}

impl WorkerState {
    /// Only an active worker answers fetch events.
    pub fn can_intercept(self) -> bool {
        matches!(self, WorkerState::Active)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Redundant)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Uninitialized, Installing)
                | (Installing, Installed)
                | (Installing, Uninitialized)
                | (Installed, Activating)
                | (Activating, Active)
                | (Activating, Installed)
                | (_, Redundant)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Uninitialized => "uninitialized",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Shared, checked holder for a worker's state.
#[derive(Debug)]
pub(crate) struct StateCell(RwLock<WorkerState>);

impl StateCell {
    pub(crate) fn new(state: WorkerState) -> Self {
        Self(RwLock::new(state))
    }

    pub(crate) fn get(&self) -> WorkerState {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move from `expected` to `next`, failing if the worker is elsewhere.
    pub(crate) fn advance(&self, expected: WorkerState, next: WorkerState) -> Result<(), Error> {
        let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if *state != expected || !state.can_transition_to(next) {
            return Err(Error::InvalidState { expected: expected.to_string(), actual: state.to_string() });
        }
        *state = next;
        Ok(())
    }

    /// Roll back or retire without checking the current state.
    pub(crate) fn force(&self, next: WorkerState) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}
