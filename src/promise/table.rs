//! The promise table: promise state plus the callers parked on each promise.
//!
//! Waiters are stored inside the `Pending` state, so a completed promise has
//! no waiter list at all. Completing a promise hands the drained waiters back
//! to the caller in the order they were parked.
//!
//! The table is generic over the waiter token so it carries no channel or
//! runtime types; the coordinator instantiates it with reply senders.

use crate::error::{ComputationFailure, CoordinatorError, CoordinatorResult};
use crate::types::PromiseId;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// Final result of a computation as stored in a completed promise.
pub type Outcome = Result<Value, ComputationFailure>;

#[derive(Debug)]
pub enum PromiseState<W> {
    Pending { waiters: VecDeque<W> },
    Completed(Outcome),
}

impl<W> PromiseState<W> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// What happened to an await request.
#[derive(Debug)]
pub enum AwaitDisposition<W> {
    /// The promise was already completed; the waiter is handed back so the
    /// caller can be answered right away.
    Ready { outcome: Outcome, waiter: W },
    /// The waiter was parked; `position` is its zero-based slot in the queue.
    Parked { position: usize },
}

/// An await that could not be accepted; the waiter is returned untouched.
#[derive(Debug)]
pub struct Rejected<W> {
    pub error: CoordinatorError,
    pub waiter: W,
}

/// Snapshot of table occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Promises ever allocated, including released ones.
    pub allocated: u64,
    pub pending: usize,
    pub completed: usize,
    /// Parked waiters across all pending promises.
    pub waiters: usize,
}

#[derive(Debug)]
pub struct PromiseTable<W> {
    promises: HashMap<PromiseId, PromiseState<W>>,
    next_promise_id: u64,
}

impl<W> Default for PromiseTable<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> PromiseTable<W> {
    pub fn new() -> Self {
        Self {
            promises: HashMap::new(),
            next_promise_id: 1,
        }
    }

    /// Allocate a fresh pending promise with no waiters.
    pub fn allocate(&mut self) -> PromiseId {
        let id = PromiseId::new(self.next_promise_id);
        self.next_promise_id += 1;
        self.promises.insert(
            id,
            PromiseState::Pending {
                waiters: VecDeque::new(),
            },
        );
        id
    }

    /// Answer immediately if `id` is completed, otherwise park `waiter`.
    pub fn await_or_park(
        &mut self,
        id: PromiseId,
        waiter: W,
    ) -> Result<AwaitDisposition<W>, Rejected<W>> {
        match self.promises.get_mut(&id) {
            None => Err(Rejected {
                error: CoordinatorError::UnknownPromise(id),
                waiter,
            }),
            Some(PromiseState::Completed(outcome)) => Ok(AwaitDisposition::Ready {
                outcome: outcome.clone(),
                waiter,
            }),
            Some(PromiseState::Pending { waiters }) => {
                waiters.push_back(waiter);
                Ok(AwaitDisposition::Parked {
                    position: waiters.len() - 1,
                })
            }
        }
    }

    /// Transition `id` to completed and return its waiters, oldest first.
    ///
    /// A completed promise is never touched again: a second completion is
    /// rejected and the stored outcome stays as it was.
    pub fn complete(&mut self, id: PromiseId, outcome: Outcome) -> CoordinatorResult<Vec<W>> {
        let state = self
            .promises
            .get_mut(&id)
            .ok_or(CoordinatorError::UnknownPromise(id))?;

        match state {
            PromiseState::Completed(_) => Err(CoordinatorError::DoubleCompletion(id)),
            PromiseState::Pending { waiters } => {
                let drained: Vec<W> = waiters.drain(..).collect();
                *state = PromiseState::Completed(outcome);
                Ok(drained)
            }
        }
    }

    /// Drop a completed promise from the table.
    pub fn release(&mut self, id: PromiseId) -> CoordinatorResult<Outcome> {
        match self.promises.get(&id) {
            None => Err(CoordinatorError::UnknownPromise(id)),
            Some(PromiseState::Pending { .. }) => Err(CoordinatorError::PromiseStillPending(id)),
            Some(PromiseState::Completed(_)) => match self.promises.remove(&id) {
                Some(PromiseState::Completed(outcome)) => Ok(outcome),
                _ => Err(CoordinatorError::UnknownPromise(id)),
            },
        }
    }

    pub fn state(&self, id: PromiseId) -> Option<&PromiseState<W>> {
        self.promises.get(&id)
    }

    pub fn len(&self) -> usize {
        self.promises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.promises.is_empty()
    }

    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            allocated: self.next_promise_id - 1,
            ..Default::default()
        };

        for state in self.promises.values() {
            match state {
                PromiseState::Pending { waiters } => {
                    stats.pending += 1;
                    stats.waiters += waiters.len();
                }
                PromiseState::Completed(_) => stats.completed += 1,
            }
        }

        stats
    }
}
