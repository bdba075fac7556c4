//! Per-request bookkeeping between admission and settlement.

use super::{aggregator::Aggregator, window::AdmissionPermit};
use core::time::Duration;
use memberflow_core::{CreateRequest, Error, Member, Result};
use std::sync::Arc;
use tokio::time::Instant;

/// Lifecycle of one admitted request. Transitions only move forward:
/// `Admitted -> Dispatched -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightState {
    Admitted,
    Dispatched,
    Completed,
    Failed,
}

impl FlightState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightRecord {
    pub uid: String,
    pub sequence: u64,
    pub admitted_at: Instant,
    pub state: FlightState,
}

/// The outcome of one flight, handed to the [`Aggregator`].
#[derive(Debug)]
pub struct Settlement {
    pub record: FlightRecord,
    pub outcome: Result<Member>,
    /// Time from admission to settlement.
    pub elapsed: Duration,
}

/// Owns an admitted request, its admission slot and its record until
/// settlement.
///
/// A flight that is dropped before settling (its job was refused, cancelled or
/// panicked) settles itself as failed, so every admitted request is counted
/// exactly once.
#[derive(Debug)]
pub struct Flight {
    record: FlightRecord,
    request: Option<CreateRequest>,
    aggregator: Arc<Aggregator>,
    permit: Option<AdmissionPermit>,
}

impl Flight {
    pub(crate) fn admit(
        request: CreateRequest,
        permit: AdmissionPermit,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            record: FlightRecord {
                uid: request.uid.clone(),
                sequence: request.sequence,
                admitted_at: Instant::now(),
                state: FlightState::Admitted,
            },
            request: Some(request),
            aggregator,
            permit: Some(permit),
        }
    }

    pub fn record(&self) -> &FlightRecord {
        &self.record
    }

    /// Hands out the request for its persistence call.
    ///
    /// Returns `None` if the flight was already dispatched, so a request can
    /// never be sent twice.
    pub fn dispatch(&mut self) -> Option<CreateRequest> {
        if self.record.state != FlightState::Admitted {
            return None;
        }
        self.record.state = FlightState::Dispatched;
        self.request.take()
    }

    /// Settles the flight with the collaborator's result and frees its slot.
    pub fn settle(mut self, outcome: Result<Member>) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Result<Member>) {
        if self.record.state.is_terminal() {
            return;
        }
        self.record.state = if outcome.is_ok() {
            FlightState::Completed
        } else {
            FlightState::Failed
        };
        // Free the slot before the settlement can wake a drain waiter, so a
        // drained run never reports work in flight.
        drop(self.permit.take());
        self.aggregator.on_settled(Settlement {
            record: self.record.clone(),
            outcome,
            elapsed: self.record.admitted_at.elapsed(),
        });
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        if !self.record.state.is_terminal() {
            let uid = self.record.uid.clone();
            self.finish(Err(Error::persistence(uid, "abandoned before settlement")));
        }
    }
}
