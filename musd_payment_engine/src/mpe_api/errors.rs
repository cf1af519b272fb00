use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{ledger::LedgerError, ledger_types::PaymentStatus};

/// Expected, non-fatal reasons a matching attempt ends without an assignment. These are outcomes,
/// not failures: the payment simply stays pending and a later trigger may succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoMatchReason {
    #[error("payment status is {0}, not Pending")]
    PaymentNotPending(PaymentStatus),
    #[error("payment is already assigned to solver {0}")]
    AlreadyAssigned(Address),
    #[error("payment expires at {expires_at}, inside the matching grace period")]
    ExpiringSoon { expires_at: DateTime<Utc> },
    #[error("no solvers are currently active")]
    NoActiveSolvers,
    #[error("every active solver was excluded by the eligibility checks")]
    NoEligibleSolvers,
}

#[derive(Debug, Error)]
pub enum MatchingError {
    /// A ledger read failed. Reads are never retried; the attempt is abandoned and the payment
    /// stays pending.
    #[error("Ledger error during matching. {0}")]
    Ledger(#[from] LedgerError),
    /// The assignment write failed on every attempt of the retry budget. The payment stays
    /// pending and unassigned, so a later trigger can safely try again.
    #[error("Could not commit the assignment after {attempts} attempts. {source}")]
    AssignmentFailed { attempts: u32, source: LedgerError },
}
