//! Read/write access to the escrow ledger.
//!
//! The matching core never holds payment or solver state of its own; everything is read fresh
//! from the ledger per matching attempt, and the single mutating operation (assigning a solver)
//! goes back through it. [`LedgerClient`] is the seam: the production implementation talks to the
//! escrow contracts over JSON-RPC ([`EvmLedger`]), and tests substitute their own.

use alloy_primitives::Address;
use async_trait::async_trait;
use mpg_common::Fiat;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    events::PaymentCreatedEvent,
    ledger_types::{ConversionError, Payment, PaymentId, Solver, TxConfirmation},
};

#[cfg(feature = "evm")]
mod evm;

#[cfg(feature = "evm")]
pub use evm::EvmLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Payment {0} does not exist on the ledger")]
    PaymentNotFound(PaymentId),
    #[error("Solver {0} is not registered")]
    SolverNotFound(Address),
    #[error("Could not initialize the ledger client. {0}")]
    InitializeError(String),
    #[error("Ledger read failed. {0}")]
    ReadError(String),
    #[error("Ledger write failed. {0}")]
    WriteError(String),
    #[error("Could not subscribe to ledger events. {0}")]
    SubscriptionError(String),
    #[error("The ledger returned a value this client cannot represent. {0}")]
    ConversionError(#[from] ConversionError),
}

/// This trait defines the behaviour the matching core needs from the authoritative ledger
/// (escrow contract plus solver registry).
///
/// All reads are point-in-time snapshots with no caching; callers that need consistency across
/// calls must tolerate the state moving underneath them. [`LedgerClient::assign_solver`] is the
/// only mutating call and is **not** idempotent: the ledger is expected to reject a second
/// assignment for an already-matched payment, and callers must still avoid double-submitting for
/// the same payment.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch the current on-chain record for the given payment.
    async fn get_payment(&self, id: PaymentId) -> Result<Payment, LedgerError>;

    /// Enumerate the addresses of all currently active solvers, in registry order. The order is
    /// stable between calls as long as the registry itself does not change.
    async fn get_active_solvers(&self) -> Result<Vec<Address>, LedgerError>;

    /// Fetch the registry record for the given solver.
    async fn get_solver(&self, address: Address) -> Result<Solver, LedgerError>;

    /// Whether the given solver is currently active.
    async fn is_active_solver(&self, address: Address) -> Result<bool, LedgerError>;

    /// True iff adding `amount` to the solver's current monthly volume stays within its cap. The
    /// ledger is authoritative here; clients never re-derive this from the solver record.
    async fn check_monthly_limit(&self, address: Address, amount: Fiat) -> Result<bool, LedgerError>;

    /// Assign `solver` to the given payment, transitioning it from `Pending` to `Matched`.
    /// Implementations must bound the wait for write confirmation with an explicit deadline.
    async fn assign_solver(&self, id: PaymentId, solver: Address) -> Result<TxConfirmation, LedgerError>;

    /// Subscribe to payment-creation notifications. Delivery is at-least-once with no ordering or
    /// de-duplication guarantees; consumers must treat re-delivery as routine.
    async fn subscribe_payment_created(&self) -> Result<mpsc::Receiver<PaymentCreatedEvent>, LedgerError>;
}
