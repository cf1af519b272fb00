//! mUSD Payment Engine
//!
//! The mUSD payment engine is the matching and settlement coordination core of the mUSD payment
//! gateway: it pairs crypto-backed fiat payment requests with the liquidity provider ("solver")
//! best placed to carry out the real-world bank transfer, and commits that assignment to the
//! escrow ledger. This library contains all of the core logic and is transport-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Ledger access ([`LedgerClient`]). The ledger (an escrow contract plus a solver registry)
//!    is the only source of truth; the engine holds no state of its own. [`EvmLedger`] is the
//!    production implementation over JSON-RPC, and anything implementing the trait can stand in
//!    for it in tests.
//! 2. The matching pipeline ([`MatchingApi`]). Admission checks, the weighted scoring heuristic,
//!    winner selection and the retried assignment write.
//! 3. Event-driven dispatch ([`PaymentWatcher`]). Subscribes to payment-creation notifications
//!    and fans each one out into an isolated matching attempt, with de-duplication of in-flight
//!    payments and a cap on concurrency.

pub mod events;
mod ledger;
pub mod ledger_types;
mod mpe_api;
mod watcher;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "evm")]
pub use ledger::EvmLedger;
pub use ledger::{LedgerClient, LedgerError};
pub use mpe_api::{
    eligibility::{payment_match_barrier, solver_is_eligible, EXPIRY_GRACE_PERIOD},
    errors::{MatchingError, NoMatchReason},
    matching_api::{MatchOutcome, MatchingApi},
    scoring::{score, EXCLUDED_SCORE},
};
pub use watcher::{PaymentWatcher, DEFAULT_MAX_CONCURRENT_MATCHES};
