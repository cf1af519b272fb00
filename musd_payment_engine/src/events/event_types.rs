use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use mpg_common::{Fiat, Musd};

use crate::ledger_types::{PaymentId, Region};

/// Notification that a new payment was created on the escrow contract.
///
/// Carries the notification payload so subscribers can log and triage without an extra ledger
/// read. This snapshot may already be stale by the time it is handled; anything acting on a
/// payment must re-read its state first.
#[derive(Debug, Clone)]
pub struct PaymentCreatedEvent {
    pub payment_id: PaymentId,
    pub payer: Address,
    pub amount_musd: Musd,
    pub amount_fiat: Fiat,
    pub region: Region,
    pub expires_at: DateTime<Utc>,
}
