use std::{fmt::Display, str::FromStr};

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use mpg_common::{Fiat, Musd};
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------      PaymentId      ---------------------------------------------------------
/// The 32-byte payment identifier assigned by the escrow contract at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub B256);

impl PaymentId {
    /// Abbreviated form for log lines, e.g. `0x1a2b3c4d…`.
    pub fn abbrev(&self) -> String {
        let hex = self.0.to_string();
        format!("{}…", &hex[..10])
    }
}

impl From<B256> for PaymentId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl FromStr for PaymentId {
    type Err = <B256 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s).map(Self)
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   ConversionError   ---------------------------------------------------------
#[derive(Debug, Clone, Error)]
#[error("Invalid ledger value. {0}")]
pub struct ConversionError(pub String);

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
/// Lifecycle state of a payment on the escrow contract.
///
/// Transitions are strictly forward. The matching core only ever drives `Pending` → `Matched`;
/// all other transitions belong to the payer, the solver, or the contract's expiry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Newly created. Settlement funds are escrowed and no solver has been assigned.
    Pending,
    /// A solver has been assigned.
    Matched,
    /// The assigned solver has started the fiat-side transfer.
    Processing,
    /// Proof of the fiat transfer was accepted and the solver has been reimbursed.
    Completed,
    /// Cancelled by the payer before a solver was assigned.
    Cancelled,
    /// The expiry timestamp passed without completion.
    Expired,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Matched => write!(f, "Matched"),
            PaymentStatus::Processing => write!(f, "Processing"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Cancelled => write!(f, "Cancelled"),
            PaymentStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl TryFrom<u8> for PaymentStatus {
    type Error = ConversionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Matched),
            2 => Ok(Self::Processing),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Cancelled),
            5 => Ok(Self::Expired),
            v => Err(ConversionError(format!("Unknown payment status: {v}"))),
        }
    }
}

//--------------------------------------     SolverTier      ---------------------------------------------------------
/// Stake-determined privilege level. Higher tiers carry larger monthly volume caps and different
/// fee schedules; the matching core reads the tier but never changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SolverTier {
    Free,
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl Display for SolverTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverTier::Free => write!(f, "Free"),
            SolverTier::Tier1 => write!(f, "Tier1"),
            SolverTier::Tier2 => write!(f, "Tier2"),
            SolverTier::Tier3 => write!(f, "Tier3"),
            SolverTier::Tier4 => write!(f, "Tier4"),
        }
    }
}

impl TryFrom<u8> for SolverTier {
    type Error = ConversionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Free),
            1 => Ok(Self::Tier1),
            2 => Ok(Self::Tier2),
            3 => Ok(Self::Tier3),
            4 => Ok(Self::Tier4),
            v => Err(ConversionError(format!("Unknown solver tier: {v}"))),
        }
    }
}

//--------------------------------------       Region        ---------------------------------------------------------
/// Categorical locality tag shared by payments and solvers ("Delhi", "Mumbai", …).
///
/// Region equality for matching purposes ignores case and surrounding whitespace; use
/// [`Region::matches`] rather than `==` when deciding locality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region(String);

impl Region {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &Region) -> bool {
        self.0.trim().eq_ignore_ascii_case(other.0.trim())
    }
}

impl<S: Into<String>> From<S> for Region {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
/// A payment request as recorded on the escrow contract. Immutable once created; only the ledger
/// mutates it, through the defined status transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// The account that locked settlement funds for this payment.
    pub payer: Address,
    /// Escrowed value in the settlement asset.
    pub amount_musd: Musd,
    /// The amount the solver must transfer on the fiat side.
    pub amount_fiat: Fiat,
    /// Opaque identifier of the fiat-side payee, e.g. a UPI VPA.
    pub merchant_ref: String,
    pub region: Region,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// `Address::ZERO` until a solver is assigned; fixed for the payment's lifetime afterwards.
    pub assigned_solver: Address,
    pub status: PaymentStatus,
    /// Fiat-side transaction reference. Empty until the solver submits proof.
    pub fiat_txn_ref: String,
}

impl Payment {
    pub fn is_assigned(&self) -> bool {
        self.assigned_solver != Address::ZERO
    }
}

//--------------------------------------       Solver        ---------------------------------------------------------
/// A registered liquidity provider as recorded on the solver registry. Read-only from the
/// matching core's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solver {
    pub address: Address,
    pub staked_amount: Musd,
    pub tier: SolverTier,
    /// Cumulative settlement-asset volume across all completed payments.
    pub total_volume: Musd,
    pub successful_payments: u64,
    pub failed_payments: u64,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
    pub region: Region,
    /// Service fee in basis points.
    pub fee_bps: u64,
    pub monthly_volume_limit: Fiat,
    pub current_month_volume: Fiat,
    pub month_start: DateTime<Utc>,
}

//--------------------------------------   TxConfirmation    ---------------------------------------------------------
/// Receipt details for a confirmed ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxConfirmation {
    pub tx_hash: B256,
    pub block_number: u64,
}

impl Display for TxConfirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx {} in block {}", self.tx_hash, self.block_number)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_id_abbreviation() {
        let id: PaymentId = "0x1a2b3c4daaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap();
        assert_eq!(id.abbrev(), "0x1a2b3c4d…");
    }

    #[test]
    fn status_and_tier_conversions() {
        assert_eq!(PaymentStatus::try_from(0).unwrap(), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::try_from(1).unwrap(), PaymentStatus::Matched);
        assert_eq!(PaymentStatus::try_from(5).unwrap(), PaymentStatus::Expired);
        assert!(PaymentStatus::try_from(6).is_err());
        assert_eq!(SolverTier::try_from(4).unwrap(), SolverTier::Tier4);
        assert!(SolverTier::try_from(5).is_err());
    }

    #[test]
    fn region_matching_is_case_and_whitespace_insensitive() {
        assert!(Region::from("Delhi").matches(&Region::from(" delhi ")));
        assert!(!Region::from("Delhi").matches(&Region::from("Mumbai")));
        assert_ne!(Region::from("Delhi"), Region::from("delhi"));
    }
}
