//! JSON-RPC implementation of [`LedgerClient`] against the escrow contracts.

use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::*;
use mpg_common::{Fiat, Musd, Secret};
use tokio::sync::mpsc;

use crate::{
    events::{event_channel, PaymentCreatedEvent, DEFAULT_EVENT_BUFFER},
    ledger::{LedgerClient, LedgerError},
    ledger_types::{ConversionError, Payment, PaymentId, PaymentStatus, Region, Solver, SolverTier, TxConfirmation},
};

const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);

sol! {
    #[sol(rpc)]
    contract PaymentFactory {
        struct PaymentRecord {
            address payer;
            uint256 amountMusd;
            uint256 amountFiat;
            string merchantRef;
            string region;
            uint256 createdAt;
            uint256 expiresAt;
            address assignedSolver;
            uint8 status;
            string fiatTxnRef;
        }

        event PaymentCreated(
            bytes32 indexed paymentId,
            address indexed payer,
            uint256 amountMusd,
            uint256 amountFiat,
            string region,
            uint256 expiresAt
        );

        function getPayment(bytes32 paymentId) external view returns (PaymentRecord memory);
        function assignSolver(bytes32 paymentId, address solver) external;
    }

    #[sol(rpc)]
    contract SolverRegistry {
        struct SolverRecord {
            address solverAddress;
            uint256 stakedAmount;
            uint8 tier;
            uint256 totalVolume;
            uint256 successfulPayments;
            uint256 failedPayments;
            bool isActive;
            uint256 registeredAt;
            string region;
            uint256 feeBps;
            uint256 monthlyVolumeLimit;
            uint256 currentMonthVolume;
            uint256 monthStartTimestamp;
        }

        function getActiveSolvers() external view returns (address[] memory);
        function getSolver(address solver) external view returns (SolverRecord memory);
        function isActiveSolver(address solver) external view returns (bool);
        function checkMonthlyLimit(address solver, uint256 amountFiat) external view returns (bool);
    }
}

/// [`LedgerClient`] backed by the payment factory and solver registry contracts over JSON-RPC.
///
/// Reads are plain `eth_call`s. The assignment write is signed locally and the receipt wait is
/// bounded by a per-attempt timeout, so a stalled transaction surfaces as a
/// [`LedgerError::WriteError`] instead of hanging the matching attempt. Event subscription is a
/// polling log filter, which works against any HTTP endpoint.
#[derive(Clone)]
pub struct EvmLedger {
    provider: DynProvider,
    factory: Address,
    registry: Address,
    receipt_timeout: Duration,
}

impl EvmLedger {
    /// Connect to the given JSON-RPC endpoint, signing ledger writes with `signing_key`.
    pub async fn connect(
        rpc_url: &str,
        signing_key: &Secret<String>,
        factory: Address,
        registry: Address,
    ) -> Result<Self, LedgerError> {
        let signer: PrivateKeySigner = signing_key
            .reveal()
            .parse()
            .map_err(|e| LedgerError::InitializeError(format!("Invalid signing key: {e}")))?;
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(rpc_url)
            .await
            .map_err(|e| LedgerError::InitializeError(format!("Could not connect to {rpc_url}: {e}")))?
            .erased();
        Ok(Self { provider, factory, registry, receipt_timeout: DEFAULT_RECEIPT_TIMEOUT })
    }

    /// Replace the default per-attempt deadline for assignment receipts.
    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// Replace the provider's default interval for the log filter poller.
    pub fn with_poll_interval(self, interval: Duration) -> Self {
        self.provider.client().set_poll_interval(interval);
        self
    }

    /// The chain id reported by the RPC endpoint. Used at startup to catch a misconfigured
    /// endpoint before any matching happens.
    pub async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.provider.get_chain_id().await.map_err(|e| LedgerError::ReadError(format!("eth_chainId failed: {e}")))
    }
}

#[async_trait]
impl LedgerClient for EvmLedger {
    async fn get_payment(&self, id: PaymentId) -> Result<Payment, LedgerError> {
        let factory = PaymentFactory::new(self.factory, self.provider.clone());
        let record = factory
            .getPayment(id.0)
            .call()
            .await
            .map_err(|e| LedgerError::ReadError(format!("getPayment({}) failed: {e}", id.abbrev())))?;
        payment_from_record(id, record)
    }

    async fn get_active_solvers(&self) -> Result<Vec<Address>, LedgerError> {
        let registry = SolverRegistry::new(self.registry, self.provider.clone());
        registry
            .getActiveSolvers()
            .call()
            .await
            .map_err(|e| LedgerError::ReadError(format!("getActiveSolvers failed: {e}")))
    }

    async fn get_solver(&self, address: Address) -> Result<Solver, LedgerError> {
        let registry = SolverRegistry::new(self.registry, self.provider.clone());
        let record = registry
            .getSolver(address)
            .call()
            .await
            .map_err(|e| LedgerError::ReadError(format!("getSolver({address}) failed: {e}")))?;
        solver_from_record(address, record)
    }

    async fn is_active_solver(&self, address: Address) -> Result<bool, LedgerError> {
        let registry = SolverRegistry::new(self.registry, self.provider.clone());
        registry
            .isActiveSolver(address)
            .call()
            .await
            .map_err(|e| LedgerError::ReadError(format!("isActiveSolver({address}) failed: {e}")))
    }

    async fn check_monthly_limit(&self, address: Address, amount: Fiat) -> Result<bool, LedgerError> {
        let registry = SolverRegistry::new(self.registry, self.provider.clone());
        registry
            .checkMonthlyLimit(address, U256::from(amount.value()))
            .call()
            .await
            .map_err(|e| LedgerError::ReadError(format!("checkMonthlyLimit({address}) failed: {e}")))
    }

    async fn assign_solver(&self, id: PaymentId, solver: Address) -> Result<TxConfirmation, LedgerError> {
        let factory = PaymentFactory::new(self.factory, self.provider.clone());
        let pending = factory
            .assignSolver(id.0, solver)
            .send()
            .await
            .map_err(|e| LedgerError::WriteError(format!("Could not submit assignment for {}: {e}", id.abbrev())))?;
        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| {
                LedgerError::WriteError(format!("No confirmation for assignment of {}: {e}", id.abbrev()))
            })?;
        if !receipt.status() {
            return Err(LedgerError::WriteError(format!("Assignment transaction for {} reverted", id.abbrev())));
        }
        Ok(TxConfirmation {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
        })
    }

    async fn subscribe_payment_created(&self) -> Result<mpsc::Receiver<PaymentCreatedEvent>, LedgerError> {
        let factory = PaymentFactory::new(self.factory, self.provider.clone());
        let poller = factory
            .PaymentCreated_filter()
            .watch()
            .await
            .map_err(|e| LedgerError::SubscriptionError(format!("Could not install log filter: {e}")))?;
        let (producer, receiver) = event_channel(DEFAULT_EVENT_BUFFER);
        tokio::spawn(async move {
            let mut stream = poller.into_stream();
            while let Some(item) = stream.next().await {
                let raw = match item {
                    Ok((raw, _log)) => raw,
                    Err(e) => {
                        warn!("⛓️ Dropping undecodable PaymentCreated log: {e}");
                        continue;
                    },
                };
                match event_from_log(raw) {
                    Ok(event) => producer.publish_event(event).await,
                    Err(e) => warn!("⛓️ Dropping malformed PaymentCreated event: {e}"),
                }
            }
            info!("⛓️ PaymentCreated log stream closed");
        });
        Ok(receiver)
    }
}

fn event_from_log(raw: PaymentFactory::PaymentCreated) -> Result<PaymentCreatedEvent, LedgerError> {
    Ok(PaymentCreatedEvent {
        payment_id: PaymentId::from(raw.paymentId),
        payer: raw.payer,
        amount_musd: musd_from(raw.amountMusd)?,
        amount_fiat: fiat_from(raw.amountFiat)?,
        region: Region::from(raw.region),
        expires_at: datetime_from(raw.expiresAt),
    })
}

fn payment_from_record(id: PaymentId, record: PaymentFactory::PaymentRecord) -> Result<Payment, LedgerError> {
    // The contract hands back an all-zero record for unknown ids rather than reverting
    if record.createdAt.is_zero() {
        return Err(LedgerError::PaymentNotFound(id));
    }
    let status = PaymentStatus::try_from(record.status).map_err(LedgerError::from)?;
    Ok(Payment {
        id,
        payer: record.payer,
        amount_musd: musd_from(record.amountMusd)?,
        amount_fiat: fiat_from(record.amountFiat)?,
        merchant_ref: record.merchantRef,
        region: Region::from(record.region),
        created_at: datetime_from(record.createdAt),
        expires_at: datetime_from(record.expiresAt),
        assigned_solver: record.assignedSolver,
        status,
        fiat_txn_ref: record.fiatTxnRef,
    })
}

fn solver_from_record(address: Address, record: SolverRegistry::SolverRecord) -> Result<Solver, LedgerError> {
    if record.registeredAt.is_zero() {
        return Err(LedgerError::SolverNotFound(address));
    }
    let tier = SolverTier::try_from(record.tier).map_err(LedgerError::from)?;
    Ok(Solver {
        address,
        staked_amount: musd_from(record.stakedAmount)?,
        tier,
        total_volume: musd_from(record.totalVolume)?,
        successful_payments: counter_from(record.successfulPayments, "successfulPayments")?,
        failed_payments: counter_from(record.failedPayments, "failedPayments")?,
        is_active: record.isActive,
        registered_at: datetime_from(record.registeredAt),
        region: Region::from(record.region),
        fee_bps: counter_from(record.feeBps, "feeBps")?,
        monthly_volume_limit: fiat_from(record.monthlyVolumeLimit)?,
        current_month_volume: fiat_from(record.currentMonthVolume)?,
        month_start: datetime_from(record.monthStartTimestamp),
    })
}

fn musd_from(value: U256) -> Result<Musd, LedgerError> {
    u128::try_from(value)
        .map(Musd::from)
        .map_err(|_| ConversionError(format!("{value} overflows the settlement amount range")).into())
}

fn fiat_from(value: U256) -> Result<Fiat, LedgerError> {
    u64::try_from(value)
        .map(Fiat::from)
        .map_err(|_| ConversionError(format!("{value} overflows the fiat amount range")).into())
}

fn counter_from(value: U256, field: &str) -> Result<u64, LedgerError> {
    u64::try_from(value).map_err(|_| ConversionError(format!("{value} overflows {field}")).into())
}

/// Epoch seconds to a UTC timestamp. Values outside chrono's representable range clamp to the far
/// future, which reads as "never expires" downstream.
fn datetime_from(value: U256) -> DateTime<Utc> {
    i64::try_from(value)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
