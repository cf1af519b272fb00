//! Test doubles and fixtures for exercising the matching pipeline without a chain.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mpg_common::{Fiat, Musd};
use tokio::sync::{mpsc, Mutex};

use crate::{
    events::{PaymentCreatedEvent, DEFAULT_EVENT_BUFFER},
    ledger::{LedgerClient, LedgerError},
    ledger_types::{Payment, PaymentId, PaymentStatus, Region, Solver, SolverTier, TxConfirmation},
};

/// Initialise logging for tests. Safe to call from every test; only the first call wins.
pub fn init_test_logger() {
    let _ = dotenvy::dotenv();
    let _ = env_logger::try_init();
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn fresh_payment_id() -> PaymentId {
    let n = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    PaymentId::from(B256::from(bytes))
}

/// A pending, unassigned payment with a fresh unique id.
pub fn sample_payment(region: &str, amount_fiat: u64, expires_at: DateTime<Utc>) -> Payment {
    Payment {
        id: fresh_payment_id(),
        payer: Address::repeat_byte(0xfe),
        amount_musd: Musd::from_musd(12),
        amount_fiat: Fiat::from(amount_fiat),
        merchant_ref: "merchant@upi".to_string(),
        region: Region::from(region),
        created_at: expires_at - Duration::hours(1),
        expires_at,
        assigned_solver: Address::ZERO,
        status: PaymentStatus::Pending,
        fiat_txn_ref: String::new(),
    }
}

/// An active solver with a generous monthly cap. `volume_musd` is the lifetime volume in whole
/// mUSD.
pub fn sample_solver(
    address: Address,
    region: &str,
    successful: u64,
    failed: u64,
    fee_bps: u64,
    volume_musd: u64,
) -> Solver {
    Solver {
        address,
        staked_amount: Musd::from_musd(500),
        tier: SolverTier::Tier2,
        total_volume: Musd::from_musd(volume_musd),
        successful_payments: successful,
        failed_payments: failed,
        is_active: true,
        registered_at: Utc::now() - Duration::days(30),
        region: Region::from(region),
        fee_bps,
        monthly_volume_limit: Fiat::from(1_000_000),
        current_month_volume: Fiat::from(0),
        month_start: Utc::now() - Duration::days(10),
    }
}

#[derive(Default)]
struct MemoryLedgerState {
    payments: HashMap<PaymentId, Payment>,
    solvers: Vec<Solver>,
    write_attempts: u32,
    scripted_write_failures: u32,
    subscribers: Vec<mpsc::Sender<PaymentCreatedEvent>>,
}

/// In-memory [`LedgerClient`]. Mimics the escrow contract's behaviour closely enough for the
/// matching pipeline: registry enumeration order is stable, the monthly-limit rule is
/// `current + amount <= limit`, and a second assignment for a payment is rejected. Writes can be
/// scripted to fail a fixed number of times to drive the retry paths.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryLedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_payment(&self, payment: Payment) {
        self.state.lock().await.payments.insert(payment.id, payment);
    }

    pub async fn add_solver(&self, solver: Solver) {
        self.state.lock().await.solvers.push(solver);
    }

    pub async fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.state.lock().await.payments.get(&id).cloned()
    }

    /// Make the next `n` assignment submissions fail with a write error.
    pub async fn fail_next_writes(&self, n: u32) {
        self.state.lock().await.scripted_write_failures = n;
    }

    /// Total number of assignment submissions seen, including scripted failures.
    pub async fn write_attempts(&self) -> u32 {
        self.state.lock().await.write_attempts
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }

    /// Deliver a payment-created notification to every subscriber.
    pub async fn announce_payment(&self, payment: &Payment) {
        let event = PaymentCreatedEvent {
            payment_id: payment.id,
            payer: payment.payer,
            amount_musd: payment.amount_musd,
            amount_fiat: payment.amount_fiat,
            region: payment.region.clone(),
            expires_at: payment.expires_at,
        };
        let senders = self.state.lock().await.subscribers.clone();
        for sender in senders {
            let _ = sender.send(event.clone()).await;
        }
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_payment(&self, id: PaymentId) -> Result<Payment, LedgerError> {
        self.state.lock().await.payments.get(&id).cloned().ok_or(LedgerError::PaymentNotFound(id))
    }

    async fn get_active_solvers(&self) -> Result<Vec<Address>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.solvers.iter().filter(|s| s.is_active).map(|s| s.address).collect())
    }

    async fn get_solver(&self, address: Address) -> Result<Solver, LedgerError> {
        let state = self.state.lock().await;
        state.solvers.iter().find(|s| s.address == address).cloned().ok_or(LedgerError::SolverNotFound(address))
    }

    async fn is_active_solver(&self, address: Address) -> Result<bool, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.solvers.iter().any(|s| s.address == address && s.is_active))
    }

    async fn check_monthly_limit(&self, address: Address, amount: Fiat) -> Result<bool, LedgerError> {
        let solver = self.get_solver(address).await?;
        Ok(solver.current_month_volume.saturating_add(amount) <= solver.monthly_volume_limit)
    }

    async fn assign_solver(&self, id: PaymentId, solver: Address) -> Result<TxConfirmation, LedgerError> {
        let mut state = self.state.lock().await;
        state.write_attempts += 1;
        if state.scripted_write_failures > 0 {
            state.scripted_write_failures -= 1;
            return Err(LedgerError::WriteError("scripted failure".to_string()));
        }
        let block_number = u64::from(state.write_attempts);
        let payment = state.payments.get_mut(&id).ok_or(LedgerError::PaymentNotFound(id))?;
        // The contract's single-assignment guard.
        if payment.status != PaymentStatus::Pending || payment.is_assigned() {
            return Err(LedgerError::WriteError(format!("payment {} is not assignable", id.abbrev())));
        }
        payment.status = PaymentStatus::Matched;
        payment.assigned_solver = solver;
        Ok(TxConfirmation { tx_hash: B256::repeat_byte(0xcc), block_number })
    }

    async fn subscribe_payment_created(&self) -> Result<mpsc::Receiver<PaymentCreatedEvent>, LedgerError> {
        let (sender, receiver) = mpsc::channel(DEFAULT_EVENT_BUFFER);
        self.state.lock().await.subscribers.push(sender);
        Ok(receiver)
    }
}
