//! Event-driven dispatch of matching attempts.

use std::{collections::HashSet, sync::Arc};

use log::*;
use tokio::sync::{Mutex, Semaphore};

use crate::{
    ledger::LedgerClient,
    ledger_types::PaymentId,
    mpe_api::{
        errors::MatchingError,
        matching_api::{MatchOutcome, MatchingApi},
    },
};

/// Default cap on simultaneous matching attempts.
pub const DEFAULT_MAX_CONCURRENT_MATCHES: usize = 8;

/// Subscribes to payment-created notifications and launches one matching attempt per event.
///
/// Attempts run concurrently and independently, capped by a semaphore so a burst of payments
/// cannot stampede the ledger. Duplicate notifications for a payment whose attempt is still in
/// flight are dropped; re-delivery *after* an attempt completes is absorbed by the matcher's
/// payment-level admission check, since the payment is no longer pending. A failing attempt is
/// logged and never takes down the subscription.
pub struct PaymentWatcher<L> {
    api: Arc<MatchingApi<L>>,
    in_flight: Arc<Mutex<HashSet<PaymentId>>>,
    permits: Arc<Semaphore>,
}

impl<L> PaymentWatcher<L>
where L: LedgerClient + 'static
{
    pub fn new(api: MatchingApi<L>, max_concurrent: usize) -> Self {
        Self {
            api: Arc::new(api),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Run the watcher until the ledger's event channel closes. Subscribes exactly once; callers
    /// wanting a fresh subscription construct a fresh watcher.
    pub async fn run(self) -> Result<(), MatchingError> {
        let mut events = self.api.ledger().subscribe_payment_created().await?;
        info!("👀️ Watching for new payments");
        while let Some(event) = events.recv().await {
            let id = event.payment_id;
            info!(
                "👀️ New payment {}: {} ({}) in {}, expires {}",
                id.abbrev(),
                event.amount_fiat,
                event.amount_musd,
                event.region,
                event.expires_at
            );
            if !self.in_flight.lock().await.insert(id) {
                debug!("👀️ Payment {} is already being matched. Dropping duplicate notification.", id.abbrev());
                continue;
            }
            let api = Arc::clone(&self.api);
            let in_flight = Arc::clone(&self.in_flight);
            let permits = Arc::clone(&self.permits);
            tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    // the semaphore is never closed while the watcher lives
                    Err(_) => return,
                };
                match api.match_payment_to_solver(id).await {
                    Ok(MatchOutcome::Matched { solver, score, .. }) => {
                        info!("👀️ Payment {} matched to {solver} (score {score:.2})", id.abbrev());
                    },
                    Ok(MatchOutcome::NoMatch(reason)) => {
                        warn!("👀️ Payment {} was not matched: {reason}", id.abbrev());
                    },
                    Err(e) => {
                        error!("👀️ Matching attempt for payment {} failed: {e}", id.abbrev());
                    },
                }
                in_flight.lock().await.remove(&id);
            });
        }
        info!("👀️ Payment event channel closed. Watcher shutting down.");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use alloy_primitives::Address;
    use chrono::{Duration, Utc};
    use tokio::time::sleep;

    use super::*;
    use crate::{
        ledger_types::PaymentStatus,
        test_utils::{init_test_logger, sample_payment, sample_solver, MemoryLedger},
    };

    async fn wait_until<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if condition().await {
                return;
            }
            sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn duplicate_notifications_result_in_a_single_assignment() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        let payment = sample_payment("Delhi", 1000, Utc::now() + Duration::hours(1));
        let id = payment.id;
        ledger.add_payment(payment.clone()).await;
        ledger.add_solver(sample_solver(Address::repeat_byte(0x01), "Delhi", 9, 1, 75, 500_000)).await;
        let watcher = PaymentWatcher::new(MatchingApi::new(ledger.clone()), DEFAULT_MAX_CONCURRENT_MATCHES);
        tokio::spawn(watcher.run());
        wait_until(|| {
            let ledger = ledger.clone();
            async move { ledger.subscriber_count().await > 0 }
        })
        .await;
        // At-least-once delivery: the same payment announced three times.
        ledger.announce_payment(&payment).await;
        ledger.announce_payment(&payment).await;
        ledger.announce_payment(&payment).await;
        wait_until(|| {
            let ledger = ledger.clone();
            async move { ledger.payment(id).await.map(|p| p.status == PaymentStatus::Matched).unwrap_or(false) }
        })
        .await;
        assert_eq!(ledger.write_attempts().await, 1);
    }

    #[tokio::test]
    async fn one_failing_attempt_does_not_stall_the_watcher() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        ledger.add_solver(sample_solver(Address::repeat_byte(0x01), "Delhi", 9, 1, 75, 500_000)).await;
        let good = sample_payment("Delhi", 1000, Utc::now() + Duration::hours(1));
        let good_id = good.id;
        ledger.add_payment(good.clone()).await;
        // A payment that was never recorded: matching it fails with a read error.
        let phantom = sample_payment("Delhi", 1000, Utc::now() + Duration::hours(1));
        let watcher = PaymentWatcher::new(MatchingApi::new(ledger.clone()), DEFAULT_MAX_CONCURRENT_MATCHES);
        tokio::spawn(watcher.run());
        wait_until(|| {
            let ledger = ledger.clone();
            async move { ledger.subscriber_count().await > 0 }
        })
        .await;
        ledger.announce_payment(&phantom).await;
        ledger.announce_payment(&good).await;
        wait_until(|| {
            let ledger = ledger.clone();
            async move {
                ledger.payment(good_id).await.map(|p| p.status == PaymentStatus::Matched).unwrap_or(false)
            }
        })
        .await;
        assert_eq!(ledger.write_attempts().await, 1);
    }
}
