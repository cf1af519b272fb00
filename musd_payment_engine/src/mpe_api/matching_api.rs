use std::fmt::Debug;

use alloy_primitives::Address;
use chrono::Utc;
use futures_util::future::try_join_all;
use log::*;
use tokio::time::{sleep, Duration};

use super::{
    eligibility::{payment_match_barrier, solver_is_eligible},
    errors::{MatchingError, NoMatchReason},
    scoring::{score, EXCLUDED_SCORE},
};
use crate::{
    ledger::LedgerClient,
    ledger_types::{Payment, PaymentId, TxConfirmation},
};

/// Total number of ledger write attempts before an assignment is abandoned.
const ASSIGN_ATTEMPTS: u32 = 3;
/// Fixed backoff between assignment attempts.
const ASSIGN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Result of a completed matching attempt.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// A solver was selected and the assignment is committed on the ledger.
    Matched { solver: Address, score: f64, confirmation: TxConfirmation },
    /// The attempt finished without an assignment. Expected and non-fatal; the payment stays
    /// pending.
    NoMatch(NoMatchReason),
}

impl MatchOutcome {
    pub fn solver(&self) -> Option<Address> {
        match self {
            MatchOutcome::Matched { solver, .. } => Some(*solver),
            MatchOutcome::NoMatch(_) => None,
        }
    }
}

/// `MatchingApi` is the primary API for pairing a pending payment with the most desirable
/// eligible solver and committing the assignment to the ledger.
///
/// The API holds no state of its own beyond the injected ledger client, so instances are cheap
/// and independent; payment and solver records are read fresh on every attempt.
pub struct MatchingApi<L> {
    ledger: L,
}

impl<L> Debug for MatchingApi<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchingApi")
    }
}

impl<L> MatchingApi<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

impl<L> MatchingApi<L>
where L: LedgerClient
{
    /// Attempt to match the given payment to a solver.
    ///
    /// The attempt reads the payment fresh, bails out early (as a no-match, not an error) if the
    /// payment is not matchable, then fetches, vets and scores every active solver concurrently.
    /// The highest-scoring eligible solver wins; ties go to the solver listed first by the
    /// registry. The assignment write is retried up to [`ASSIGN_ATTEMPTS`] times before the last
    /// error is surfaced.
    ///
    /// Ledger read failures abort the attempt and are returned as [`MatchingError::Ledger`];
    /// callers driving this from an event stream are expected to log and move on.
    pub async fn match_payment_to_solver(&self, id: PaymentId) -> Result<MatchOutcome, MatchingError> {
        debug!("🤝️ Matching payment {}", id.abbrev());
        let payment = self.ledger.get_payment(id).await?;
        if let Some(reason) = payment_match_barrier(&payment, Utc::now()) {
            warn!("🤝️ Payment {} is not matchable: {reason}", id.abbrev());
            return Ok(MatchOutcome::NoMatch(reason));
        }
        let candidates = self.ledger.get_active_solvers().await?;
        if candidates.is_empty() {
            warn!("🤝️ No active solvers registered. Payment {} stays pending.", id.abbrev());
            return Ok(MatchOutcome::NoMatch(NoMatchReason::NoActiveSolvers));
        }
        trace!("🤝️ Scoring {} candidate solvers for payment {}", candidates.len(), id.abbrev());
        let scored =
            try_join_all(candidates.iter().map(|&address| self.score_candidate(address, &payment))).await?;
        let mut best: Option<(Address, f64)> = None;
        for (address, candidate_score) in scored {
            // Strictly-greater comparison keeps the first-seen candidate on ties.
            if candidate_score >= 0.0 && best.map_or(true, |(_, top)| candidate_score > top) {
                best = Some((address, candidate_score));
            }
        }
        let Some((winner, top_score)) = best else {
            warn!("🤝️ Every active solver was excluded for payment {}. It stays pending.", id.abbrev());
            return Ok(MatchOutcome::NoMatch(NoMatchReason::NoEligibleSolvers));
        };
        info!("🤝️ Best solver for payment {} is {winner} (score {top_score:.2})", id.abbrev());
        let confirmation = self.submit_assignment(id, winner).await?;
        info!("🤝️ Payment {} assigned to {winner}: {confirmation}", id.abbrev());
        Ok(MatchOutcome::Matched { solver: winner, score: top_score, confirmation })
    }

    /// Fetch, vet and score a single candidate. Ineligible solvers come back carrying the
    /// exclusion sentinel instead of being dropped, so enumeration order survives for the
    /// tie-break.
    async fn score_candidate(&self, address: Address, payment: &Payment) -> Result<(Address, f64), MatchingError> {
        let solver = self.ledger.get_solver(address).await?;
        let within_limit = self.ledger.check_monthly_limit(address, payment.amount_fiat).await?;
        if !solver_is_eligible(&solver, within_limit) {
            debug!(
                "🤝️ Solver {address} excluded (active: {}, monthly headroom: {within_limit})",
                solver.is_active
            );
            return Ok((address, EXCLUDED_SCORE));
        }
        Ok((address, score(&solver, payment)))
    }

    async fn submit_assignment(&self, id: PaymentId, solver: Address) -> Result<TxConfirmation, MatchingError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ledger.assign_solver(id, solver).await {
                Ok(confirmation) => return Ok(confirmation),
                Err(e) if attempt < ASSIGN_ATTEMPTS => {
                    warn!(
                        "🤝️ Assignment attempt {attempt}/{ASSIGN_ATTEMPTS} for payment {} failed: {e}. Retrying.",
                        id.abbrev()
                    );
                    sleep(ASSIGN_RETRY_DELAY).await;
                },
                Err(e) => return Err(MatchingError::AssignmentFailed { attempts: attempt, source: e }),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use alloy_primitives::B256;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use chrono::Utc;
    use mockall::mock;
    use mpg_common::Fiat;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        events::PaymentCreatedEvent,
        ledger::LedgerError,
        ledger_types::{PaymentStatus, Solver},
        test_utils::{init_test_logger, sample_payment, sample_solver, MemoryLedger},
    };

    mock! {
        pub Ledger {}

        #[async_trait]
        impl LedgerClient for Ledger {
            async fn get_payment(&self, id: PaymentId) -> Result<Payment, LedgerError>;
            async fn get_active_solvers(&self) -> Result<Vec<Address>, LedgerError>;
            async fn get_solver(&self, address: Address) -> Result<Solver, LedgerError>;
            async fn is_active_solver(&self, address: Address) -> Result<bool, LedgerError>;
            async fn check_monthly_limit(&self, address: Address, amount: Fiat) -> Result<bool, LedgerError>;
            async fn assign_solver(&self, id: PaymentId, solver: Address) -> Result<TxConfirmation, LedgerError>;
            async fn subscribe_payment_created(&self) -> Result<mpsc::Receiver<PaymentCreatedEvent>, LedgerError>;
        }
    }

    fn payment_id() -> PaymentId {
        PaymentId::from(B256::from(rand::random::<[u8; 32]>()))
    }

    #[tokio::test]
    async fn matched_payments_are_skipped_without_touching_the_write_path() {
        init_test_logger();
        let mut ledger = MockLedger::new();
        let mut payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        payment.status = PaymentStatus::Matched;
        let id = payment.id;
        ledger.expect_get_payment().returning(move |_| Ok(payment.clone()));
        ledger.expect_assign_solver().never();
        let api = MatchingApi::new(ledger);
        let outcome = api.match_payment_to_solver(id).await.unwrap();
        assert!(
            matches!(outcome, MatchOutcome::NoMatch(NoMatchReason::PaymentNotPending(PaymentStatus::Matched)))
        );
    }

    #[tokio::test]
    async fn assigned_payments_are_skipped_without_touching_the_write_path() {
        init_test_logger();
        let mut ledger = MockLedger::new();
        let incumbent = Address::repeat_byte(0x55);
        let mut payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        payment.assigned_solver = incumbent;
        let id = payment.id;
        ledger.expect_get_payment().returning(move |_| Ok(payment.clone()));
        ledger.expect_assign_solver().never();
        let api = MatchingApi::new(ledger);
        let outcome = api.match_payment_to_solver(id).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::NoMatch(NoMatchReason::AlreadyAssigned(s)) if s == incumbent));
    }

    #[tokio::test]
    async fn read_failures_propagate_as_errors() {
        init_test_logger();
        let mut ledger = MockLedger::new();
        ledger.expect_get_payment().returning(|_| Err(LedgerError::ReadError("rpc down".to_string())));
        ledger.expect_assign_solver().never();
        let api = MatchingApi::new(ledger);
        let result = api.match_payment_to_solver(payment_id()).await;
        assert!(matches!(result, Err(MatchingError::Ledger(LedgerError::ReadError(_)))));
    }

    #[tokio::test]
    async fn no_active_solvers_is_a_no_match() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        let payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        let id = payment.id;
        ledger.add_payment(payment).await;
        let api = MatchingApi::new(ledger);
        let outcome = api.match_payment_to_solver(id).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::NoMatch(NoMatchReason::NoActiveSolvers)));
        assert_eq!(api.ledger().write_attempts().await, 0);
    }

    #[tokio::test]
    async fn a_lone_solver_without_headroom_is_a_no_match() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        let payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        let id = payment.id;
        ledger.add_payment(payment).await;
        let mut solver = sample_solver(Address::repeat_byte(0x01), "Delhi", 100, 0, 0, 2_000_000);
        solver.monthly_volume_limit = Fiat::from(500);
        ledger.add_solver(solver).await;
        let api = MatchingApi::new(ledger);
        let outcome = api.match_payment_to_solver(id).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::NoMatch(NoMatchReason::NoEligibleSolvers)));
        assert_eq!(api.ledger().write_attempts().await, 0);
    }

    #[tokio::test]
    async fn capped_solvers_never_win_regardless_of_score() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        let payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        let id = payment.id;
        ledger.add_payment(payment).await;
        // The numerically strongest candidate has no monthly headroom left.
        let star = Address::repeat_byte(0x01);
        let mut capped = sample_solver(star, "Delhi", 100, 0, 0, 2_000_000);
        capped.current_month_volume = capped.monthly_volume_limit;
        ledger.add_solver(capped).await;
        let runner_up = Address::repeat_byte(0x02);
        ledger.add_solver(sample_solver(runner_up, "Mumbai", 5, 5, 200, 10_000)).await;
        let api = MatchingApi::new(ledger);
        let outcome = api.match_payment_to_solver(id).await.unwrap();
        assert_eq!(outcome.solver(), Some(runner_up));
    }

    #[tokio::test]
    async fn ties_break_to_the_first_enumerated_solver() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        let payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        let id = payment.id;
        ledger.add_payment(payment).await;
        let first = Address::repeat_byte(0x01);
        let second = Address::repeat_byte(0x02);
        ledger.add_solver(sample_solver(first, "Delhi", 9, 1, 75, 500_000)).await;
        ledger.add_solver(sample_solver(second, "Delhi", 9, 1, 75, 500_000)).await;
        let api = MatchingApi::new(ledger);
        let outcome = api.match_payment_to_solver(id).await.unwrap();
        assert_eq!(outcome.solver(), Some(first));
    }

    #[tokio::test]
    async fn regional_fit_beats_raw_credentials_end_to_end() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        let payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        let id = payment.id;
        ledger.add_payment(payment).await;
        let local = Address::repeat_byte(0x01);
        let remote = Address::repeat_byte(0x02);
        ledger.add_solver(sample_solver(local, "Delhi", 9, 1, 75, 500_000)).await;
        ledger.add_solver(sample_solver(remote, "Mumbai", 19, 1, 50, 2_000_000)).await;
        let api = MatchingApi::new(ledger);
        let outcome = api.match_payment_to_solver(id).await.unwrap();
        match outcome {
            MatchOutcome::Matched { solver, score, .. } => {
                assert_eq!(solver, local);
                assert!((score - 87.0).abs() < 1e-9);
            },
            other => panic!("expected a match, got {other:?}"),
        }
        // The assignment is now visible on the ledger, and a re-trigger is absorbed.
        let stored = api.ledger().payment(id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Matched);
        assert_eq!(stored.assigned_solver, local);
        let again = api.match_payment_to_solver(id).await.unwrap();
        assert!(matches!(
            again,
            MatchOutcome::NoMatch(NoMatchReason::PaymentNotPending(PaymentStatus::Matched))
        ));
        assert_eq!(api.ledger().write_attempts().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn assignment_retries_twice_then_succeeds_with_fixed_backoff() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        let payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        let id = payment.id;
        ledger.add_payment(payment).await;
        let solver = Address::repeat_byte(0x01);
        ledger.add_solver(sample_solver(solver, "Delhi", 9, 1, 75, 500_000)).await;
        ledger.fail_next_writes(2).await;
        let api = MatchingApi::new(ledger);
        let started = tokio::time::Instant::now();
        let outcome = api.match_payment_to_solver(id).await.unwrap();
        let elapsed = started.elapsed();
        assert_eq!(outcome.solver(), Some(solver));
        assert_eq!(api.ledger().write_attempts().await, 3);
        // Two one-second backoffs on the virtual clock.
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_last_write_error() {
        init_test_logger();
        let ledger = MemoryLedger::new();
        let payment = sample_payment("Delhi", 1000, Utc::now() + ChronoDuration::hours(1));
        let id = payment.id;
        ledger.add_payment(payment).await;
        ledger.add_solver(sample_solver(Address::repeat_byte(0x01), "Delhi", 9, 1, 75, 500_000)).await;
        ledger.fail_next_writes(3).await;
        let api = MatchingApi::new(ledger);
        let result = api.match_payment_to_solver(id).await;
        assert!(matches!(result, Err(MatchingError::AssignmentFailed { attempts: 3, .. })));
        assert_eq!(api.ledger().write_attempts().await, 3);
        // The payment is untouched and can be re-attempted later.
        let stored = api.ledger().payment(id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert!(!stored.is_assigned());
    }
}
