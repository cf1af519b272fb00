//! Admission checks for payments and candidate solvers.

use chrono::{DateTime, Duration, Utc};

use super::errors::NoMatchReason;
use crate::ledger_types::{Payment, PaymentStatus, Solver};

/// How long before expiry a payment stops being considered for matching. An assignment that lands
/// in the last two minutes would race the contract's own expiry check.
pub const EXPIRY_GRACE_PERIOD: Duration = Duration::seconds(120);

/// Whether the payment can be matched at all. Returns the barrier that rules it out, or `None` if
/// it is fair game. Evaluated exactly once per matching attempt, against a fresh ledger read.
///
/// The expiry boundary is half-open: a payment expiring exactly `EXPIRY_GRACE_PERIOD` from `now`
/// is already excluded.
pub fn payment_match_barrier(payment: &Payment, now: DateTime<Utc>) -> Option<NoMatchReason> {
    if payment.status != PaymentStatus::Pending {
        return Some(NoMatchReason::PaymentNotPending(payment.status));
    }
    if payment.is_assigned() {
        return Some(NoMatchReason::AlreadyAssigned(payment.assigned_solver));
    }
    if now >= payment.expires_at - EXPIRY_GRACE_PERIOD {
        return Some(NoMatchReason::ExpiringSoon { expires_at: payment.expires_at });
    }
    None
}

/// Solver-side admission: the solver must be active and must have monthly volume headroom for the
/// payment's fiat amount. The headroom verdict comes from the ledger and is passed in by the
/// caller; it is never re-derived from the solver record.
pub fn solver_is_eligible(solver: &Solver, within_monthly_limit: bool) -> bool {
    solver.is_active && within_monthly_limit
}

#[cfg(test)]
mod test {
    use alloy_primitives::Address;
    use chrono::Utc;

    use super::*;
    use crate::test_utils::{sample_payment, sample_solver};

    #[test]
    fn pending_unassigned_payment_with_headroom_is_matchable() {
        let now = Utc::now();
        let payment = sample_payment("Delhi", 1000, now + Duration::hours(1));
        assert_eq!(payment_match_barrier(&payment, now), None);
    }

    #[test]
    fn non_pending_payment_is_barred() {
        let now = Utc::now();
        for status in [
            PaymentStatus::Matched,
            PaymentStatus::Processing,
            PaymentStatus::Completed,
            PaymentStatus::Cancelled,
            PaymentStatus::Expired,
        ] {
            let mut payment = sample_payment("Delhi", 1000, now + Duration::hours(1));
            payment.status = status;
            assert_eq!(payment_match_barrier(&payment, now), Some(NoMatchReason::PaymentNotPending(status)));
        }
    }

    #[test]
    fn assigned_payment_is_barred() {
        let now = Utc::now();
        let solver = Address::repeat_byte(0x22);
        let mut payment = sample_payment("Delhi", 1000, now + Duration::hours(1));
        payment.assigned_solver = solver;
        assert_eq!(payment_match_barrier(&payment, now), Some(NoMatchReason::AlreadyAssigned(solver)));
    }

    #[test]
    fn expiry_boundary_is_half_open() {
        let now = Utc::now();
        // Exactly at the grace boundary: excluded.
        let at_boundary = sample_payment("Delhi", 1000, now + EXPIRY_GRACE_PERIOD);
        assert_eq!(
            payment_match_barrier(&at_boundary, now),
            Some(NoMatchReason::ExpiringSoon { expires_at: at_boundary.expires_at })
        );
        // One second more margin: included.
        let inside = sample_payment("Delhi", 1000, now + EXPIRY_GRACE_PERIOD + Duration::seconds(1));
        assert_eq!(payment_match_barrier(&inside, now), None);
    }

    #[test]
    fn solver_admission() {
        let solver = sample_solver(Address::repeat_byte(0x01), "Delhi", 9, 1, 75, 500_000);
        assert!(solver_is_eligible(&solver, true));
        assert!(!solver_is_eligible(&solver, false));
        let mut inactive = solver;
        inactive.is_active = false;
        assert!(!solver_is_eligible(&inactive, true));
    }
}
