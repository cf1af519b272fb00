//! Composite desirability scoring for (solver, payment) pairs.
//!
//! Scoring is pure and deterministic: no ledger access, no clocks, no randomness. The four
//! signal weights sum to 1.0, so a perfect solver scores exactly 100. Scores are only comparable
//! within a single matching run; there is no cross-run normalisation.

use crate::ledger_types::{Payment, Solver};

/// Weight of the historical success-rate signal.
const SUCCESS_RATE_WEIGHT: f64 = 0.40;
/// Points added when the solver operates in the payment's region (region weight 0.25, baked in).
const REGION_MATCH_POINTS: f64 = 25.0;
/// Points added when it does not. Locality is binary, not distance-weighted.
const REGION_MISMATCH_POINTS: f64 = 5.0;
/// Weight of the fee-competitiveness signal.
const FEE_WEIGHT: f64 = 0.20;
/// Weight of the lifetime-volume signal.
const VOLUME_WEIGHT: f64 = 0.15;
/// Success rate assumed for solvers with no payment history, so new registrants are neither
/// buried nor favoured over proven operators.
const NEUTRAL_SUCCESS_RATE: f64 = 70.0;
/// Lifetime volume (whole mUSD) at which the volume signal saturates.
const REFERENCE_VOLUME: f64 = 1_000_000.0;

/// Sentinel score for solvers that failed eligibility. Never produced by [`score`] itself, which
/// has a floor of 0; anything negative is excluded from ranking.
pub const EXCLUDED_SCORE: f64 = -1.0;

/// Composite desirability of assigning `solver` to `payment`. Higher is better; the maximum
/// attainable value is 100.
pub fn score(solver: &Solver, payment: &Payment) -> f64 {
    let mut score = success_rate(solver) * SUCCESS_RATE_WEIGHT;
    score += if solver.region.matches(&payment.region) { REGION_MATCH_POINTS } else { REGION_MISMATCH_POINTS };
    score += fee_competitiveness(solver) * FEE_WEIGHT;
    score += volume_percentile(solver) * VOLUME_WEIGHT;
    score
}

/// Historical success percentage, or the neutral default for solvers with no completed payments.
fn success_rate(solver: &Solver) -> f64 {
    let total = solver.successful_payments + solver.failed_payments;
    if total == 0 {
        return NEUTRAL_SUCCESS_RATE;
    }
    solver.successful_payments as f64 / total as f64 * 100.0
}

/// 100 for a free service, dropping ten points per percentage point of fee. Fees of 10% or more
/// contribute nothing.
fn fee_competitiveness(solver: &Solver) -> f64 {
    let fee_percent = solver.fee_bps as f64 / 100.0;
    (100.0 - fee_percent * 10.0).max(0.0)
}

/// Lifetime volume as a percentage of the reference volume, capped at 100 so whale solvers cannot
/// dominate the ranking on volume alone.
fn volume_percentile(solver: &Solver) -> f64 {
    (solver.total_volume.whole_units() as f64 / REFERENCE_VOLUME * 100.0).min(100.0)
}
