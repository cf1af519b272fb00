//! # Payment matching
//!
//! This module hosts the matching pipeline. It comprises three co-operating parts:
//!
//! # Eligibility
//! [`eligibility`] decides admission. A payment as a whole can be barred from matching (wrong
//! status, already assigned, or too close to expiry), and an individual solver can be barred from
//! a payment (inactive, or no monthly volume headroom). Payment-level checks run once per attempt
//! against a fresh ledger read, so duplicate notifications for an already-matched payment fall
//! out here.
//!
//! # Scoring
//! [`scoring`] ranks the solvers that survive admission with a pure, deterministic weighted
//! heuristic over success history, regional locality, fee and lifetime volume. Scores are only
//! comparable within a single matching run.
//!
//! # MatchingApi
//! [`MatchingApi`](matching_api::MatchingApi) orchestrates an attempt end to end: fresh payment
//! read, candidate fan-out, ranking, and the assignment write with a bounded retry budget.

pub mod eligibility;
pub mod errors;
pub mod matching_api;
pub mod scoring;
