//! # ecomarket-settlement
//!
//! Seller payouts from the platform escrow wallet.
//!
//! A [`PayoutScheduler`] runs [`PayoutEngine::sweep`] on a fixed interval.
//! Each sweep finds delivered orders that have not been paid out, keeps the
//! platform fee ([`FeeSplit`]) and transfers the remainder to the seller's
//! wallet. The ledger transfer and the `is_paid_out` flag commit together,
//! and the flag is the idempotency guard: re-running a sweep, or running two
//! engines against one store, never pays an order twice.

pub mod engine;
pub mod fee;
pub mod scheduler;

pub use engine::{PaidPayout, PayoutEngine, PayoutOutcome, SkippedPayout, SweepReport};
pub use fee::FeeSplit;
pub use scheduler::PayoutScheduler;
