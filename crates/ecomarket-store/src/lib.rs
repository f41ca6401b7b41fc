//! # ecomarket-store
//!
//! In-memory persistence for the settlement core.
//!
//! [`MarketStore`] wraps the [`Tables`] behind a lock and exposes two entry
//! points: [`MarketStore::read`] for snapshots and
//! [`MarketStore::transaction`] for atomic units of work. Services in the
//! other crates compose their writes as closures over `&mut Tables`, so a
//! checkout, a payout or a stock deduction either lands whole or not at all.

pub mod store;
pub mod tables;

pub use store::MarketStore;
pub use tables::Tables;
