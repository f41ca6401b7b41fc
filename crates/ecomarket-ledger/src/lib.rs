//! # ecomarket-ledger
//!
//! Money and stock bookkeeping.
//!
//! - [`Ledger`]: wallets, deposits, and atomic two-legged transfers with a
//!   per-wallet hash chain. [`post_transfer`] composes into a caller's unit
//!   of work.
//! - [`supply`]: money supply conservation check.
//! - [`InventoryLog`]: the append-only stock movement audit.
//! - [`StockService`]: the in-memory [`ecomarket_types::InventoryService`].

pub mod inventory;
pub mod ledger;
pub mod stock;
pub mod supply;

pub use inventory::InventoryLog;
pub use ledger::{Ledger, TransferReceipt, post_deposit, post_transfer, verify_wallet_chain};
pub use stock::{MovementContext, StockService};
pub use supply::{SupplySnapshot, verify_supply};
