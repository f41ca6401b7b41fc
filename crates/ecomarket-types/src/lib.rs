//! # ecomarket-types
//!
//! Shared types, errors, and configuration for the **EcoMarket** settlement core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`OrderGroupId`], [`OrderId`], [`UserId`], [`SellerId`], [`WalletId`], ...
//! - **Order model**: [`OrderGroup`], [`Order`], [`OrderDetail`] and their status axes
//! - **Ledger model**: [`Wallet`], [`WalletTransaction`]
//! - **Inventory model**: [`StockItem`], [`InventoryTransaction`]
//! - **Checkout contract**: [`CreateSessionRequest`], [`CreateSessionResponse`]
//! - **Read models**: [`OrderView`], [`OrderGroupView`]
//! - **Collaborators**: [`IdentityLookup`], [`CatalogLookup`], [`InventoryService`]
//! - **Configuration**: [`NodeConfig`], [`CheckoutConfig`], [`SettlementConfig`]
//! - **Errors**: [`MarketError`] with `EM_ERR_` prefix codes

pub mod checkout;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod order;
pub mod ports;
pub mod views;
pub mod wallet;

pub use checkout::*;
pub use config::*;
pub use directory::*;
pub use error::*;
pub use ids::*;
pub use inventory::*;
pub use order::*;
pub use ports::*;
pub use views::*;
pub use wallet::*;

// Constants are accessed via `ecomarket_types::constants::FOO`.
