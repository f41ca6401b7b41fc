//! Wallet ledger: provisioning, deposits, and atomic two-legged transfers.
//!
//! Balances move only by posting [`WalletTransaction`] entries through
//! [`Tables::post_wallet_entry`]. The free functions [`post_transfer`] and
//! [`post_deposit`] work on `&mut Tables` so other services can compose a
//! ledger write with their own writes in one unit of work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ecomarket_store::{MarketStore, Tables};
use ecomarket_types::{
    MarketError, Result, TransactionType, UserId, Wallet, WalletId, WalletTransaction,
};
use rust_decimal::Decimal;

use crate::supply::{SupplySnapshot, verify_supply};

/// The two entries written by one transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub debit: WalletTransaction,
    pub credit: WalletTransaction,
}

impl TransferReceipt {
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.credit.amount
    }
}

/// Post a transfer inside an open unit of work.
///
/// # Errors
/// `InvalidAmount` for a non-positive amount or `from == to`,
/// `WalletNotFound` for an unknown wallet, `InsufficientFunds` if the source
/// cannot cover the amount. Nothing is posted on error, and the caller's unit
/// of work rolls back anything it already staged.
pub fn post_transfer(
    tables: &mut Tables,
    from: WalletId,
    to: WalletId,
    amount: Decimal,
    description: &str,
    now: DateTime<Utc>,
) -> Result<TransferReceipt> {
    if amount <= Decimal::ZERO {
        return Err(MarketError::InvalidAmount {
            reason: format!("transfer amount must be positive, got {amount}"),
        });
    }
    if from == to {
        return Err(MarketError::InvalidAmount {
            reason: format!("transfer from {from} to itself"),
        });
    }
    // Both wallets must exist before either leg is drafted.
    tables.wallet(to)?;
    let debit = tables
        .wallet(from)?
        .draft_entry(TransactionType::Transfer, -amount, description, now)?;
    tables.post_wallet_entry(debit.clone())?;
    let credit = tables
        .wallet(to)?
        .draft_entry(TransactionType::Transfer, amount, description, now)?;
    tables.post_wallet_entry(credit.clone())?;
    Ok(TransferReceipt { debit, credit })
}

/// Post a deposit of external funds inside an open unit of work.
///
/// # Errors
/// `InvalidAmount` for a non-positive amount or one that would take the
/// wallet or the total money supply out of range.
pub fn post_deposit(
    tables: &mut Tables,
    wallet_id: WalletId,
    amount: Decimal,
    description: &str,
    now: DateTime<Utc>,
) -> Result<WalletTransaction> {
    if amount <= Decimal::ZERO {
        return Err(MarketError::InvalidAmount {
            reason: format!("deposit amount must be positive, got {amount}"),
        });
    }
    if tables
        .total_balance()
        .and_then(|held| held.checked_add(amount))
        .is_none()
    {
        return Err(MarketError::InvalidAmount {
            reason: format!("deposit of {amount} takes the money supply out of range"),
        });
    }
    let entry = tables
        .wallet(wallet_id)?
        .draft_entry(TransactionType::Deposit, amount, description, now)?;
    tables.post_wallet_entry(entry.clone())?;
    Ok(entry)
}

/// Service facade over the wallet tables.
pub struct Ledger {
    store: Arc<MarketStore>,
}

impl Ledger {
    #[must_use]
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    /// Open a wallet for a user. A user holds at most one wallet.
    pub fn open_wallet(&self, owner: UserId) -> Result<WalletId> {
        let wallet = Wallet::new(WalletId::new(), Some(owner), Utc::now());
        let id = wallet.id;
        self.store
            .transaction("open_wallet", |t| t.insert_wallet(wallet))?;
        tracing::info!(wallet = %id, owner = %owner, "wallet opened");
        Ok(id)
    }

    /// Create the ownerless platform escrow wallet if it does not exist yet.
    /// Returns `true` if it was created.
    pub fn ensure_platform_wallet(&self, id: WalletId) -> Result<bool> {
        let created = self.store.transaction("ensure_platform_wallet", |t| {
            if t.wallet(id).is_ok() {
                return Ok(false);
            }
            t.insert_wallet(Wallet::new(id, None, Utc::now()))?;
            Ok(true)
        })?;
        if created {
            tracing::info!(wallet = %id, "platform wallet created");
        }
        Ok(created)
    }

    /// Credit external funds to a wallet.
    pub fn deposit(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        description: &str,
    ) -> Result<WalletTransaction> {
        let now = Utc::now();
        let entry = self.store.transaction("deposit", |t| {
            post_deposit(t, wallet_id, amount, description, now)
        })?;
        tracing::info!(wallet = %wallet_id, amount = %amount, "deposit posted");
        Ok(entry)
    }

    /// Move `amount` from one wallet to another as a single unit of work.
    pub fn record_transfer(
        &self,
        from: WalletId,
        to: WalletId,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt> {
        let now = Utc::now();
        let receipt = self.store.transaction("record_transfer", |t| {
            post_transfer(t, from, to, amount, description, now)
        })?;
        tracing::info!(from = %from, to = %to, amount = %amount, "transfer posted");
        Ok(receipt)
    }

    pub fn balance(&self, wallet_id: WalletId) -> Result<Decimal> {
        self.store
            .read(|t| t.wallet(wallet_id).map(Wallet::balance))?
    }

    pub fn wallet_of_user(&self, user_id: UserId) -> Result<Option<WalletId>> {
        self.store.read(|t| t.wallet_of_user(user_id).map(|w| w.id))
    }

    /// Entries of one wallet, oldest first.
    pub fn history(&self, wallet_id: WalletId) -> Result<Vec<WalletTransaction>> {
        self.store.read(|t| {
            t.wallet(wallet_id)?;
            Ok(t.wallet_entries(wallet_id).to_vec())
        })?
    }

    /// Replay a wallet's entries from genesis and check that they reproduce
    /// its stored balance and head hash.
    pub fn verify_chain(&self, wallet_id: WalletId) -> Result<()> {
        self.store.read(|t| verify_wallet_chain(t, wallet_id))?
    }

    /// Check that wallet balances still add up to what was deposited.
    pub fn verify_supply(&self) -> Result<SupplySnapshot> {
        verify_supply(&self.store)
    }
}

/// See [`Ledger::verify_chain`].
pub fn verify_wallet_chain(tables: &Tables, wallet_id: WalletId) -> Result<()> {
    let wallet = tables.wallet(wallet_id)?;
    let mut replay = Wallet::new(wallet.id, wallet.owner, wallet.created_at);
    for entry in tables.wallet_entries(wallet_id) {
        replay.apply(entry)?;
    }
    if replay.balance() != wallet.balance() || replay.head_hash() != wallet.head_hash() {
        return Err(MarketError::LedgerIntegrity {
            reason: format!(
                "wallet {wallet_id}: replayed balance {} != stored {}",
                replay.balance(),
                wallet.balance()
            ),
        });
    }
    Ok(())
}
