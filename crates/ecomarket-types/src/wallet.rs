//! Wallet and ledger-entry types.
//!
//! A [`Wallet`] balance can only move by applying a [`WalletTransaction`]
//! whose `balance_before` matches the current balance and whose hash extends
//! the wallet's entry chain. That makes the ledger the single write path for
//! balances and makes post-write edits of an entry detectable.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{MarketError, Result, UserId, WalletId, WalletTransactionId, constants};

/// Hash of the (empty) chain before a wallet's first entry.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// External funds entering the system (e.g. a captured customer payment).
    Deposit,
    /// One leg of a wallet-to-wallet transfer.
    Transfer,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "Deposit"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Success,
    /// Recorded attempt that never moved the balance.
    Failed,
}

/// A wallet holding a fixed-point balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    /// `None` only for the platform escrow wallet.
    pub owner: Option<UserId>,
    balance: Decimal,
    head_hash: [u8; 32],
    entry_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    #[must_use]
    pub fn new(id: WalletId, owner: Option<UserId>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            balance: Decimal::ZERO,
            head_hash: GENESIS_HASH,
            entry_count: 0,
            created_at,
        }
    }

    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    #[must_use]
    pub fn head_hash(&self) -> [u8; 32] {
        self.head_hash
    }

    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Build the next entry for this wallet without applying it.
    ///
    /// # Errors
    /// `InsufficientFunds` if a debit would take the balance below zero,
    /// `InvalidAmount` if a credit would take it out of range.
    pub fn draft_entry(
        &self,
        tx_type: TransactionType,
        amount: Decimal,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<WalletTransaction> {
        let balance_after = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| MarketError::InvalidAmount {
                reason: format!("posting {amount} to {} overflows its balance", self.id),
            })?;
        if balance_after.is_sign_negative() {
            return Err(MarketError::InsufficientFunds {
                wallet: self.id,
                needed: -amount,
                available: self.balance,
            });
        }
        let mut entry = WalletTransaction {
            id: WalletTransactionId::new(),
            wallet_id: self.id,
            tx_type,
            amount,
            balance_before: self.balance,
            balance_after,
            status: TransactionStatus::Success,
            description: description.into(),
            created_at,
            prev_hash: self.head_hash,
            entry_hash: GENESIS_HASH,
        };
        entry.entry_hash = entry.compute_hash();
        Ok(entry)
    }

    /// Apply an entry: the only way a balance changes.
    ///
    /// # Errors
    /// `LedgerIntegrity` if the entry does not extend this wallet's chain
    /// from its current balance.
    pub fn apply(&mut self, entry: &WalletTransaction) -> Result<()> {
        if entry.wallet_id != self.id {
            return Err(integrity(format!(
                "entry {} belongs to {}, not {}",
                entry.id, entry.wallet_id, self.id
            )));
        }
        if entry.prev_hash != self.head_hash {
            return Err(integrity(format!(
                "entry {} does not extend the chain of {}",
                entry.id, self.id
            )));
        }
        if entry.balance_before != self.balance {
            return Err(integrity(format!(
                "entry {} expects balance {}, wallet {} holds {}",
                entry.id, entry.balance_before, self.id, self.balance
            )));
        }
        entry.check_identity()?;
        if entry.entry_hash != entry.compute_hash() {
            return Err(integrity(format!("entry {} hash mismatch", entry.id)));
        }
        self.balance = entry.balance_after;
        self.head_hash = entry.entry_hash;
        self.entry_count += 1;
        Ok(())
    }
}

/// One immutable ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: WalletTransactionId,
    pub wallet_id: WalletId,
    pub tx_type: TransactionType,
    /// Signed: negative debits, positive credits.
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub prev_hash: [u8; 32],
    pub entry_hash: [u8; 32],
}

impl WalletTransaction {
    /// `balance_after == balance_before + amount` for successful entries;
    /// failed entries leave the balance untouched.
    pub fn check_identity(&self) -> Result<()> {
        let expected = match self.status {
            TransactionStatus::Success => self.balance_before.checked_add(self.amount),
            TransactionStatus::Failed => Some(self.balance_before),
        };
        if expected != Some(self.balance_after) {
            return Err(integrity(format!(
                "entry {}: {} + {} != {}",
                self.id, self.balance_before, self.amount, self.balance_after
            )));
        }
        Ok(())
    }

    /// SHA-256 over every field except `entry_hash`.
    #[must_use]
    pub fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::LEDGER_HASH_DOMAIN);
        hasher.update(self.prev_hash);
        hasher.update(self.id.0.as_bytes());
        hasher.update(self.wallet_id.0.as_bytes());
        hasher.update(self.tx_type.to_string().as_bytes());
        hasher.update(self.amount.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.balance_before.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.balance_after.to_string().as_bytes());
        hasher.update([u8::from(self.status == TransactionStatus::Success)]);
        hasher.update(self.description.as_bytes());
        hasher.update(self.created_at.to_rfc3339().as_bytes());
        hasher.finalize().into()
    }

    #[must_use]
    pub fn entry_hash_hex(&self) -> String {
        hex::encode(self.entry_hash)
    }
}

fn integrity(reason: String) -> MarketError {
    MarketError::LedgerIntegrity { reason }
}
