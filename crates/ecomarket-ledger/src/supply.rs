//! Money supply conservation.
//!
//! ```text
//! Σ(wallet balances) == Σ(successful Deposit amounts)
//! ```
//!
//! Transfers only move money between wallets, so any drift means a balance
//! was changed outside the ledger.

use ecomarket_store::{MarketStore, Tables};
use ecomarket_types::{MarketError, Result, TransactionStatus, TransactionType};
use rust_decimal::Decimal;

/// Snapshot of supply totals taken from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplySnapshot {
    /// Total external funds ever deposited.
    pub deposited: Decimal,
    /// Sum of current wallet balances.
    pub held: Decimal,
    /// Sum of all successful transfer legs. Zero when every transfer balanced.
    pub transfer_drift: Decimal,
}

impl SupplySnapshot {
    /// # Errors
    /// `SupplyInvariantViolation` if a total leaves the decimal range.
    pub fn from_tables(tables: &Tables) -> Result<Self> {
        let overflow = |what: &str| MarketError::SupplyInvariantViolation {
            reason: format!("{what} is out of range"),
        };
        let mut deposited = Decimal::ZERO;
        let mut transfer_drift = Decimal::ZERO;
        for entry in tables.all_wallet_entries() {
            if entry.status != TransactionStatus::Success {
                continue;
            }
            match entry.tx_type {
                TransactionType::Deposit => {
                    deposited = deposited
                        .checked_add(entry.amount)
                        .ok_or_else(|| overflow("deposit total"))?;
                }
                TransactionType::Transfer => {
                    transfer_drift = transfer_drift
                        .checked_add(entry.amount)
                        .ok_or_else(|| overflow("transfer drift"))?;
                }
            }
        }
        Ok(Self {
            deposited,
            held: tables
                .total_balance()
                .ok_or_else(|| overflow("held balance"))?,
            transfer_drift,
        })
    }

    /// # Errors
    /// `SupplyInvariantViolation` if held funds differ from deposits or the
    /// transfer legs do not cancel out.
    pub fn verify(&self) -> Result<()> {
        if self.held != self.deposited {
            return Err(MarketError::SupplyInvariantViolation {
                reason: format!(
                    "held {} != deposited {} (transfer drift {})",
                    self.held, self.deposited, self.transfer_drift
                ),
            });
        }
        if !self.transfer_drift.is_zero() {
            return Err(MarketError::SupplyInvariantViolation {
                reason: format!("transfer legs do not cancel: drift {}", self.transfer_drift),
            });
        }
        Ok(())
    }
}

/// Take a snapshot and verify it.
pub fn verify_supply(store: &MarketStore) -> Result<SupplySnapshot> {
    let checked = store
        .read(SupplySnapshot::from_tables)?
        .and_then(|snapshot| snapshot.verify().map(|()| snapshot));
    let snapshot = match checked {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!(error = %e, "supply conservation violated");
            return Err(e);
        }
    };
    tracing::debug!(held = %snapshot.held, "supply conserved");
    Ok(snapshot)
}
