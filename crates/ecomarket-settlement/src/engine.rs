//! Payout settlement engine.
//!
//! A sweep pays every delivered, not yet paid-out order:
//! 1. Resolve the seller's wallet (seller profile → user → wallet)
//! 2. Split the order total into platform fee and seller amount
//! 3. Move the seller amount from the platform wallet to the seller wallet
//! 4. Set `is_paid_out`
//!
//! Steps 2-4 run in one unit of work that re-reads `is_paid_out` first, so an
//! order can never be paid twice, even by two engines sharing a store. One
//! failing order is skipped and logged; the rest of the sweep continues.

use std::sync::{Arc, Mutex, TryLockError};

use chrono::{DateTime, Utc};
use ecomarket_ledger::{post_transfer, verify_supply};
use ecomarket_store::MarketStore;
use ecomarket_types::{
    IdentityLookup, MarketError, OrderId, Result, SettlementConfig, WalletId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fee::FeeSplit;

/// Result of attempting one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    Paid(PaidPayout),
    /// `is_paid_out` was already set.
    AlreadyPaid,
    /// Not delivered (or cancelled) at the time of the attempt.
    NotEligible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidPayout {
    pub order_id: OrderId,
    pub seller_wallet: WalletId,
    pub split: FeeSplit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPayout {
    pub order_id: OrderId,
    pub reason: String,
    /// Whether a later sweep may succeed without anyone intervening.
    pub transient: bool,
}

/// Summary of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    /// Eligible orders found when the sweep started.
    pub examined: usize,
    pub paid: Vec<PaidPayout>,
    pub skipped: Vec<SkippedPayout>,
    /// Sum of seller amounts moved out of the platform wallet.
    pub total_moved: Decimal,
    /// Another sweep held the lock; this one did nothing.
    pub overlapped: bool,
}

impl SweepReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            examined: 0,
            paid: Vec::new(),
            skipped: Vec::new(),
            total_moved: Decimal::ZERO,
            overlapped: false,
        }
    }

    #[must_use]
    pub fn fees_collected(&self) -> Decimal {
        self.paid
            .iter()
            .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.split.fee))
    }
}

/// Pays sellers out of the platform escrow wallet.
pub struct PayoutEngine {
    store: Arc<MarketStore>,
    identity: Arc<dyn IdentityLookup>,
    config: SettlementConfig,
    sweep_lock: Mutex<()>,
}

impl PayoutEngine {
    #[must_use]
    pub fn new(
        store: Arc<MarketStore>,
        identity: Arc<dyn IdentityLookup>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            store,
            identity,
            config,
            sweep_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Run one sweep over every eligible order.
    ///
    /// # Errors
    /// Only store-level failures and a supply conservation violation abort
    /// the sweep. Per-order failures are reported in [`SweepReport::skipped`].
    pub fn sweep(&self) -> Result<SweepReport> {
        let started_at = Utc::now();
        let _guard = match self.sweep_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                tracing::warn!("payout sweep already running, skipping");
                return Ok(SweepReport {
                    overlapped: true,
                    ..SweepReport::empty(started_at)
                });
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let candidates: Vec<OrderId> = self.store.read(|t| {
            t.orders()
                .filter(|o| o.is_eligible_for_payout())
                .map(|o| o.id)
                .collect()
        })?;

        let mut report = SweepReport::empty(started_at);
        report.examined = candidates.len();

        for order_id in candidates {
            match self.payout_order_at(order_id, Utc::now()) {
                Ok(PayoutOutcome::Paid(paid)) => {
                    report.total_moved =
                        report.total_moved.saturating_add(paid.split.seller_amount);
                    report.paid.push(paid);
                }
                Ok(PayoutOutcome::AlreadyPaid | PayoutOutcome::NotEligible) => {}
                Err(e) => {
                    tracing::warn!(order = %order_id, error = %e, "payout skipped");
                    report.skipped.push(SkippedPayout {
                        order_id,
                        reason: e.to_string(),
                        transient: e.is_transient(),
                    });
                }
            }
        }

        if !report.paid.is_empty() {
            verify_supply(&self.store)?;
        }

        tracing::info!(
            examined = report.examined,
            paid = report.paid.len(),
            skipped = report.skipped.len(),
            total_moved = %report.total_moved,
            fees = %report.fees_collected(),
            "payout sweep complete"
        );
        Ok(report)
    }

    /// Pay out a single order if it is eligible.
    pub fn payout_order(&self, order_id: OrderId) -> Result<PayoutOutcome> {
        self.payout_order_at(order_id, Utc::now())
    }

    fn payout_order_at(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<PayoutOutcome> {
        let seller = self.store.read(|t| t.order(order_id).map(|o| o.seller))??;
        let seller_user = self
            .identity
            .resolve_seller_user(seller.seller_type, seller.id)
            .ok_or(MarketError::SellerNotFound {
                seller_type: seller.seller_type,
                seller_id: seller.id,
            })?;
        let platform = self.config.platform_wallet;
        let fee_rate = self.config.fee_rate;

        let outcome = self.store.transaction("payout", |t| {
            let order = t.order(order_id)?;
            if order.is_paid_out() {
                return Ok(PayoutOutcome::AlreadyPaid);
            }
            if !order.is_eligible_for_payout() {
                return Ok(PayoutOutcome::NotEligible);
            }
            let split = FeeSplit::compute(order.total(), fee_rate)?;
            let seller_wallet = t
                .wallet_of_user(seller_user)
                .map(|w| w.id)
                .ok_or(MarketError::SellerWalletNotFound(seller_user))?;

            let order = t.order_mut(order_id)?;
            order.repair_fulfillment(now);
            order.mark_paid_out(now)?;

            if split.seller_amount > Decimal::ZERO {
                post_transfer(
                    t,
                    platform,
                    seller_wallet,
                    split.seller_amount,
                    &format!("Payout for order {order_id}"),
                    now,
                )?;
            }
            Ok(PayoutOutcome::Paid(PaidPayout {
                order_id,
                seller_wallet,
                split,
            }))
        })?;

        if let PayoutOutcome::Paid(paid) = &outcome {
            tracing::info!(
                order = %order_id,
                seller_wallet = %paid.seller_wallet,
                total = %paid.split.total,
                fee = %paid.split.fee,
                seller_amount = %paid.split.seller_amount,
                "order paid out"
            );
        }
        Ok(outcome)
    }
}
