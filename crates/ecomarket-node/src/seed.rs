//! Seed state for an in-memory node: seller accounts, escrow funds, and
//! orders carried over from an earlier system.
//!
//! Loaded from a JSON file (`--seed`) and written in one unit of work, so a
//! bad seed leaves the store exactly as `Node::start` created it.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use ecomarket_ledger::post_deposit;
use ecomarket_store::{MarketStore, Tables};
use ecomarket_types::{
    FulfillmentStatus, MarketError, Order, OrderAmounts, OrderGroup, PaymentStatus, Result, Seller,
    SellerDirectory, SellerId, SellerType, UserId, Wallet, WalletId, constants,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedState {
    /// Captured customer payments already held by the platform wallet.
    #[serde(default)]
    pub escrow_balance: Decimal,
    #[serde(default)]
    pub sellers: Vec<SeedSeller>,
    #[serde(default)]
    pub orders: Vec<SeedOrder>,
}

/// A seller profile and the user account behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSeller {
    pub seller_type: SellerType,
    pub seller_id: SellerId,
    pub user_id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    /// Open a wallet for the user. A seller without one is skipped by
    /// payouts until it gets one.
    #[serde(default = "default_open_wallet")]
    pub open_wallet: bool,
}

/// An imported order. Omitted statuses mean a fresh, unpaid order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedOrder {
    pub customer_id: UserId,
    pub seller_type: SellerType,
    pub seller_id: SellerId,
    pub shipping_address: String,
    pub subtotal: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub fulfillment_status: Option<FulfillmentStatus>,
}

fn default_open_wallet() -> bool {
    true
}

/// What a seed wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub sellers: usize,
    pub wallets: usize,
    pub orders: usize,
}

impl SeedState {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Seller profile → user links for identity lookups.
    #[must_use]
    pub fn directory(&self) -> SellerDirectory {
        self.sellers
            .iter()
            .fold(SellerDirectory::new(), |dir, s| dir.with(s.seller(), s.user_id))
    }

    /// Write the seed into `store`. `platform` must already exist.
    ///
    /// # Errors
    /// Whatever a seeded row violates (negative amounts, a second wallet for
    /// one user, an impossible status combination). Nothing is written then.
    pub fn apply(&self, store: &MarketStore, platform: WalletId) -> Result<SeedSummary> {
        let now = Utc::now();
        store.transaction("seed", |t| self.write(t, platform, now))
    }

    fn write(&self, t: &mut Tables, platform: WalletId, now: DateTime<Utc>) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        if self.escrow_balance > Decimal::ZERO {
            post_deposit(t, platform, self.escrow_balance, "seeded escrow", now)?;
        }
        for seller in &self.sellers {
            if let Some(name) = &seller.name {
                t.set_user_name(seller.user_id, name.as_str());
            }
            if seller.open_wallet {
                t.insert_wallet(Wallet::new(WalletId::new(), Some(seller.user_id), now))?;
                summary.wallets += 1;
            }
            summary.sellers += 1;
        }
        for order in &self.orders {
            let (group, order) = order.build(now)?;
            t.insert_group(group)?;
            t.insert_order(order)?;
            summary.orders += 1;
        }
        Ok(summary)
    }
}

impl SeedSeller {
    fn seller(&self) -> Seller {
        Seller {
            id: self.seller_id,
            seller_type: self.seller_type,
        }
    }
}

impl SeedOrder {
    /// The order in its own single-order group, walked to the seeded state.
    fn build(&self, now: DateTime<Utc>) -> Result<(OrderGroup, Order)> {
        let address = self.shipping_address.trim();
        if address.is_empty() {
            return Err(MarketError::MissingShippingAddress);
        }
        let hold = Duration::minutes(constants::DEFAULT_HOLD_MINUTES);
        let mut group = OrderGroup::new(self.customer_id, now, now + hold);
        group.total_orders = 1;
        let seller = Seller {
            id: self.seller_id,
            seller_type: self.seller_type,
        };
        let amounts = OrderAmounts {
            subtotal: self.subtotal,
            shipping_fee: self.shipping_fee,
            discount: self.discount,
        };
        let mut order = Order::new(
            self.customer_id,
            &group,
            seller,
            address,
            amounts,
            now,
        )?;

        match self.payment_status.unwrap_or(PaymentStatus::Pending) {
            PaymentStatus::Pending => {}
            PaymentStatus::Failed => order.apply_payment_failed(now)?,
            PaymentStatus::Paid => {
                order.apply_payment_confirmed(now)?;
                group.record_completion()?;
            }
            PaymentStatus::Refunded => {
                order.apply_payment_confirmed(now)?;
                group.record_completion()?;
                order.apply_cancel(now)?;
            }
        }
        match self.fulfillment_status.unwrap_or(FulfillmentStatus::None) {
            FulfillmentStatus::None => {}
            FulfillmentStatus::Shipped => order.apply_shipped(now)?,
            FulfillmentStatus::Delivered => order.apply_delivered(now)?,
        }
        Ok((group, order))
    }
}
