//! Stock items and the inventory transaction log entries that audit them.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    InventoryId, InventoryTransactionId, MarketError, MaterialId, ProductId, Result, SellerId,
    UserId, WarehouseId,
};

/// Discriminator for the two stock ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryKind {
    Product,
    Material,
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product => write!(f, "Product"),
            Self::Material => write!(f, "Material"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryTxType {
    SupplierReceipt,
    ProductionUse,
    ProductionOutput,
    SalesIssue,
    ManualAdjustment,
}

impl fmt::Display for InventoryTxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SupplierReceipt => "SupplierReceipt",
            Self::ProductionUse => "ProductionUse",
            Self::ProductionOutput => "ProductionOutput",
            Self::SalesIssue => "SalesIssue",
            Self::ManualAdjustment => "ManualAdjustment",
        };
        f.write_str(s)
    }
}

/// What a stock item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockItemRef {
    Material(MaterialId),
    Product(ProductId),
}

impl StockItemRef {
    #[must_use]
    pub fn kind(&self) -> InventoryKind {
        match self {
            Self::Material(_) => InventoryKind::Material,
            Self::Product(_) => InventoryKind::Product,
        }
    }
}

/// One item held in one warehouse, owned by a designer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    pub id: InventoryId,
    pub item: StockItemRef,
    pub warehouse_id: WarehouseId,
    pub owner: SellerId,
    /// Human-readable name (material name or product SKU).
    pub name: String,
    quantity: Decimal,
}

impl StockItem {
    #[must_use]
    pub fn new(
        item: StockItemRef,
        warehouse_id: WarehouseId,
        owner: SellerId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: InventoryId::new(),
            item,
            warehouse_id,
            owner,
            name: name.into(),
            quantity: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    #[must_use]
    pub fn kind(&self) -> InventoryKind {
        self.item.kind()
    }

    /// Apply a signed change. Stock never goes below zero.
    ///
    /// Returns `(before, after)`.
    pub fn adjust(&mut self, change: Decimal) -> Result<(Decimal, Decimal)> {
        let before = self.quantity;
        let after = before
            .checked_add(change)
            .ok_or_else(|| MarketError::InvalidAmount {
                reason: format!("stock of {} cannot grow by {change}", self.id),
            })?;
        if after.is_sign_negative() {
            return Err(match self.item {
                StockItemRef::Material(material) => MarketError::StockShortage {
                    material,
                    needed: -change,
                    available: before,
                },
                StockItemRef::Product(_) => MarketError::InvalidAmount {
                    reason: format!("stock of {} would drop to {after}", self.id),
                },
            });
        }
        self.quantity = after;
        Ok((before, after))
    }
}

/// A storage location owned by one designer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub owner: SellerId,
    pub kind: InventoryKind,
    pub name: String,
}

impl Warehouse {
    #[must_use]
    pub fn new(owner: SellerId, kind: InventoryKind, name: impl Into<String>) -> Self {
        Self {
            id: WarehouseId::new(),
            owner,
            kind,
            name: name.into(),
        }
    }
}

/// Optional link from a stock movement to whatever caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReference {
    /// e.g. `SalesOrder`, `ProductionOrder`, `Manual`.
    pub kind: String,
    pub id: String,
}

/// An immutable stock movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: InventoryTransactionId,
    pub kind: InventoryKind,
    pub inventory_id: InventoryId,
    pub warehouse_id: WarehouseId,
    pub tx_type: InventoryTxType,
    pub quantity_change: Decimal,
    pub before_qty: Decimal,
    pub after_qty: Decimal,
    pub reference: Option<StockReference>,
    pub performed_by: Option<UserId>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl InventoryTransaction {
    /// `after_qty == before_qty + quantity_change`.
    pub fn check_identity(&self) -> Result<()> {
        if self.before_qty.checked_add(self.quantity_change) != Some(self.after_qty) {
            return Err(MarketError::InvalidAmount {
                reason: format!(
                    "inventory entry {}: {} + {} != {}",
                    self.id, self.before_qty, self.quantity_change, self.after_qty
                ),
            });
        }
        Ok(())
    }
}

/// Read model: an inventory transaction joined to its item and user names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransactionView {
    pub transaction_id: InventoryTransactionId,
    pub inventory_type: InventoryKind,
    pub inventory_id: InventoryId,
    pub item_name: String,
    pub performed_by_user_id: Option<UserId>,
    pub performed_by_user_name: Option<String>,
    pub quantity_changed: Decimal,
    pub before_qty: Decimal,
    pub after_qty: Decimal,
    pub transaction_type: InventoryTxType,
    pub notes: String,
    pub transaction_date: DateTime<Utc>,
}
