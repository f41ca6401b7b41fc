//! Interfaces to the collaborators the settlement core consumes but does
//! not own: identity, catalog, and inventory.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DesignId, MaterialId, ProductId, Result, SellerId, SellerType, UserId, WarehouseId};

/// Resolves a seller profile to the user account that holds its wallet.
pub trait IdentityLookup: Send + Sync {
    fn resolve_seller_user(&self, seller_type: SellerType, seller_id: SellerId) -> Option<UserId>;
}

/// Existence checks against the catalog read model.
pub trait CatalogLookup: Send + Sync {
    fn contains_material(&self, material_id: MaterialId) -> bool;
    fn contains_design(&self, design_id: DesignId) -> bool;
}

/// One product stock increase, e.g. output of a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStockChange {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    /// Display name used when the product's stock item is first created.
    pub sku: String,
}

/// Stock mutations. Each call is atomic: it fully applies or changes nothing.
pub trait InventoryService: Send + Sync {
    /// Consume materials from a designer's stock.
    ///
    /// # Errors
    /// `StockShortage` naming the first material that cannot be covered.
    fn deduct(&self, designer_id: SellerId, usage: &BTreeMap<MaterialId, Decimal>) -> Result<()>;

    fn add_product_stock(&self, changes: &[ProductStockChange]) -> Result<()>;
}
