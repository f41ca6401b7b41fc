//! In-memory [`InventoryService`]: stock levels plus their audit entries.
//!
//! Every stock change appends an [`InventoryTransaction`] in the same unit of
//! work, so the log always explains the current quantity.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use ecomarket_store::{MarketStore, Tables};
use ecomarket_types::{
    InventoryId, InventoryKind, InventoryService, InventoryTransaction, InventoryTransactionId,
    InventoryTxType, MarketError, MaterialId, ProductStockChange, Result, SellerId, StockItem,
    StockItemRef, StockReference, UserId, Warehouse, WarehouseId,
};
use rust_decimal::Decimal;

/// Details recorded alongside a stock movement.
#[derive(Debug, Clone, Default)]
pub struct MovementContext {
    pub performed_by: Option<UserId>,
    pub reference: Option<StockReference>,
    pub note: String,
}

/// Log a signed change to a stock item; appending the entry applies it.
fn move_stock(
    tables: &mut Tables,
    inventory_id: InventoryId,
    change: Decimal,
    tx_type: InventoryTxType,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<InventoryTransaction> {
    let item = tables.stock_item(inventory_id)?;
    let before = item.quantity();
    let after = before
        .checked_add(change)
        .ok_or_else(|| MarketError::InvalidAmount {
            reason: format!("stock of {inventory_id} cannot grow by {change}"),
        })?;
    let entry = InventoryTransaction {
        id: InventoryTransactionId::new(),
        kind: item.kind(),
        inventory_id,
        warehouse_id: item.warehouse_id,
        tx_type,
        quantity_change: change,
        before_qty: before,
        after_qty: after,
        reference: ctx.reference.clone(),
        performed_by: ctx.performed_by,
        note: ctx.note.clone(),
        created_at: now,
    };
    tables.append_inventory_entry(entry.clone())?;
    Ok(entry)
}

/// Stock levels for designers' materials and products.
pub struct StockService {
    store: Arc<MarketStore>,
}

impl StockService {
    #[must_use]
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    pub fn register_warehouse(
        &self,
        owner: SellerId,
        kind: InventoryKind,
        name: &str,
    ) -> Result<WarehouseId> {
        let warehouse = Warehouse::new(owner, kind, name);
        let id = warehouse.id;
        self.store
            .transaction("register_warehouse", |t| t.insert_warehouse(warehouse))?;
        tracing::info!(warehouse = %id, owner = %owner, kind = %kind, "warehouse registered");
        Ok(id)
    }

    /// Book inbound material from a supplier into a designer's warehouse.
    /// Creates the stock item on first receipt.
    pub fn receive_material(
        &self,
        warehouse_id: WarehouseId,
        material_id: MaterialId,
        name: &str,
        quantity: Decimal,
        ctx: &MovementContext,
    ) -> Result<InventoryTransaction> {
        if quantity <= Decimal::ZERO {
            return Err(MarketError::InvalidAmount {
                reason: format!("received quantity must be positive, got {quantity}"),
            });
        }
        let now = Utc::now();
        let entry = self.store.transaction("receive_material", |t| {
            let item_id = stock_item_for(
                t,
                warehouse_id,
                StockItemRef::Material(material_id),
                name,
            )?;
            move_stock(t, item_id, quantity, InventoryTxType::SupplierReceipt, ctx, now)
        })?;
        tracing::info!(
            material = %material_id,
            warehouse = %warehouse_id,
            quantity = %quantity,
            "material received"
        );
        Ok(entry)
    }

    pub fn quantity_of(&self, inventory_id: InventoryId) -> Result<Decimal> {
        self.store
            .read(|t| t.stock_item(inventory_id).map(StockItem::quantity))?
    }

    /// The designer's stock item for a material, if any.
    pub fn material_stock(
        &self,
        designer_id: SellerId,
        material_id: MaterialId,
    ) -> Result<Option<StockItem>> {
        self.store.read(|t| {
            t.find_stock_by_owner(designer_id, StockItemRef::Material(material_id))
                .cloned()
        })
    }
}

/// Find the stock item for `item` in a warehouse, creating it if needed.
fn stock_item_for(
    tables: &mut Tables,
    warehouse_id: WarehouseId,
    item: StockItemRef,
    name: &str,
) -> Result<InventoryId> {
    if let Some(existing) = tables.find_stock_in_warehouse(warehouse_id, item) {
        return Ok(existing.id);
    }
    let warehouse = tables.warehouse(warehouse_id).ok_or_else(|| {
        MarketError::Internal(format!("unknown warehouse {warehouse_id}"))
    })?;
    if warehouse.kind != item.kind() {
        return Err(MarketError::InvalidAmount {
            reason: format!(
                "{} stock cannot be held in {} warehouse {warehouse_id}",
                item.kind(),
                warehouse.kind
            ),
        });
    }
    let created = StockItem::new(item, warehouse_id, warehouse.owner, name);
    let id = created.id;
    tables.insert_stock_item(created)?;
    Ok(id)
}

impl InventoryService for StockService {
    fn deduct(&self, designer_id: SellerId, usage: &BTreeMap<MaterialId, Decimal>) -> Result<()> {
        let now = Utc::now();
        let ctx = MovementContext {
            note: "production usage".into(),
            ..MovementContext::default()
        };
        self.store.transaction("deduct_materials", |t| {
            for (&material_id, &amount) in usage {
                if amount <= Decimal::ZERO {
                    return Err(MarketError::InvalidAmount {
                        reason: format!("usage of {material_id} must be positive, got {amount}"),
                    });
                }
                let item_id = t
                    .find_stock_by_owner(designer_id, StockItemRef::Material(material_id))
                    .map(|s| s.id)
                    .ok_or(MarketError::StockShortage {
                        material: material_id,
                        needed: amount,
                        available: Decimal::ZERO,
                    })?;
                move_stock(t, item_id, -amount, InventoryTxType::ProductionUse, &ctx, now)?;
            }
            Ok(())
        })?;
        tracing::info!(designer = %designer_id, materials = usage.len(), "materials deducted");
        Ok(())
    }

    fn add_product_stock(&self, changes: &[ProductStockChange]) -> Result<()> {
        let now = Utc::now();
        let ctx = MovementContext {
            note: "production output".into(),
            ..MovementContext::default()
        };
        self.store.transaction("add_product_stock", |t| {
            for change in changes {
                if change.quantity <= Decimal::ZERO {
                    return Err(MarketError::InvalidAmount {
                        reason: format!(
                            "output of {} must be positive, got {}",
                            change.product_id, change.quantity
                        ),
                    });
                }
                let item_id = stock_item_for(
                    t,
                    change.warehouse_id,
                    StockItemRef::Product(change.product_id),
                    &change.sku,
                )?;
                move_stock(
                    t,
                    item_id,
                    change.quantity,
                    InventoryTxType::ProductionOutput,
                    &ctx,
                    now,
                )?;
            }
            Ok(())
        })?;
        tracing::info!(products = changes.len(), "product stock added");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecomarket_types::ProductId;

    struct Fixture {
        store: Arc<MarketStore>,
        stock: StockService,
        designer: SellerId,
        materials: WarehouseId,
        products: WarehouseId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MarketStore::new());
        let stock = StockService::new(Arc::clone(&store));
        let designer = SellerId::new();
        let materials = stock
            .register_warehouse(designer, InventoryKind::Material, "Fabric room")
            .unwrap();
        let products = stock
            .register_warehouse(designer, InventoryKind::Product, "Showroom")
            .unwrap();
        Fixture {
            store,
            stock,
            designer,
            materials,
            products,
        }
    }

    fn receive(f: &Fixture, material: MaterialId, qty: i64) {
        f.stock
            .receive_material(
                f.materials,
                material,
                "Hemp",
                Decimal::new(qty, 0),
                &MovementContext::default(),
            )
            .unwrap();
    }

    #[test]
    fn deduct_consumes_stock_and_logs() {
        let f = fixture();
        let hemp = MaterialId::new();
        receive(&f, hemp, 10);

        let usage = BTreeMap::from([(hemp, Decimal::new(4, 0))]);
        f.stock.deduct(f.designer, &usage).unwrap();

        let item = f.stock.material_stock(f.designer, hemp).unwrap().unwrap();
        assert_eq!(item.quantity(), Decimal::new(6, 0));
        let log = f.store.read(|t| t.inventory_log().to_vec()).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].tx_type, InventoryTxType::SupplierReceipt);
        assert_eq!(log[1].tx_type, InventoryTxType::ProductionUse);
        assert_eq!(log[1].before_qty, Decimal::new(10, 0));
        assert_eq!(log[1].after_qty, Decimal::new(6, 0));
    }

    #[test]
    fn shortage_changes_nothing() {
        let f = fixture();
        let hemp = MaterialId::new();
        let linen = MaterialId::new();
        receive(&f, hemp, 10);
        receive(&f, linen, 2);

        let usage = BTreeMap::from([(hemp, Decimal::new(5, 0)), (linen, Decimal::new(3, 0))]);
        let err = f.stock.deduct(f.designer, &usage).unwrap_err();
        assert!(matches!(
            err,
            MarketError::StockShortage { material, .. } if material == linen
        ));
        let hemp_item = f.stock.material_stock(f.designer, hemp).unwrap().unwrap();
        assert_eq!(hemp_item.quantity(), Decimal::new(10, 0));
        assert_eq!(f.store.read(|t| t.inventory_log().len()).unwrap(), 2);
    }

    #[test]
    fn missing_material_is_a_shortage() {
        let f = fixture();
        let usage = BTreeMap::from([(MaterialId::new(), Decimal::ONE)]);
        assert!(matches!(
            f.stock.deduct(f.designer, &usage).unwrap_err(),
            MarketError::StockShortage { .. }
        ));
    }

    #[test]
    fn product_stock_is_created_then_topped_up() {
        let f = fixture();
        let product = ProductId::new();
        let change = ProductStockChange {
            product_id: product,
            warehouse_id: f.products,
            quantity: Decimal::new(3, 0),
            sku: "TEE-M-GRN".into(),
        };
        f.stock.add_product_stock(&[change.clone()]).unwrap();
        f.stock.add_product_stock(&[change]).unwrap();

        let item = f
            .store
            .read(|t| {
                t.find_stock_in_warehouse(f.products, StockItemRef::Product(product))
                    .cloned()
            })
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity(), Decimal::new(6, 0));
        assert_eq!(item.name, "TEE-M-GRN");
        assert_eq!(f.stock.quantity_of(item.id).unwrap(), Decimal::new(6, 0));
        let log = f.store.read(|t| t.inventory_log().to_vec()).unwrap();
        assert!(log
            .iter()
            .all(|e| e.tx_type == InventoryTxType::ProductionOutput));
    }

    #[test]
    fn product_into_material_warehouse_is_rejected() {
        let f = fixture();
        let change = ProductStockChange {
            product_id: ProductId::new(),
            warehouse_id: f.materials,
            quantity: Decimal::ONE,
            sku: "X".into(),
        };
        assert!(f.stock.add_product_stock(&[change]).is_err());
        assert!(f.store.read(|t| t.inventory_log().is_empty()).unwrap());
    }
}
