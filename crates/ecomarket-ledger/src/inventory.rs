//! Inventory transaction log: append-only audit of stock movements.
//!
//! All listings are newest first and joined to the item name and the name
//! of the user who performed the movement.

use std::sync::Arc;

use ecomarket_store::{MarketStore, Tables};
use ecomarket_types::{
    InventoryId, InventoryKind, InventoryTransaction, InventoryTransactionView, Result, SellerId,
};

/// Read/append access to the inventory log.
pub struct InventoryLog {
    store: Arc<MarketStore>,
}

impl InventoryLog {
    #[must_use]
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    /// Append one entry as its own unit of work, applying its change to the
    /// stock item it names.
    ///
    /// # Errors
    /// `StockItemNotFound` if the entry names an unknown stock item.
    /// `InvalidAmount` if `after != before + change`, or if the entry's kind,
    /// warehouse or starting quantity does not match that item.
    /// `StockShortage` if the change would take material stock below zero.
    pub fn append(&self, entry: InventoryTransaction) -> Result<()> {
        let id = entry.id;
        self.store
            .transaction("inventory_append", |t| t.append_inventory_entry(entry))?;
        tracing::debug!(entry = %id, "inventory entry appended");
        Ok(())
    }

    pub fn list_by_inventory(&self, inventory_id: InventoryId) -> Result<Vec<InventoryTransactionView>> {
        self.list_where(|_, e| e.inventory_id == inventory_id)
    }

    /// Entries for stock held in any warehouse owned by `designer_id`.
    pub fn list_by_designer(&self, designer_id: SellerId) -> Result<Vec<InventoryTransactionView>> {
        self.list_where(|t, e| {
            t.warehouse(e.warehouse_id)
                .is_some_and(|w| w.owner == designer_id)
        })
    }

    pub fn list_by_kind(&self, kind: InventoryKind) -> Result<Vec<InventoryTransactionView>> {
        self.list_where(|_, e| e.kind == kind)
    }

    pub fn list_all(&self) -> Result<Vec<InventoryTransactionView>> {
        self.list_where(|_, _| true)
    }

    fn list_where(
        &self,
        keep: impl Fn(&Tables, &InventoryTransaction) -> bool,
    ) -> Result<Vec<InventoryTransactionView>> {
        self.store.read(|t| {
            let mut views: Vec<InventoryTransactionView> = t
                .inventory_log()
                .iter()
                .rev()
                .filter(|e| keep(t, e))
                .map(|e| view_of(t, e))
                .collect();
            views.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
            views
        })
    }
}

fn view_of(tables: &Tables, entry: &InventoryTransaction) -> InventoryTransactionView {
    let item_name = tables
        .stock_item(entry.inventory_id)
        .map(|s| s.name.clone())
        .unwrap_or_default();
    InventoryTransactionView {
        transaction_id: entry.id,
        inventory_type: entry.kind,
        inventory_id: entry.inventory_id,
        item_name,
        performed_by_user_id: entry.performed_by,
        performed_by_user_name: entry
            .performed_by
            .and_then(|u| tables.user_name(u))
            .map(str::to_string),
        quantity_changed: entry.quantity_change,
        before_qty: entry.before_qty,
        after_qty: entry.after_qty,
        transaction_type: entry.tx_type,
        notes: entry.note.clone(),
        transaction_date: entry.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ecomarket_types::{
        InventoryTransactionId, InventoryTxType, MarketError, MaterialId, StockItem, StockItemRef,
        UserId, Warehouse, WarehouseId,
    };
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<MarketStore>,
        log: InventoryLog,
        designer: SellerId,
        item: StockItem,
        user: UserId,
    }

    fn fixture() -> Fixture {
        let designer = SellerId::new();
        let user = UserId::new();
        let warehouse = Warehouse::new(designer, InventoryKind::Material, "Studio");
        let item = StockItem::new(
            StockItemRef::Material(MaterialId::new()),
            warehouse.id,
            designer,
            "Recycled cotton",
        );
        let store = Arc::new(MarketStore::new());
        let stored = item.clone();
        store
            .transaction("seed", |t| {
                t.insert_warehouse(warehouse)?;
                t.insert_stock_item(stored)?;
                t.set_user_name(user, "Mai Tran");
                Ok(())
            })
            .unwrap();
        Fixture {
            log: InventoryLog::new(Arc::clone(&store)),
            store,
            designer,
            item,
            user,
        }
    }

    fn entry(item: &StockItem, before: i64, change: i64, minutes: i64) -> InventoryTransaction {
        InventoryTransaction {
            id: InventoryTransactionId::new(),
            kind: item.kind(),
            inventory_id: item.id,
            warehouse_id: item.warehouse_id,
            tx_type: InventoryTxType::ManualAdjustment,
            quantity_change: Decimal::new(change, 0),
            before_qty: Decimal::new(before, 0),
            after_qty: Decimal::new(before + change, 0),
            reference: None,
            performed_by: None,
            note: String::new(),
            created_at: Utc::now() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn listings_are_newest_first_and_joined() {
        let f = fixture();
        let mut first = entry(&f.item, 0, 10, 0);
        first.performed_by = Some(f.user);
        let second = entry(&f.item, 10, -4, 5);
        let second_id = second.id;
        f.log.append(first).unwrap();
        f.log.append(second).unwrap();

        let all = f.log.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].transaction_id, second_id);
        assert_eq!(all[0].item_name, "Recycled cotton");
        assert_eq!(all[1].performed_by_user_name.as_deref(), Some("Mai Tran"));

        assert_eq!(f.log.list_by_inventory(f.item.id).unwrap().len(), 2);
        assert_eq!(f.log.list_by_designer(f.designer).unwrap().len(), 2);
        assert!(f.log.list_by_designer(SellerId::new()).unwrap().is_empty());
        assert!(f.log.list_by_kind(InventoryKind::Product).unwrap().is_empty());
    }

    #[test]
    fn broken_identity_is_rejected() {
        let f = fixture();
        let mut bad = entry(&f.item, 0, 10, 0);
        bad.after_qty = Decimal::new(11, 0);
        assert!(f.log.append(bad).is_err());
        assert!(f.log.list_all().unwrap().is_empty());
        assert_eq!(f.store.read(|t| t.inventory_log().len()).unwrap(), 0);
    }

    #[test]
    fn unknown_stock_item_is_rejected() {
        let f = fixture();
        let mut orphan = entry(&f.item, 0, 1, 0);
        orphan.inventory_id = InventoryId::new();
        assert!(f.log.append(orphan).is_err());
    }

    #[test]
    fn append_moves_stock() {
        let f = fixture();
        f.log.append(entry(&f.item, 0, 5, 0)).unwrap();
        let qty = f.store.read(|t| t.stock_item(f.item.id).map(StockItem::quantity));
        assert_eq!(qty.unwrap().unwrap(), Decimal::new(5, 0));
    }

    #[test]
    fn entry_contradicting_stock_is_rejected() {
        let f = fixture();
        f.log.append(entry(&f.item, 0, 5, 0)).unwrap();

        let mut foreign = entry(&f.item, 0, -100, 1);
        foreign.kind = InventoryKind::Product;
        foreign.warehouse_id = WarehouseId::new();
        let stale = entry(&f.item, 0, 2, 1);
        let mut wrong_kind = entry(&f.item, 5, 1, 1);
        wrong_kind.kind = InventoryKind::Product;
        let mut wrong_warehouse = entry(&f.item, 5, 1, 1);
        wrong_warehouse.warehouse_id = WarehouseId::new();
        let negative = entry(&f.item, 5, -6, 1);

        for bad in [foreign, stale, wrong_kind, wrong_warehouse] {
            assert!(matches!(
                f.log.append(bad).unwrap_err(),
                MarketError::InvalidAmount { .. }
            ));
        }
        assert!(matches!(
            f.log.append(negative).unwrap_err(),
            MarketError::StockShortage { .. }
        ));

        let qty = f.store.read(|t| t.stock_item(f.item.id).map(StockItem::quantity));
        assert_eq!(qty.unwrap().unwrap(), Decimal::new(5, 0));
        let rows = f.log.list_by_inventory(f.item.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].after_qty, Decimal::new(5, 0));
        assert_eq!(f.log.list_by_designer(f.designer).unwrap().len(), 1);
    }

    #[test]
    fn view_serializes_camel_case() {
        let f = fixture();
        f.log.append(entry(&f.item, 0, 3, 0)).unwrap();
        let wire = serde_json::to_value(&f.log.list_all().unwrap()[0]).unwrap();
        assert!(wire.get("quantityChanged").is_some());
        assert!(wire.get("performedByUserName").is_some());
    }
}
