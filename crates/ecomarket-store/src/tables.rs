//! The persisted tables and their integrity-preserving accessors.
//!
//! `Tables` is only ever mutated inside a [`crate::MarketStore`] unit of
//! work. Accessors enforce ownership: an order needs its group, a line needs
//! its order, and a wallet balance moves only by posting a ledger entry.

use std::collections::{BTreeMap, HashMap};

use ecomarket_types::{
    InventoryId, InventoryTransaction, MarketError, Order, OrderDetail, OrderDetailStatus,
    OrderGroup, OrderGroupId, OrderId, Result, SellerId, StockItem, StockItemRef, UserId, Wallet,
    WalletId, WalletTransaction, Warehouse, WarehouseId,
};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Default)]
pub struct Tables {
    groups: HashMap<OrderGroupId, OrderGroup>,
    /// Keyed by UUIDv7, so iteration is creation order.
    orders: BTreeMap<OrderId, Order>,
    lines: HashMap<OrderId, Vec<OrderDetail>>,
    wallets: HashMap<WalletId, Wallet>,
    wallet_owners: HashMap<UserId, WalletId>,
    wallet_entries: HashMap<WalletId, Vec<WalletTransaction>>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    stock: HashMap<InventoryId, StockItem>,
    inventory_log: Vec<InventoryTransaction>,
    user_names: HashMap<UserId, String>,
}

impl Tables {
    // =================================================================
    // Order groups
    // =================================================================

    pub fn insert_group(&mut self, group: OrderGroup) -> Result<()> {
        if self.groups.contains_key(&group.id) {
            return Err(MarketError::Internal(format!(
                "duplicate order group {}",
                group.id
            )));
        }
        self.groups.insert(group.id, group);
        Ok(())
    }

    pub fn group(&self, id: OrderGroupId) -> Result<&OrderGroup> {
        self.groups.get(&id).ok_or(MarketError::OrderGroupNotFound(id))
    }

    pub fn group_mut(&mut self, id: OrderGroupId) -> Result<&mut OrderGroup> {
        self.groups
            .get_mut(&id)
            .ok_or(MarketError::OrderGroupNotFound(id))
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    // =================================================================
    // Orders and lines
    // =================================================================

    /// Insert an order. Its group must already exist.
    pub fn insert_order(&mut self, order: Order) -> Result<()> {
        if !self.groups.contains_key(&order.group_id) {
            return Err(MarketError::OrderGroupNotFound(order.group_id));
        }
        if self.orders.contains_key(&order.id) {
            return Err(MarketError::Internal(format!("duplicate order {}", order.id)));
        }
        self.lines.entry(order.id).or_default();
        self.orders.insert(order.id, order);
        Ok(())
    }

    pub fn order(&self, id: OrderId) -> Result<&Order> {
        self.orders.get(&id).ok_or(MarketError::OrderNotFound(id))
    }

    pub fn order_mut(&mut self, id: OrderId) -> Result<&mut Order> {
        self.orders.get_mut(&id).ok_or(MarketError::OrderNotFound(id))
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn orders_mut(&mut self) -> impl Iterator<Item = &mut Order> {
        self.orders.values_mut()
    }

    pub fn orders_in_group(&self, group_id: OrderGroupId) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(move |o| o.group_id == group_id)
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Insert a line. Its order must already exist.
    pub fn insert_line(&mut self, line: OrderDetail) -> Result<()> {
        let lines = self
            .lines
            .get_mut(&line.order_id)
            .ok_or(MarketError::OrderNotFound(line.order_id))?;
        lines.push(line);
        Ok(())
    }

    #[must_use]
    pub fn lines_of(&self, order_id: OrderId) -> &[OrderDetail] {
        self.lines.get(&order_id).map_or(&[], Vec::as_slice)
    }

    pub fn set_line_status(&mut self, order_id: OrderId, status: OrderDetailStatus) -> Result<()> {
        let lines = self
            .lines
            .get_mut(&order_id)
            .ok_or(MarketError::OrderNotFound(order_id))?;
        for line in lines {
            line.status = status;
        }
        Ok(())
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.values().map(Vec::len).sum()
    }

    // =================================================================
    // Wallets and ledger entries
    // =================================================================

    pub fn insert_wallet(&mut self, wallet: Wallet) -> Result<()> {
        if self.wallets.contains_key(&wallet.id) {
            return Err(MarketError::WalletAlreadyExists(wallet.id));
        }
        if let Some(owner) = wallet.owner {
            if let Some(existing) = self.wallet_owners.get(&owner) {
                return Err(MarketError::WalletAlreadyExists(*existing));
            }
            self.wallet_owners.insert(owner, wallet.id);
        }
        self.wallet_entries.entry(wallet.id).or_default();
        self.wallets.insert(wallet.id, wallet);
        Ok(())
    }

    pub fn wallet(&self, id: WalletId) -> Result<&Wallet> {
        self.wallets.get(&id).ok_or(MarketError::WalletNotFound(id))
    }

    #[must_use]
    pub fn wallet_of_user(&self, user_id: UserId) -> Option<&Wallet> {
        self.wallet_owners
            .get(&user_id)
            .and_then(|id| self.wallets.get(id))
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    /// Sum of every wallet balance, `None` if it leaves the decimal range.
    #[must_use]
    pub fn total_balance(&self) -> Option<Decimal> {
        self.wallets
            .values()
            .try_fold(Decimal::ZERO, |acc, w| acc.checked_add(w.balance()))
    }

    /// Apply an entry to its wallet and append it to the ledger.
    pub fn post_wallet_entry(&mut self, entry: WalletTransaction) -> Result<()> {
        let wallet = self
            .wallets
            .get_mut(&entry.wallet_id)
            .ok_or(MarketError::WalletNotFound(entry.wallet_id))?;
        wallet.apply(&entry)?;
        self.wallet_entries
            .entry(entry.wallet_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    #[must_use]
    pub fn wallet_entries(&self, wallet_id: WalletId) -> &[WalletTransaction] {
        self.wallet_entries
            .get(&wallet_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Direct entry access for corruption tests.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn wallet_entries_mut(&mut self, wallet_id: WalletId) -> &mut Vec<WalletTransaction> {
        self.wallet_entries.entry(wallet_id).or_default()
    }

    pub fn all_wallet_entries(&self) -> impl Iterator<Item = &WalletTransaction> {
        self.wallet_entries.values().flatten()
    }

    // =================================================================
    // Warehouses and stock
    // =================================================================

    pub fn insert_warehouse(&mut self, warehouse: Warehouse) -> Result<()> {
        if self.warehouses.contains_key(&warehouse.id) {
            return Err(MarketError::Internal(format!(
                "duplicate warehouse {}",
                warehouse.id
            )));
        }
        self.warehouses.insert(warehouse.id, warehouse);
        Ok(())
    }

    #[must_use]
    pub fn warehouse(&self, id: WarehouseId) -> Option<&Warehouse> {
        self.warehouses.get(&id)
    }

    pub fn insert_stock_item(&mut self, item: StockItem) -> Result<()> {
        if !self.warehouses.contains_key(&item.warehouse_id) {
            return Err(MarketError::Internal(format!(
                "stock item {} references unknown warehouse {}",
                item.id, item.warehouse_id
            )));
        }
        self.stock.insert(item.id, item);
        Ok(())
    }

    pub fn stock_item(&self, id: InventoryId) -> Result<&StockItem> {
        self.stock.get(&id).ok_or(MarketError::StockItemNotFound(id))
    }

    /// The stock item an owner holds for `item`, in any warehouse.
    #[must_use]
    pub fn find_stock_by_owner(&self, owner: SellerId, item: StockItemRef) -> Option<&StockItem> {
        self.stock
            .values()
            .find(|s| s.owner == owner && s.item == item)
    }

    #[must_use]
    pub fn find_stock_in_warehouse(
        &self,
        warehouse_id: WarehouseId,
        item: StockItemRef,
    ) -> Option<&StockItem> {
        self.stock
            .values()
            .find(|s| s.warehouse_id == warehouse_id && s.item == item)
    }

    // =================================================================
    // Inventory transaction log
    // =================================================================

    /// Append an entry and apply its change to the stock item it names.
    ///
    /// The entry must describe that item (kind and warehouse) and start from
    /// its current quantity, so the log always replays to the stored stock.
    /// Entries are never edited or removed once written.
    pub fn append_inventory_entry(&mut self, entry: InventoryTransaction) -> Result<()> {
        entry.check_identity()?;
        let item = self
            .stock
            .get_mut(&entry.inventory_id)
            .ok_or(MarketError::StockItemNotFound(entry.inventory_id))?;
        let mismatch = |what: String| MarketError::InvalidAmount {
            reason: format!("inventory entry {}: {what}", entry.id),
        };
        if entry.kind != item.kind() {
            return Err(mismatch(format!(
                "kind {} does not match {} stock {}",
                entry.kind,
                item.kind(),
                item.id
            )));
        }
        if entry.warehouse_id != item.warehouse_id {
            return Err(mismatch(format!(
                "warehouse {} does not hold stock {}",
                entry.warehouse_id, item.id
            )));
        }
        if entry.before_qty != item.quantity() {
            return Err(mismatch(format!(
                "starts from {} but stock {} holds {}",
                entry.before_qty,
                item.id,
                item.quantity()
            )));
        }
        item.adjust(entry.quantity_change)?;
        self.inventory_log.push(entry);
        Ok(())
    }

    #[must_use]
    pub fn inventory_log(&self) -> &[InventoryTransaction] {
        &self.inventory_log
    }

    // =================================================================
    // Users
    // =================================================================

    pub fn set_user_name(&mut self, user_id: UserId, name: impl Into<String>) {
        self.user_names.insert(user_id, name.into());
    }

    #[must_use]
    pub fn user_name(&self, user_id: UserId) -> Option<&str> {
        self.user_names.get(&user_id).map(String::as_str)
    }
}
