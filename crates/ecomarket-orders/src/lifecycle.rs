//! Order lifecycle: payment, fulfillment and cancellation transitions, plus
//! the read side (views with the legacy fulfillment projection applied).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ecomarket_store::{MarketStore, Tables};
use ecomarket_types::{
    Order, OrderDetail, OrderDetailStatus, OrderGroupId, OrderGroupView, OrderId, OrderView,
    Result, UserId,
};

/// Drives orders through their state machine.
pub struct OrderLifecycle {
    store: Arc<MarketStore>,
}

impl OrderLifecycle {
    #[must_use]
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    // =================================================================
    // Transitions
    // =================================================================

    /// Record a captured payment. Confirms the order's lines and counts the
    /// order towards its group. Confirming an already paid order is a no-op.
    ///
    /// # Errors
    /// `SessionExpired` past the hold, `InvalidTransition` for a cancelled
    /// or refunded order.
    pub fn confirm_payment(&self, order_id: OrderId) -> Result<OrderView> {
        self.confirm_payment_at(order_id, Utc::now())
    }

    pub fn confirm_payment_at(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<OrderView> {
        let (view, newly_paid) = self.store.transaction("confirm_payment", |t| {
            let order = t.order_mut(order_id)?;
            let newly_paid = order.apply_payment_confirmed(now)?;
            let group_id = order.group_id;
            if newly_paid {
                t.set_line_status(order_id, OrderDetailStatus::Confirmed)?;
                t.group_mut(group_id)?.record_completion()?;
            }
            Ok((project(t, order_id)?, newly_paid))
        })?;
        if newly_paid {
            tracing::info!(order = %order_id, total = %view.total_price, "payment confirmed");
        } else {
            tracing::debug!(order = %order_id, "payment already confirmed");
        }
        Ok(view)
    }

    pub fn fail_payment(&self, order_id: OrderId) -> Result<OrderView> {
        let now = Utc::now();
        let view = self.store.transaction("fail_payment", |t| {
            t.order_mut(order_id)?.apply_payment_failed(now)?;
            project(t, order_id)
        })?;
        tracing::info!(order = %order_id, "payment failed");
        Ok(view)
    }

    pub fn mark_shipped(&self, order_id: OrderId) -> Result<OrderView> {
        let now = Utc::now();
        let view = self.store.transaction("mark_shipped", |t| {
            t.order_mut(order_id)?.apply_shipped(now)?;
            project(t, order_id)
        })?;
        tracing::info!(order = %order_id, "order shipped");
        Ok(view)
    }

    pub fn mark_delivered(&self, order_id: OrderId) -> Result<OrderView> {
        let now = Utc::now();
        let view = self.store.transaction("mark_delivered", |t| {
            t.order_mut(order_id)?.apply_delivered(now)?;
            project(t, order_id)
        })?;
        tracing::info!(order = %order_id, "order delivered");
        Ok(view)
    }

    /// Cancel an unfulfilled order and its lines.
    pub fn cancel(&self, order_id: OrderId) -> Result<OrderView> {
        let now = Utc::now();
        let view = self.store.transaction("cancel", |t| {
            t.order_mut(order_id)?.apply_cancel(now)?;
            t.set_line_status(order_id, OrderDetailStatus::Cancelled)?;
            project(t, order_id)
        })?;
        tracing::info!(order = %order_id, payment = %view.payment_status, "order cancelled");
        Ok(view)
    }

    /// Persist the fulfillment correction for every paid order that still
    /// records no fulfillment. Returns how many orders were rewritten.
    pub fn repair_legacy_fulfillment(&self) -> Result<usize> {
        let now = Utc::now();
        let repaired = self.store.transaction("repair_legacy_fulfillment", |t| {
            Ok(t
                .orders_mut()
                .map(|o| o.repair_fulfillment(now))
                .filter(|repaired| *repaired)
                .count())
        })?;
        if repaired > 0 {
            tracing::info!(repaired, "legacy fulfillment repaired");
        }
        Ok(repaired)
    }

    // =================================================================
    // Reads
    // =================================================================

    pub fn get_order(&self, order_id: OrderId) -> Result<OrderView> {
        self.store.read(|t| project(t, order_id))?
    }

    /// Every order, oldest first.
    pub fn list_orders(&self) -> Result<Vec<OrderView>> {
        self.store.read(|t| t.orders().map(|o| view_of(t, o)).collect())
    }

    pub fn list_orders_for_customer(&self, customer_id: UserId) -> Result<Vec<OrderView>> {
        self.store.read(|t| {
            t.orders()
                .filter(|o| o.customer_id == customer_id)
                .map(|o| view_of(t, o))
                .collect()
        })
    }

    pub fn get_group(&self, group_id: OrderGroupId) -> Result<OrderGroupView> {
        self.get_group_at(group_id, Utc::now())
    }

    /// Group view with its effective status at `now`.
    pub fn get_group_at(&self, group_id: OrderGroupId, now: DateTime<Utc>) -> Result<OrderGroupView> {
        self.store.read(|t| {
            let group = t.group(group_id)?;
            let orders = t.orders_in_group(group_id).map(|o| view_of(t, o)).collect();
            Ok(OrderGroupView::project(group, orders, now))
        })?
    }

    pub fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderDetail>> {
        self.store.read(|t| {
            t.order(order_id)?;
            Ok(t.lines_of(order_id).to_vec())
        })?
    }
}

fn view_of(tables: &Tables, order: &Order) -> OrderView {
    let lines: Vec<&OrderDetail> = tables.lines_of(order.id).iter().collect();
    OrderView::project(order, &lines)
}

fn project(tables: &Tables, order_id: OrderId) -> Result<OrderView> {
    Ok(view_of(tables, tables.order(order_id)?))
}
