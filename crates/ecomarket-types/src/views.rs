//! Read models returned by order queries.
//!
//! Views are projections: they report the legacy fulfillment correction
//! (paid + unfulfilled reads as delivered) without writing it back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    FulfillmentStatus, LineItem, Order, OrderDetail, OrderDetailId, OrderDetailStatus, OrderGroup,
    OrderGroupId, OrderGroupStatus, OrderId, OrderStatus, PaymentStatus, Seller, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub order_detail_id: OrderDetailId,
    pub item: LineItem,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub status: OrderDetailStatus,
}

impl From<&OrderDetail> for OrderLineView {
    fn from(line: &OrderDetail) -> Self {
        Self {
            order_detail_id: line.id,
            item: line.item,
            quantity: line.quantity(),
            unit_price: line.unit_price(),
            line_total: line.line_total(),
            status: line.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: OrderId,
    pub order_group_id: OrderGroupId,
    pub customer_id: UserId,
    pub seller: Seller,
    pub shipping_address: String,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub is_paid_out: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

impl OrderView {
    #[must_use]
    pub fn project(order: &Order, lines: &[&OrderDetail]) -> Self {
        Self {
            order_id: order.id,
            order_group_id: order.group_id,
            customer_id: order.customer_id,
            seller: order.seller,
            shipping_address: order.shipping_address.clone(),
            subtotal: order.subtotal(),
            shipping_fee: order.shipping_fee(),
            discount: order.discount(),
            total_price: order.total(),
            status: order.effective_status(),
            payment_status: order.payment_status,
            fulfillment_status: order.effective_fulfillment(),
            is_paid_out: order.is_paid_out(),
            created_at: order.created_at,
            expires_at: order.expires_at,
            lines: lines.iter().map(|l| OrderLineView::from(*l)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderGroupView {
    pub order_group_id: OrderGroupId,
    pub customer_id: UserId,
    /// Effective status at query time (expiry is applied lazily).
    pub status: OrderGroupStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub total_orders: u32,
    pub completed_orders: u32,
    pub orders: Vec<OrderView>,
}

impl OrderGroupView {
    #[must_use]
    pub fn project(group: &OrderGroup, orders: Vec<OrderView>, now: DateTime<Utc>) -> Self {
        Self {
            order_group_id: group.id,
            customer_id: group.customer_id,
            status: group.status_at(now),
            created_at: group.created_at,
            expires_at: group.expires_at,
            total_orders: group.total_orders,
            completed_orders: group.completed_orders,
            orders,
        }
    }
}
