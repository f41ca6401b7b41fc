//! Checkout request/response types (the session builder's wire contract).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    DesignId, ItemType, LineItem, MarketError, MaterialId, Order, OrderGroupId, OrderId,
    PaymentStatus, Result, Seller, SellerId, SellerType,
};

/// One cart line as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub seller_id: SellerId,
    pub seller_type: SellerType,
    pub item_type: ItemType,
    #[serde(default)]
    pub material_id: Option<MaterialId>,
    #[serde(default)]
    pub design_id: Option<DesignId>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl CartItem {
    #[must_use]
    pub fn material(
        seller: Seller,
        material_id: MaterialId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            seller_id: seller.id,
            seller_type: seller.seller_type,
            item_type: ItemType::Material,
            material_id: Some(material_id),
            design_id: None,
            quantity,
            unit_price,
        }
    }

    #[must_use]
    pub fn design(seller: Seller, design_id: DesignId, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            seller_id: seller.id,
            seller_type: seller.seller_type,
            item_type: ItemType::Design,
            material_id: None,
            design_id: Some(design_id),
            quantity,
            unit_price,
        }
    }

    #[must_use]
    pub fn seller(&self) -> Seller {
        Seller {
            id: self.seller_id,
            seller_type: self.seller_type,
        }
    }

    /// `quantity × unit_price`, or `None` if that overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price)
    }

    /// Validate the line and resolve which item it refers to.
    ///
    /// # Errors
    /// `InvalidCartItem` naming `index` for a zero quantity, a negative
    /// price, a line total out of range, or an id that does not match
    /// `item_type`.
    pub fn validate(&self, index: usize) -> Result<LineItem> {
        let bad = |reason: &str| MarketError::InvalidCartItem {
            index,
            reason: reason.to_string(),
        };
        if self.quantity == 0 {
            return Err(bad("quantity must be positive"));
        }
        if self.unit_price.is_sign_negative() {
            return Err(bad("unit price must not be negative"));
        }
        if self.line_total().is_none() {
            return Err(bad("line total is out of range"));
        }
        match (self.item_type, self.material_id, self.design_id) {
            (ItemType::Material, Some(id), None) => Ok(LineItem::Material(id)),
            (ItemType::Design, None, Some(id)) => Ok(LineItem::Design(id)),
            (_, Some(_), Some(_)) => Err(bad("both materialId and designId are set")),
            (ItemType::Material, _, _) => Err(bad("material item without materialId")),
            (ItemType::Design, _, _) => Err(bad("design item without designId")),
        }
    }
}

/// Body of the checkout entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub shipping_address: String,
    /// Minutes to hold the session. `<= 0` means the configured default.
    #[serde(default)]
    pub hold_minutes: i64,
    pub items: Vec<CartItem>,
}

impl CreateSessionRequest {
    /// Σ(quantity × unit price) over the whole cart, `None` on overflow.
    #[must_use]
    pub fn cart_total(&self) -> Option<Decimal> {
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total()?))
    }
}

/// One seller-scoped order in the checkout response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOrderView {
    pub order_id: OrderId,
    pub seller_type: SellerType,
    pub seller_id: SellerId,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
}

impl From<&Order> for CheckoutOrderView {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            seller_type: order.seller.seller_type,
            seller_id: order.seller.id,
            subtotal: order.subtotal(),
            shipping_fee: order.shipping_fee(),
            discount: order.discount(),
            total_amount: order.total(),
            payment_status: order.payment_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub order_group_id: OrderGroupId,
    pub expires_at: DateTime<Utc>,
    pub orders: Vec<CheckoutOrderView>,
}

impl CreateSessionResponse {
    #[must_use]
    pub fn total_amount(&self) -> Option<Decimal> {
        self.orders
            .iter()
            .try_fold(Decimal::ZERO, |acc, o| acc.checked_add(o.total_amount))
    }
}
