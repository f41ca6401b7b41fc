//! Order types: checkout sessions, seller-scoped orders, and order lines.
//!
//! An [`Order`] moves along three orthogonal axes: [`OrderStatus`],
//! [`PaymentStatus`] and [`FulfillmentStatus`]. The transition methods here
//! are pure; the order lifecycle service wraps each one in a store unit of
//! work.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    DesignId, MarketError, MaterialId, OrderDetailId, OrderGroupId, OrderId, Result, SellerId,
    UserId,
};

// ---------------------------------------------------------------------------
// Sellers and items
// ---------------------------------------------------------------------------

/// Which kind of seller profile a [`SellerId`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum SellerType {
    /// Sells raw materials.
    Supplier,
    /// Sells finished designs.
    Designer,
}

impl fmt::Display for SellerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supplier => write!(f, "Supplier"),
            Self::Designer => write!(f, "Designer"),
        }
    }
}

/// A seller identity: profile id plus its kind. Orders are grouped by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Seller {
    pub id: SellerId,
    pub seller_type: SellerType,
}

impl Seller {
    #[must_use]
    pub fn supplier(id: SellerId) -> Self {
        Self {
            id,
            seller_type: SellerType::Supplier,
        }
    }

    #[must_use]
    pub fn designer(id: SellerId) -> Self {
        Self {
            id,
            seller_type: SellerType::Designer,
        }
    }
}

impl fmt::Display for Seller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.seller_type, self.id)
    }
}

/// What a cart line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Material,
    Design,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Material => write!(f, "material"),
            Self::Design => write!(f, "design"),
        }
    }
}

/// The purchased item of an order line. Exactly one of material or design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineItem {
    Material(MaterialId),
    Design(DesignId),
}

impl LineItem {
    #[must_use]
    pub fn item_type(&self) -> ItemType {
        match self {
            Self::Material(_) => ItemType::Material,
            Self::Design(_) => ItemType::Design,
        }
    }
}

// ---------------------------------------------------------------------------
// Status axes
// ---------------------------------------------------------------------------

/// Overall order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Paid => write!(f, "Paid"),
            Self::Failed => write!(f, "Failed"),
            Self::Refunded => write!(f, "Refunded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    None,
    Shipped,
    Delivered,
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Shipped => write!(f, "Shipped"),
            Self::Delivered => write!(f, "Delivered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderGroupStatus {
    InProgress,
    Completed,
    Expired,
}

impl fmt::Display for OrderGroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDetailStatus {
    Pending,
    Confirmed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// OrderGroup
// ---------------------------------------------------------------------------

/// A checkout session. Owns every order created from one cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderGroup {
    pub id: OrderGroupId,
    pub customer_id: UserId,
    /// Stored status. Expiry is never written; see [`OrderGroup::status_at`].
    pub status: OrderGroupStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub total_orders: u32,
    pub completed_orders: u32,
}

impl OrderGroup {
    #[must_use]
    pub fn new(customer_id: UserId, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderGroupId::new(),
            customer_id,
            status: OrderGroupStatus::InProgress,
            created_at,
            expires_at,
            total_orders: 0,
            completed_orders: 0,
        }
    }

    /// Effective status at `now`. An unfinished session past its hold reads
    /// as expired without anyone having to write that down.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> OrderGroupStatus {
        match self.status {
            OrderGroupStatus::InProgress if now > self.expires_at => OrderGroupStatus::Expired,
            other => other,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_orders > 0 && self.completed_orders >= self.total_orders
    }

    /// Count one more order as completed. Flips the group to `Completed`
    /// when every order is done.
    pub fn record_completion(&mut self) -> Result<()> {
        if self.completed_orders >= self.total_orders {
            return Err(MarketError::Internal(format!(
                "group {} already has {}/{} orders completed",
                self.id, self.completed_orders, self.total_orders
            )));
        }
        self.completed_orders += 1;
        if self.is_complete() {
            self.status = OrderGroupStatus::Completed;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Money breakdown fixed when an order is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmounts {
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
}

impl OrderAmounts {
    /// Amounts for a subtotal with no shipping and no discount.
    #[must_use]
    pub fn from_subtotal(subtotal: Decimal) -> Self {
        Self {
            subtotal,
            shipping_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
        }
    }

    /// `subtotal + shipping_fee - discount`, `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<Decimal> {
        self.subtotal
            .checked_add(self.shipping_fee)?
            .checked_sub(self.discount)
    }

    /// The total of a well-formed breakdown.
    ///
    /// # Errors
    /// `InvalidAmount` if any component is negative, the total is out of
    /// range, or the discount exceeds the order value.
    pub fn checked_total(&self) -> Result<Decimal> {
        if self.subtotal.is_sign_negative()
            || self.shipping_fee.is_sign_negative()
            || self.discount.is_sign_negative()
        {
            return Err(MarketError::InvalidAmount {
                reason: format!("negative order component: {self:?}"),
            });
        }
        let total = self.total().ok_or_else(|| MarketError::InvalidAmount {
            reason: format!("order total out of range: {self:?}"),
        })?;
        if total.is_sign_negative() {
            return Err(MarketError::InvalidAmount {
                reason: format!("discount {} exceeds order value", self.discount),
            });
        }
        Ok(total)
    }
}

/// A seller-scoped order.
///
/// Monetary fields and the paid-out flag are private: the total is fixed at
/// construction and `is_paid_out` only ever moves `false -> true`. A
/// deserialized order must carry a total that matches its breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "OrderRecord")]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub group_id: OrderGroupId,
    pub seller: Seller,
    pub shipping_address: String,
    subtotal: Decimal,
    shipping_fee: Decimal,
    discount: Decimal,
    total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    is_paid_out: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create an order in its initial state `{pending, Pending, None}`.
    ///
    /// # Errors
    /// `InvalidAmount` if any component is negative, the total would be, or
    /// the total is out of range.
    pub fn new(
        customer_id: UserId,
        group: &OrderGroup,
        seller: Seller,
        shipping_address: impl Into<String>,
        amounts: OrderAmounts,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let total = amounts.checked_total()?;
        Ok(Self {
            id: OrderId::new(),
            customer_id,
            group_id: group.id,
            seller,
            shipping_address: shipping_address.into(),
            subtotal: amounts.subtotal,
            shipping_fee: amounts.shipping_fee,
            discount: amounts.discount,
            total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            fulfillment_status: FulfillmentStatus::None,
            is_paid_out: false,
            expires_at: group.expires_at,
            created_at,
            updated_at: created_at,
        })
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    #[must_use]
    pub fn shipping_fee(&self) -> Decimal {
        self.shipping_fee
    }

    #[must_use]
    pub fn discount(&self) -> Decimal {
        self.discount
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        self.total
    }

    #[must_use]
    pub fn is_paid_out(&self) -> bool {
        self.is_paid_out
    }

    fn state(&self) -> String {
        format!(
            "{}/{}/{}",
            self.status, self.payment_status, self.fulfillment_status
        )
    }

    fn invalid(&self, action: &'static str) -> MarketError {
        MarketError::InvalidTransition {
            order_id: self.id,
            action,
            state: self.state(),
        }
    }

    // -- legacy fulfillment correction ------------------------------------

    /// Paid orders created before fulfillment tracking existed carry
    /// `fulfillment = None`. They are treated as delivered.
    #[must_use]
    pub fn needs_fulfillment_repair(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
            && self.fulfillment_status == FulfillmentStatus::None
    }

    #[must_use]
    pub fn effective_fulfillment(&self) -> FulfillmentStatus {
        if self.needs_fulfillment_repair() {
            FulfillmentStatus::Delivered
        } else {
            self.fulfillment_status
        }
    }

    #[must_use]
    pub fn effective_status(&self) -> OrderStatus {
        if self.needs_fulfillment_repair() {
            OrderStatus::Delivered
        } else {
            self.status
        }
    }

    /// Persist the legacy correction. Returns whether anything changed.
    pub fn repair_fulfillment(&mut self, now: DateTime<Utc>) -> bool {
        if !self.needs_fulfillment_repair() {
            return false;
        }
        self.fulfillment_status = FulfillmentStatus::Delivered;
        self.status = OrderStatus::Delivered;
        self.updated_at = now;
        true
    }

    // -- transitions --------------------------------------------------------

    /// Payment captured. Returns `false` if the order was already paid.
    pub fn apply_payment_confirmed(&mut self, now: DateTime<Utc>) -> Result<bool> {
        match self.payment_status {
            PaymentStatus::Paid => return Ok(false),
            PaymentStatus::Refunded => return Err(self.invalid("confirm payment")),
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }
        if self.status == OrderStatus::Cancelled {
            return Err(self.invalid("confirm payment"));
        }
        if now > self.expires_at {
            return Err(MarketError::SessionExpired(self.group_id));
        }
        self.payment_status = PaymentStatus::Paid;
        self.status = OrderStatus::Processing;
        self.updated_at = now;
        Ok(true)
    }

    pub fn apply_payment_failed(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.payment_status != PaymentStatus::Pending || self.status == OrderStatus::Cancelled {
            return Err(self.invalid("fail payment"));
        }
        self.payment_status = PaymentStatus::Failed;
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_shipped(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.payment_status != PaymentStatus::Paid
            || self.fulfillment_status != FulfillmentStatus::None
            || self.status == OrderStatus::Cancelled
        {
            return Err(self.invalid("ship"));
        }
        self.fulfillment_status = FulfillmentStatus::Shipped;
        self.status = OrderStatus::Shipped;
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_delivered(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.payment_status != PaymentStatus::Paid
            || self.fulfillment_status == FulfillmentStatus::Delivered
            || self.status == OrderStatus::Cancelled
        {
            return Err(self.invalid("deliver"));
        }
        self.fulfillment_status = FulfillmentStatus::Delivered;
        self.status = OrderStatus::Delivered;
        self.updated_at = now;
        Ok(())
    }

    /// Cancel before anything shipped. A captured payment becomes `Refunded`.
    pub fn apply_cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status == OrderStatus::Cancelled
            || self.fulfillment_status != FulfillmentStatus::None
            || self.is_paid_out
        {
            return Err(self.invalid("cancel"));
        }
        if self.payment_status == PaymentStatus::Paid {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    // -- settlement ---------------------------------------------------------

    #[must_use]
    pub fn is_eligible_for_payout(&self) -> bool {
        !self.is_paid_out && self.effective_fulfillment() == FulfillmentStatus::Delivered
    }

    /// Terminal settlement flag.
    ///
    /// # Errors
    /// `AlreadyPaidOut` if the flag is already set.
    pub fn mark_paid_out(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.is_paid_out {
            return Err(MarketError::AlreadyPaidOut(self.id));
        }
        self.is_paid_out = true;
        self.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OrderDetail
// ---------------------------------------------------------------------------

/// One line of an order. Quantity and price are fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "OrderDetailRecord")]
pub struct OrderDetail {
    pub id: OrderDetailId,
    pub order_id: OrderId,
    pub item: LineItem,
    pub seller: Seller,
    quantity: u32,
    unit_price: Decimal,
    line_total: Decimal,
    pub status: OrderDetailStatus,
}

impl OrderDetail {
    /// # Errors
    /// `InvalidAmount` for a zero quantity, a negative price, or a line total
    /// out of range.
    pub fn new(
        order_id: OrderId,
        item: LineItem,
        seller: Seller,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<Self> {
        let line_total = line_total(quantity, unit_price)?;
        Ok(Self {
            id: OrderDetailId::new(),
            order_id,
            item,
            seller,
            quantity,
            unit_price,
            line_total,
            status: OrderDetailStatus::Pending,
        })
    }

    #[must_use]
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.line_total
    }

    #[must_use]
    pub fn material_id(&self) -> Option<MaterialId> {
        match self.item {
            LineItem::Material(id) => Some(id),
            LineItem::Design(_) => None,
        }
    }

    #[must_use]
    pub fn design_id(&self) -> Option<DesignId> {
        match self.item {
            LineItem::Design(id) => Some(id),
            LineItem::Material(_) => None,
        }
    }

    #[must_use]
    pub fn supplier_id(&self) -> Option<SellerId> {
        (self.seller.seller_type == SellerType::Supplier).then_some(self.seller.id)
    }

    #[must_use]
    pub fn designer_id(&self) -> Option<SellerId> {
        (self.seller.seller_type == SellerType::Designer).then_some(self.seller.id)
    }
}

fn line_total(quantity: u32, unit_price: Decimal) -> Result<Decimal> {
    if quantity == 0 {
        return Err(MarketError::InvalidAmount {
            reason: "line quantity must be positive".into(),
        });
    }
    if unit_price.is_sign_negative() {
        return Err(MarketError::InvalidAmount {
            reason: format!("negative unit price {unit_price}"),
        });
    }
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| MarketError::InvalidAmount {
            reason: format!("line total of {quantity} x {unit_price} is out of range"),
        })
}

// ---------------------------------------------------------------------------
// Stored forms
// ---------------------------------------------------------------------------

/// Wire shape of [`Order`]; converted through the same checks as
/// [`Order::new`].
#[derive(Deserialize)]
struct OrderRecord {
    id: OrderId,
    customer_id: UserId,
    group_id: OrderGroupId,
    seller: Seller,
    shipping_address: String,
    subtotal: Decimal,
    shipping_fee: Decimal,
    discount: Decimal,
    total: Decimal,
    status: OrderStatus,
    payment_status: PaymentStatus,
    fulfillment_status: FulfillmentStatus,
    is_paid_out: bool,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = MarketError;

    fn try_from(r: OrderRecord) -> Result<Self> {
        let amounts = OrderAmounts {
            subtotal: r.subtotal,
            shipping_fee: r.shipping_fee,
            discount: r.discount,
        };
        let total = amounts.checked_total()?;
        if total != r.total {
            return Err(MarketError::InvalidAmount {
                reason: format!("order {} carries total {}, breakdown gives {total}", r.id, r.total),
            });
        }
        Ok(Self {
            id: r.id,
            customer_id: r.customer_id,
            group_id: r.group_id,
            seller: r.seller,
            shipping_address: r.shipping_address,
            subtotal: r.subtotal,
            shipping_fee: r.shipping_fee,
            discount: r.discount,
            total,
            status: r.status,
            payment_status: r.payment_status,
            fulfillment_status: r.fulfillment_status,
            is_paid_out: r.is_paid_out,
            expires_at: r.expires_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Deserialize)]
struct OrderDetailRecord {
    id: OrderDetailId,
    order_id: OrderId,
    item: LineItem,
    seller: Seller,
    quantity: u32,
    unit_price: Decimal,
    line_total: Decimal,
    status: OrderDetailStatus,
}

impl TryFrom<OrderDetailRecord> for OrderDetail {
    type Error = MarketError;

    fn try_from(r: OrderDetailRecord) -> Result<Self> {
        let line_total = line_total(r.quantity, r.unit_price)?;
        if line_total != r.line_total {
            return Err(MarketError::InvalidAmount {
                reason: format!("line {} carries total {}, expected {line_total}", r.id, r.line_total),
            });
        }
        Ok(Self {
            id: r.id,
            order_id: r.order_id,
            item: r.item,
            seller: r.seller,
            quantity: r.quantity,
            unit_price: r.unit_price,
            line_total,
            status: r.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn group(now: DateTime<Utc>) -> OrderGroup {
        OrderGroup::new(UserId::new(), now, now + Duration::minutes(30))
    }

    fn order(now: DateTime<Utc>, subtotal: i64) -> Order {
        Order::new(
            UserId::new(),
            &group(now),
            Seller::supplier(SellerId::new()),
            "1 Loom Street",
            OrderAmounts::from_subtotal(Decimal::new(subtotal, 0)),
            now,
        )
        .unwrap()
    }

    #[test]
    fn new_order_initial_state() {
        let o = order(Utc::now(), 20);
        assert_eq!(o.status, OrderStatus::Pending);
        assert_eq!(o.payment_status, PaymentStatus::Pending);
        assert_eq!(o.fulfillment_status, FulfillmentStatus::None);
        assert!(!o.is_paid_out());
        assert_eq!(o.total(), Decimal::new(20, 0));
    }

    #[test]
    fn discount_cannot_exceed_value() {
        let now = Utc::now();
        let err = Order::new(
            UserId::new(),
            &group(now),
            Seller::designer(SellerId::new()),
            "addr",
            OrderAmounts {
                subtotal: Decimal::new(10, 0),
                shipping_fee: Decimal::ZERO,
                discount: Decimal::new(11, 0),
            },
            now,
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::InvalidAmount { .. }));
    }

    #[test]
    fn happy_path_transitions() {
        let now = Utc::now();
        let mut o = order(now, 50);
        assert!(o.apply_payment_confirmed(now).unwrap());
        assert_eq!(o.status, OrderStatus::Processing);
        assert!(!o.apply_payment_confirmed(now).unwrap(), "second confirm is a no-op");
        o.apply_shipped(now).unwrap();
        assert_eq!(o.status, OrderStatus::Shipped);
        o.apply_delivered(now).unwrap();
        assert_eq!(o.fulfillment_status, FulfillmentStatus::Delivered);
        assert!(o.is_eligible_for_payout());
    }

    #[test]
    fn cannot_ship_unpaid() {
        let now = Utc::now();
        let mut o = order(now, 50);
        let err = o.apply_shipped(now).unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { action: "ship", .. }));
    }

    #[test]
    fn payment_after_hold_is_rejected() {
        let now = Utc::now();
        let mut o = order(now, 50);
        let err = o
            .apply_payment_confirmed(now + Duration::minutes(31))
            .unwrap_err();
        assert!(matches!(err, MarketError::SessionExpired(_)));
        assert_eq!(o.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn failed_payment_can_be_retried() {
        let now = Utc::now();
        let mut o = order(now, 50);
        o.apply_payment_failed(now).unwrap();
        assert_eq!(o.payment_status, PaymentStatus::Failed);
        assert!(o.apply_payment_confirmed(now).unwrap());
    }

    #[test]
    fn cancel_paid_order_refunds() {
        let now = Utc::now();
        let mut o = order(now, 50);
        o.apply_payment_confirmed(now).unwrap();
        o.apply_cancel(now).unwrap();
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert_eq!(o.payment_status, PaymentStatus::Refunded);
        assert!(!o.needs_fulfillment_repair());
        assert!(!o.is_eligible_for_payout());
    }

    #[test]
    fn legacy_paid_order_projects_as_delivered() {
        let now = Utc::now();
        let mut o = order(now, 50);
        o.payment_status = PaymentStatus::Paid;
        assert_eq!(o.fulfillment_status, FulfillmentStatus::None);
        assert_eq!(o.effective_fulfillment(), FulfillmentStatus::Delivered);
        assert_eq!(o.effective_status(), OrderStatus::Delivered);
        assert!(o.is_eligible_for_payout());

        assert!(o.repair_fulfillment(now));
        assert_eq!(o.fulfillment_status, FulfillmentStatus::Delivered);
        assert_eq!(o.status, OrderStatus::Delivered);
        assert!(!o.repair_fulfillment(now), "repair is idempotent");
    }

    #[test]
    fn paid_out_is_terminal() {
        let now = Utc::now();
        let mut o = order(now, 50);
        o.mark_paid_out(now).unwrap();
        let err = o.mark_paid_out(now).unwrap_err();
        assert!(matches!(err, MarketError::AlreadyPaidOut(id) if id == o.id));
        assert!(!o.is_eligible_for_payout());
    }

    #[test]
    fn group_expires_lazily_unless_complete() {
        let now = Utc::now();
        let mut g = group(now);
        g.total_orders = 1;
        assert_eq!(g.status_at(now), OrderGroupStatus::InProgress);
        assert_eq!(
            g.status_at(now + Duration::minutes(31)),
            OrderGroupStatus::Expired
        );
        assert_eq!(g.status, OrderGroupStatus::InProgress, "expiry is never written");

        g.record_completion().unwrap();
        assert_eq!(g.status, OrderGroupStatus::Completed);
        assert_eq!(
            g.status_at(now + Duration::minutes(31)),
            OrderGroupStatus::Completed
        );
        assert!(g.record_completion().is_err(), "completed never exceeds total");
    }

    #[test]
    fn detail_tags_are_mutually_exclusive() {
        let material = MaterialId::new();
        let supplier = SellerId::new();
        let line = OrderDetail::new(
            OrderId::new(),
            LineItem::Material(material),
            Seller::supplier(supplier),
            2,
            Decimal::new(10, 0),
        )
        .unwrap();
        assert_eq!(line.material_id(), Some(material));
        assert_eq!(line.design_id(), None);
        assert_eq!(line.supplier_id(), Some(supplier));
        assert_eq!(line.designer_id(), None);
        assert_eq!(line.line_total(), Decimal::new(20, 0));
    }

    #[test]
    fn detail_rejects_zero_quantity() {
        let err = OrderDetail::new(
            OrderId::new(),
            LineItem::Design(DesignId::new()),
            Seller::designer(SellerId::new()),
            0,
            Decimal::ONE,
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::InvalidAmount { .. }));
    }

    #[test]
    fn detail_rejects_line_total_overflow() {
        let err = OrderDetail::new(
            OrderId::new(),
            LineItem::Material(MaterialId::new()),
            Seller::supplier(SellerId::new()),
            2,
            Decimal::MAX,
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::InvalidAmount { .. }));
    }

    #[test]
    fn order_total_overflow_is_rejected() {
        let now = Utc::now();
        let err = Order::new(
            UserId::new(),
            &group(now),
            Seller::supplier(SellerId::new()),
            "addr",
            OrderAmounts {
                subtotal: Decimal::MAX,
                shipping_fee: Decimal::ONE,
                discount: Decimal::ZERO,
            },
            now,
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::InvalidAmount { .. }));
    }

    #[test]
    fn stored_order_round_trips() {
        let o = order(Utc::now(), 42);
        let json = serde_json::to_string(&o).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, o.id);
        assert_eq!(back.total(), Decimal::new(42, 0));
    }

    #[test]
    fn stored_order_with_edited_total_is_rejected() {
        let o = order(Utc::now(), 42);
        let mut json = serde_json::to_value(&o).unwrap();
        json["total"] = serde_json::Value::String("1".into());
        assert!(serde_json::from_value::<Order>(json).is_err());
    }

    #[test]
    fn stored_line_with_edited_total_is_rejected() {
        let line = OrderDetail::new(
            OrderId::new(),
            LineItem::Design(DesignId::new()),
            Seller::designer(SellerId::new()),
            3,
            Decimal::new(5, 0),
        )
        .unwrap();
        let mut json = serde_json::to_value(&line).unwrap();
        assert!(serde_json::from_value::<OrderDetail>(json.clone()).is_ok());
        json["line_total"] = serde_json::Value::String("1".into());
        assert!(serde_json::from_value::<OrderDetail>(json).is_err());
    }

    #[test]
    fn status_serializes_like_the_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Delivered).unwrap(),
            "\"delivered\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Paid).unwrap(),
            "\"Paid\""
        );
        assert_eq!(serde_json::to_string(&ItemType::Design).unwrap(), "\"design\"");
    }
}
