//! Checkout session builder.
//!
//! Turns a flat multi-seller cart into one [`OrderGroup`] holding one
//! [`Order`] per seller. All validation happens before the store is touched,
//! and the group, its orders and their lines are written in a single unit of
//! work.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ecomarket_store::MarketStore;
use ecomarket_types::{
    CatalogLookup, CheckoutConfig, CheckoutOrderView, CreateSessionRequest, CreateSessionResponse,
    IdentityLookup, LineItem, MarketError, Order, OrderAmounts, OrderDetail, OrderGroup, Result,
    Seller, UserId, constants,
};
use rust_decimal::Decimal;

/// A validated cart line.
struct ResolvedLine {
    item: LineItem,
    quantity: u32,
    unit_price: Decimal,
}

/// All lines a single seller contributes to the cart.
struct SellerBucket {
    seller: Seller,
    lines: Vec<ResolvedLine>,
    subtotal: Decimal,
}

/// A cart that passed validation, bucketed by seller.
struct ValidatedCart {
    hold_minutes: i64,
    buckets: Vec<SellerBucket>,
    total: Decimal,
}

fn out_of_range(index: usize, what: &str) -> MarketError {
    MarketError::InvalidCartItem {
        index,
        reason: format!("{what} is out of range"),
    }
}

/// Builds checkout sessions.
pub struct CheckoutService {
    store: Arc<MarketStore>,
    catalog: Arc<dyn CatalogLookup>,
    identity: Arc<dyn IdentityLookup>,
    config: CheckoutConfig,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        store: Arc<MarketStore>,
        catalog: Arc<dyn CatalogLookup>,
        identity: Arc<dyn IdentityLookup>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            identity,
            config,
        }
    }

    /// Create a checkout session for `customer_id`.
    ///
    /// # Errors
    /// Validation and not-found errors for a bad cart (nothing is written),
    /// or a store error if the commit fails (nothing is written either).
    pub fn create_session(
        &self,
        customer_id: UserId,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse> {
        self.create_session_at(customer_id, request, Utc::now())
    }

    /// [`Self::create_session`] with an explicit clock.
    pub fn create_session_at(
        &self,
        customer_id: UserId,
        request: &CreateSessionRequest,
        now: DateTime<Utc>,
    ) -> Result<CreateSessionResponse> {
        let ValidatedCart {
            hold_minutes,
            buckets,
            total,
        } = self.validate(request)?;

        let mut group = OrderGroup::new(customer_id, now, now + Duration::minutes(hold_minutes));
        group.total_orders = u32::try_from(buckets.len())
            .map_err(|_| MarketError::Internal("too many sellers in one cart".into()))?;

        let mut orders = Vec::with_capacity(buckets.len());
        let mut lines = Vec::with_capacity(request.items.len());
        for bucket in &buckets {
            let order = Order::new(
                customer_id,
                &group,
                bucket.seller,
                request.shipping_address.trim(),
                OrderAmounts::from_subtotal(bucket.subtotal),
                now,
            )?;
            for line in &bucket.lines {
                lines.push(OrderDetail::new(
                    order.id,
                    line.item,
                    bucket.seller,
                    line.quantity,
                    line.unit_price,
                )?);
            }
            orders.push(order);
        }

        let response = CreateSessionResponse {
            order_group_id: group.id,
            expires_at: group.expires_at,
            orders: orders.iter().map(CheckoutOrderView::from).collect(),
        };

        self.store.transaction("checkout", move |tables| {
            tables.insert_group(group)?;
            for order in orders {
                tables.insert_order(order)?;
            }
            for line in lines {
                tables.insert_line(line)?;
            }
            Ok(())
        })?;

        tracing::info!(
            group = %response.order_group_id,
            customer = %customer_id,
            orders = response.orders.len(),
            total = %total,
            expires_at = %response.expires_at,
            "checkout session created"
        );
        Ok(response)
    }

    /// Validate the whole cart and bucket it by seller, keeping the order in
    /// which each seller first appears. Every amount is summed with checked
    /// arithmetic, so an oversized cart is rejected here.
    fn validate(&self, request: &CreateSessionRequest) -> Result<ValidatedCart> {
        if request.items.is_empty() {
            return Err(MarketError::EmptyCart);
        }
        if request.items.len() > constants::MAX_CART_ITEMS {
            return Err(MarketError::InvalidCartItem {
                index: constants::MAX_CART_ITEMS,
                reason: format!(
                    "cart holds {} items, limit is {}",
                    request.items.len(),
                    constants::MAX_CART_ITEMS
                ),
            });
        }
        if request.shipping_address.trim().is_empty() {
            return Err(MarketError::MissingShippingAddress);
        }
        let hold_minutes = self.config.effective_hold_minutes(request.hold_minutes)?;

        let mut buckets: Vec<SellerBucket> = Vec::new();
        let mut total = Decimal::ZERO;
        for (index, cart_item) in request.items.iter().enumerate() {
            let item = cart_item.validate(index)?;
            match item {
                LineItem::Material(id) if !self.catalog.contains_material(id) => {
                    return Err(MarketError::MaterialNotFound(id));
                }
                LineItem::Design(id) if !self.catalog.contains_design(id) => {
                    return Err(MarketError::DesignNotFound(id));
                }
                _ => {}
            }

            let seller = cart_item.seller();
            if self
                .identity
                .resolve_seller_user(seller.seller_type, seller.id)
                .is_none()
            {
                return Err(MarketError::SellerNotFound {
                    seller_type: seller.seller_type,
                    seller_id: seller.id,
                });
            }

            let line_total = cart_item
                .line_total()
                .ok_or_else(|| out_of_range(index, "line total"))?;
            total = total
                .checked_add(line_total)
                .ok_or_else(|| out_of_range(index, "cart total"))?;

            let line = ResolvedLine {
                item,
                quantity: cart_item.quantity,
                unit_price: cart_item.unit_price,
            };
            match buckets.iter_mut().find(|b| b.seller == seller) {
                Some(bucket) => {
                    bucket.subtotal = bucket
                        .subtotal
                        .checked_add(line_total)
                        .ok_or_else(|| out_of_range(index, "order subtotal"))?;
                    bucket.lines.push(line);
                }
                None => buckets.push(SellerBucket {
                    seller,
                    lines: vec![line],
                    subtotal: line_total,
                }),
            }
        }
        Ok(ValidatedCart {
            hold_minutes,
            buckets,
            total,
        })
    }
}
