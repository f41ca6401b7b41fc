//! # ecomarket-orders
//!
//! The customer-facing half of the settlement core:
//!
//! - [`CheckoutService`] splits a multi-seller cart into one order per
//!   seller under a single checkout session.
//! - [`OrderLifecycle`] moves orders through payment, fulfillment and
//!   cancellation, and serves the order read models.

pub mod checkout;
pub mod lifecycle;

pub use checkout::CheckoutService;
pub use lifecycle::OrderLifecycle;
