//! Error types for the EcoMarket settlement core.
//!
//! All errors use the `EM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by how callers must react:
//! - 1xx: Validation (rejected synchronously, nothing mutated)
//! - 2xx: Not found
//! - 3xx: Conflict (state already reached)
//! - 4xx: Integrity (funds, stock, ledger invariants)
//! - 8xx: Transient store errors (retry later)
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    DesignId, InventoryId, MaterialId, OrderGroupId, OrderId, SellerId, SellerType, UserId,
    WalletId,
};

/// Central error enum for all EcoMarket operations.
#[derive(Debug, Error)]
pub enum MarketError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Checkout was attempted with no items.
    #[error("EM_ERR_100: Cart is empty")]
    EmptyCart,

    /// A cart line failed validation.
    #[error("EM_ERR_101: Invalid cart item #{index}: {reason}")]
    InvalidCartItem { index: usize, reason: String },

    /// The shipping address is blank.
    #[error("EM_ERR_102: Shipping address is required")]
    MissingShippingAddress,

    /// A monetary amount or quantity is out of range.
    #[error("EM_ERR_103: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The requested lifecycle transition is not allowed from the current state.
    #[error("EM_ERR_104: Order {order_id} cannot {action} while {state}")]
    InvalidTransition {
        order_id: OrderId,
        action: &'static str,
        state: String,
    },

    /// The checkout hold elapsed before payment was confirmed.
    #[error("EM_ERR_105: Checkout session {0} has expired")]
    SessionExpired(OrderGroupId),

    // =================================================================
    // Not Found Errors (2xx)
    // =================================================================
    #[error("EM_ERR_200: Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("EM_ERR_201: Order group not found: {0}")]
    OrderGroupNotFound(OrderGroupId),

    #[error("EM_ERR_202: Wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// The identity directory has no user behind this seller profile.
    #[error("EM_ERR_203: Seller not found: {seller_type} {seller_id}")]
    SellerNotFound {
        seller_type: SellerType,
        seller_id: SellerId,
    },

    /// The seller's user account exists but owns no wallet.
    #[error("EM_ERR_204: No wallet for user {0}")]
    SellerWalletNotFound(UserId),

    #[error("EM_ERR_205: Material not found: {0}")]
    MaterialNotFound(MaterialId),

    #[error("EM_ERR_206: Design not found: {0}")]
    DesignNotFound(DesignId),

    #[error("EM_ERR_207: Stock item not found: {0}")]
    StockItemNotFound(InventoryId),

    // =================================================================
    // Conflict Errors (3xx)
    // =================================================================
    /// The order has already been settled to its seller.
    #[error("EM_ERR_300: Order already paid out: {0}")]
    AlreadyPaidOut(OrderId),

    #[error("EM_ERR_301: Wallet already exists: {0}")]
    WalletAlreadyExists(WalletId),

    // =================================================================
    // Integrity Errors (4xx)
    // =================================================================
    /// Source wallet cannot cover a transfer.
    #[error("EM_ERR_400: Insufficient funds in {wallet}: need {needed}, have {available}")]
    InsufficientFunds {
        wallet: WalletId,
        needed: Decimal,
        available: Decimal,
    },

    /// A ledger entry or chain does not line up with the wallet it belongs to.
    #[error("EM_ERR_401: Ledger integrity violation: {reason}")]
    LedgerIntegrity { reason: String },

    /// Not enough stock of a material to cover a deduction.
    #[error("EM_ERR_402: Stock shortage for {material}: need {needed}, have {available}")]
    StockShortage {
        material: MaterialId,
        needed: Decimal,
        available: Decimal,
    },

    /// Sum of wallet balances diverged from money that entered the system.
    #[error("EM_ERR_403: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Transient Store Errors (8xx)
    // =================================================================
    /// The store could not be reached or the lock is poisoned.
    #[error("EM_ERR_800: Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The unit of work was rolled back at commit time.
    #[error("EM_ERR_801: Commit failed: {0}")]
    CommitFailed(String),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    #[error("EM_ERR_900: Internal error: {0}")]
    Internal(String),

    #[error("EM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    #[error("EM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    #[error("EM_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Coarse classification that decides how a caller reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Integrity,
    Transient,
    Internal,
}

impl MarketError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyCart
            | Self::InvalidCartItem { .. }
            | Self::MissingShippingAddress
            | Self::InvalidAmount { .. }
            | Self::InvalidTransition { .. }
            | Self::SessionExpired(_) => ErrorKind::Validation,
            Self::OrderNotFound(_)
            | Self::OrderGroupNotFound(_)
            | Self::WalletNotFound(_)
            | Self::SellerNotFound { .. }
            | Self::SellerWalletNotFound(_)
            | Self::MaterialNotFound(_)
            | Self::DesignNotFound(_)
            | Self::StockItemNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyPaidOut(_) | Self::WalletAlreadyExists(_) => ErrorKind::Conflict,
            Self::InsufficientFunds { .. }
            | Self::LedgerIntegrity { .. }
            | Self::StockShortage { .. }
            | Self::SupplyInvariantViolation { .. } => ErrorKind::Integrity,
            Self::StoreUnavailable(_) | Self::CommitFailed(_) => ErrorKind::Transient,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) | Self::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MarketError>;

impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = MarketError::OrderNotFound(OrderId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("EM_ERR_200"), "Got: {msg}");
    }

    #[test]
    fn insufficient_funds_display() {
        let err = MarketError::InsufficientFunds {
            wallet: WalletId::new(),
            needed: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("EM_ERR_400"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn seller_not_found_names_type() {
        let err = MarketError::SellerNotFound {
            seller_type: SellerType::Designer,
            seller_id: SellerId::new(),
        };
        assert!(format!("{err}").contains("Designer"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn kinds_drive_retry_policy() {
        assert!(MarketError::CommitFailed("io".into()).is_transient());
        assert!(MarketError::StoreUnavailable("poisoned".into()).is_transient());
        assert!(!MarketError::EmptyCart.is_transient());
        assert_eq!(MarketError::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(
            MarketError::AlreadyPaidOut(OrderId::new()).kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn all_errors_have_em_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(MarketError::EmptyCart),
            Box::new(MarketError::MissingShippingAddress),
            Box::new(MarketError::SessionExpired(OrderGroupId::new())),
            Box::new(MarketError::Internal("test".into())),
            Box::new(MarketError::LedgerIntegrity {
                reason: "chain".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("EM_ERR_"),
                "Error missing EM_ERR_ prefix: {msg}"
            );
        }
    }
}
