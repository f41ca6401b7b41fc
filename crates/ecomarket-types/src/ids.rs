//! Globally unique identifiers used throughout EcoMarket.
//!
//! Every entity ID is a UUIDv7 newtype so IDs sort by creation time and
//! cannot be mixed up across entity kinds at compile time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Order side
// ---------------------------------------------------------------------------

uuid_id!(
    /// A checkout session aggregating every seller-scoped order of one cart.
    OrderGroupId,
    "grp:"
);
uuid_id!(
    /// A single seller-scoped order.
    OrderId,
    ""
);
uuid_id!(
    /// One line of an order.
    OrderDetailId,
    "line:"
);

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

uuid_id!(
    /// A user account (customer, or the login behind a seller profile).
    UserId,
    "user:"
);
uuid_id!(
    /// A seller profile id. Whether it names a supplier or a designer is
    /// carried alongside as a [`crate::SellerType`].
    SellerId,
    "seller:"
);

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

uuid_id!(
    /// A wallet holding a fixed-point balance.
    WalletId,
    "wallet:"
);
uuid_id!(
    /// One immutable ledger entry.
    WalletTransactionId,
    "wtx:"
);

// ---------------------------------------------------------------------------
// Catalog and stock
// ---------------------------------------------------------------------------

uuid_id!(MaterialId, "material:");
uuid_id!(DesignId, "design:");
uuid_id!(ProductId, "product:");
uuid_id!(WarehouseId, "warehouse:");
uuid_id!(
    /// A stock item (one item held in one warehouse).
    InventoryId,
    "inv:"
);
uuid_id!(InventoryTransactionId, "itx:");
