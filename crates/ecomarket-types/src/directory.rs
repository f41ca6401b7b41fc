//! In-memory implementations of the identity and catalog lookups.
//!
//! Both are populated at startup and then shared read-only behind an `Arc`.

use std::collections::{HashMap, HashSet};

use crate::{
    CatalogLookup, DesignId, IdentityLookup, MaterialId, Seller, SellerId, SellerType, UserId,
};

/// Seller profile → owning user.
#[derive(Debug, Clone, Default)]
pub struct SellerDirectory {
    users: HashMap<Seller, UserId>,
}

impl SellerDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a seller profile to a user. Returns the previous link, if any.
    pub fn link(&mut self, seller: Seller, user_id: UserId) -> Option<UserId> {
        self.users.insert(seller, user_id)
    }

    #[must_use]
    pub fn with(mut self, seller: Seller, user_id: UserId) -> Self {
        self.link(seller, user_id);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl IdentityLookup for SellerDirectory {
    fn resolve_seller_user(&self, seller_type: SellerType, seller_id: SellerId) -> Option<UserId> {
        self.users
            .get(&Seller {
                id: seller_id,
                seller_type,
            })
            .copied()
    }
}

/// Known material and design ids.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    materials: HashSet<MaterialId>,
    designs: HashSet<DesignId>,
}

impl CatalogIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, id: MaterialId) {
        self.materials.insert(id);
    }

    pub fn add_design(&mut self, id: DesignId) {
        self.designs.insert(id);
    }
}

impl CatalogLookup for CatalogIndex {
    fn contains_material(&self, material_id: MaterialId) -> bool {
        self.materials.contains(&material_id)
    }

    fn contains_design(&self, design_id: DesignId) -> bool {
        self.designs.contains(&design_id)
    }
}
