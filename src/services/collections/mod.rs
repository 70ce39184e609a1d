//! User-to-resource collection memberships (watchlist and named lists).
//!
//! The store is owned outside this service; the core only reads it for
//! personalization and forwards explicit user mutations to it.

use std::collections::{HashMap, HashSet};

use crate::{
    error::StoreError,
    models::{CollectionKind, MediaKind, Membership, ResourceId, UserId},
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCollectionStore;
pub use postgres::PgCollectionStore;

/// Resource ids found in each of a user's collections
pub type MembershipIndex = HashMap<CollectionKind, HashSet<ResourceId>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CollectionStore: Send + Sync {
    async fn is_member(&self, membership: &Membership) -> Result<bool, StoreError>;

    /// Single round trip covering every id in `resource_ids`.
    /// Collections without any of the ids are left out of the index.
    async fn batch_membership(
        &self,
        user_id: &UserId,
        resource_ids: &[ResourceId],
        resource_type: MediaKind,
    ) -> Result<MembershipIndex, StoreError>;

    /// Adding a membership that already exists is a no-op
    async fn add(&self, membership: &Membership) -> Result<(), StoreError>;

    /// Removing a membership that does not exist is a no-op
    async fn remove(&self, membership: &Membership) -> Result<(), StoreError>;

    async fn list_by_user_and_type(
        &self,
        user_id: &UserId,
        resource_type: MediaKind,
    ) -> Result<Vec<Membership>, StoreError>;
}
