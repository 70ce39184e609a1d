use std::collections::HashSet;

use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    models::{MediaKind, Membership, ResourceId, UserId},
};

use super::{CollectionStore, MembershipIndex};

/// Process-local collection store, used when no database is configured
#[derive(Default)]
pub struct InMemoryCollectionStore {
    // insertion order doubles as "added at" for listings
    memberships: RwLock<Vec<Membership>>,
}

impl InMemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CollectionStore for InMemoryCollectionStore {
    async fn is_member(&self, membership: &Membership) -> Result<bool, StoreError> {
        Ok(self.memberships.read().await.contains(membership))
    }

    async fn batch_membership(
        &self,
        user_id: &UserId,
        resource_ids: &[ResourceId],
        resource_type: MediaKind,
    ) -> Result<MembershipIndex, StoreError> {
        let wanted: HashSet<ResourceId> = resource_ids.iter().copied().collect();
        let mut index = MembershipIndex::new();

        for membership in self.memberships.read().await.iter() {
            if &membership.user_id == user_id
                && membership.resource_type == resource_type
                && wanted.contains(&membership.resource_id)
            {
                index
                    .entry(membership.collection.clone())
                    .or_default()
                    .insert(membership.resource_id);
            }
        }

        Ok(index)
    }

    async fn add(&self, membership: &Membership) -> Result<(), StoreError> {
        let mut memberships = self.memberships.write().await;
        if !memberships.contains(membership) {
            memberships.push(membership.clone());
        }
        Ok(())
    }

    async fn remove(&self, membership: &Membership) -> Result<(), StoreError> {
        self.memberships.write().await.retain(|m| m != membership);
        Ok(())
    }

    async fn list_by_user_and_type(
        &self,
        user_id: &UserId,
        resource_type: MediaKind,
    ) -> Result<Vec<Membership>, StoreError> {
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .rev()
            .filter(|m| &m.user_id == user_id && m.resource_type == resource_type)
            .cloned()
            .collect())
    }
}
