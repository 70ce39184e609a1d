use sqlx::{PgPool, Row};

use crate::{
    error::StoreError,
    models::{CollectionKind, MediaKind, Membership, ResourceId, UserId},
};

use super::{CollectionStore, MembershipIndex};

/// Collection store backed by the `collection_memberships` table
#[derive(Clone)]
pub struct PgCollectionStore {
    pool: PgPool,
}

impl PgCollectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for PgCollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCollectionStore")
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

fn to_db_id(id: ResourceId) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::ResourceIdOutOfRange(id))
}

fn from_db_id(id: i64) -> Result<ResourceId, StoreError> {
    ResourceId::try_from(id)
        .map_err(|_| StoreError::Unavailable(format!("negative resource id {} in store", id)))
}

fn parse_collection(raw: &str) -> Result<CollectionKind, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Unavailable(format!("unknown collection kind '{}' in store", raw)))
}

#[async_trait::async_trait]
impl CollectionStore for PgCollectionStore {
    async fn is_member(&self, membership: &Membership) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM collection_memberships
                WHERE user_id = $1 AND resource_id = $2
                  AND resource_type = $3 AND collection_kind = $4
            )
            "#,
        )
        .bind(membership.user_id.as_str())
        .bind(to_db_id(membership.resource_id)?)
        .bind(membership.resource_type.as_str())
        .bind(membership.collection.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn batch_membership(
        &self,
        user_id: &UserId,
        resource_ids: &[ResourceId],
        resource_type: MediaKind,
    ) -> Result<MembershipIndex, StoreError> {
        if resource_ids.is_empty() {
            return Ok(MembershipIndex::new());
        }

        let ids = resource_ids
            .iter()
            .map(|&id| to_db_id(id))
            .collect::<Result<Vec<i64>, _>>()?;

        let rows = sqlx::query(
            r#"
            SELECT resource_id, collection_kind
            FROM collection_memberships
            WHERE user_id = $1 AND resource_type = $2 AND resource_id = ANY($3)
            "#,
        )
        .bind(user_id.as_str())
        .bind(resource_type.as_str())
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut index = MembershipIndex::new();
        for row in rows {
            let resource_id: i64 = row.try_get("resource_id")?;
            let collection: String = row.try_get("collection_kind")?;
            index
                .entry(parse_collection(&collection)?)
                .or_default()
                .insert(from_db_id(resource_id)?);
        }

        Ok(index)
    }

    async fn add(&self, membership: &Membership) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO collection_memberships (user_id, resource_id, resource_type, collection_kind)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ON CONSTRAINT collection_memberships_unique DO NOTHING
            "#,
        )
        .bind(membership.user_id.as_str())
        .bind(to_db_id(membership.resource_id)?)
        .bind(membership.resource_type.as_str())
        .bind(membership.collection.to_string())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            user_id = %membership.user_id,
            resource_id = membership.resource_id,
            collection = %membership.collection,
            inserted = result.rows_affected(),
            "Membership added"
        );
        Ok(())
    }

    async fn remove(&self, membership: &Membership) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM collection_memberships
            WHERE user_id = $1 AND resource_id = $2
              AND resource_type = $3 AND collection_kind = $4
            "#,
        )
        .bind(membership.user_id.as_str())
        .bind(to_db_id(membership.resource_id)?)
        .bind(membership.resource_type.as_str())
        .bind(membership.collection.to_string())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            user_id = %membership.user_id,
            resource_id = membership.resource_id,
            collection = %membership.collection,
            deleted = result.rows_affected(),
            "Membership removed"
        );
        Ok(())
    }

    async fn list_by_user_and_type(
        &self,
        user_id: &UserId,
        resource_type: MediaKind,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT resource_id, collection_kind
            FROM collection_memberships
            WHERE user_id = $1 AND resource_type = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .bind(resource_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<Membership, StoreError> {
                let resource_id: i64 = row.try_get("resource_id")?;
                let collection: String = row.try_get("collection_kind")?;
                Ok(Membership {
                    user_id: user_id.clone(),
                    resource_id: from_db_id(resource_id)?,
                    resource_type,
                    collection: parse_collection(&collection)?,
                })
            })
            .collect()
    }
}
