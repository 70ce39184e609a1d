use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use crate::{
    error::StoreError,
    models::{ItemMembership, MediaKind, Page, PersonalizedItem, PersonalizedPage, UserId},
    services::collections::{CollectionStore, MembershipIndex},
};

/// Read-side join of catalog pages with the caller's collection memberships
///
/// Works on a borrowed page and returns a fresh value, so the shared cached
/// page is never touched.
pub struct PersonalizationOverlay {
    store: Arc<dyn CollectionStore>,
}

impl PersonalizationOverlay {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }

    /// Decorates every item with the caller's membership flags
    ///
    /// Anonymous callers get the page back undecorated. A store failure is
    /// logged and also yields the undecorated page.
    pub async fn personalize(&self, page: &Page, user_id: Option<&UserId>) -> PersonalizedPage {
        let Some(user_id) = user_id else {
            return PersonalizedPage::undecorated(page);
        };

        match self.lookup(page, user_id).await {
            Ok(indexes) => decorate(page, &indexes),
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Collection store lookup failed, serving unpersonalized page"
                );
                PersonalizedPage::undecorated(page)
            }
        }
    }

    /// One batched lookup per media kind present in the page
    async fn lookup(
        &self,
        page: &Page,
        user_id: &UserId,
    ) -> Result<HashMap<MediaKind, MembershipIndex>, StoreError> {
        let kinds: BTreeSet<MediaKind> = page.items.iter().map(|item| item.media_kind).collect();
        let mut indexes = HashMap::new();

        for kind in kinds {
            let ids = page.resource_ids(kind);
            let index = self.store.batch_membership(user_id, &ids, kind).await?;
            indexes.insert(kind, index);
        }

        Ok(indexes)
    }
}

fn decorate(page: &Page, indexes: &HashMap<MediaKind, MembershipIndex>) -> PersonalizedPage {
    let items = page
        .items
        .iter()
        .map(|item| {
            let mut membership = ItemMembership::default();
            if let Some(index) = indexes.get(&item.media_kind) {
                for (collection, ids) in index {
                    if ids.contains(&item.id) {
                        membership.record(collection);
                    }
                }
            }
            membership.lists.sort();

            PersonalizedItem {
                item: item.clone(),
                membership: Some(membership),
            }
        })
        .collect();

    PersonalizedPage {
        page: page.page,
        total_pages: page.total_pages,
        total_results: page.total_results,
        items,
    }
}
