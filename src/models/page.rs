use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CollectionKind, ListId, MediaKind, ResourceId};

/// One catalog entry. Provider fields other than the id are passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: ResourceId,
    pub media_kind: MediaKind,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A page of anonymous catalog results plus pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
    pub items: Vec<CatalogItem>,
}

impl Page {
    /// Resource ids in the page, in item order
    pub fn resource_ids(&self, kind: MediaKind) -> Vec<ResourceId> {
        self.items
            .iter()
            .filter(|item| item.media_kind == kind)
            .map(|item| item.id)
            .collect()
    }
}

/// Which of the caller's collections contain an item
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemMembership {
    pub in_watchlist: bool,
    pub lists: Vec<ListId>,
}

impl ItemMembership {
    pub fn record(&mut self, kind: &CollectionKind) {
        match kind {
            CollectionKind::Watchlist => self.in_watchlist = true,
            CollectionKind::List(list_id) => {
                if !self.lists.contains(list_id) {
                    self.lists.push(list_id.clone());
                }
            }
        }
    }
}

/// Catalog item decorated for one caller. Computed on read, never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonalizedItem {
    #[serde(flatten)]
    pub item: CatalogItem,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub membership: Option<ItemMembership>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonalizedPage {
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
    pub items: Vec<PersonalizedItem>,
}

impl PersonalizedPage {
    /// Page with no membership flags attached
    pub fn undecorated(page: &Page) -> Self {
        Self {
            page: page.page,
            total_pages: page.total_pages,
            total_results: page.total_results,
            items: page
                .items
                .iter()
                .cloned()
                .map(|item| PersonalizedItem {
                    item,
                    membership: None,
                })
                .collect(),
        }
    }
}

/// One genre of a media kind's taxonomy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// Genre taxonomy as served to clients
///
/// The cache stores genre lists as ordinary pages; this is the outward shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenreListing {
    pub media_kind: MediaKind,
    pub genres: Vec<Genre>,
}

impl GenreListing {
    pub fn from_page(media_kind: MediaKind, page: &Page) -> Self {
        let genres = page
            .items
            .iter()
            .map(|item| Genre {
                id: item.id,
                name: item
                    .fields
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect();
        Self { media_kind, genres }
    }
}
