//! Catalog queries, result pages, and per-user collection memberships.

mod membership;
mod page;
mod query;

pub use membership::{CollectionKind, ListId, Membership, ResourceId, UserId};
pub use page::{
    CatalogItem, Genre, GenreListing, ItemMembership, Page, PersonalizedItem, PersonalizedPage,
};
pub use query::{CatalogQuery, Category, DiscoverFilters, MediaKind, QueryMode, SortKey, MAX_PAGE};
