//! Stable cache keys for catalog queries.
//!
//! Layout: `v1|<mode>|<kind>|<filters...>|page=<n>`. Discover filters are
//! written in a fixed order (genre, sort, providers, region, runtime) and only
//! when they differ from their default. Search terms are trimmed, have their
//! whitespace collapsed and are lower-cased.

use serde::Serialize;
use std::fmt::{Display, Write};

use crate::models::{CatalogQuery, DiscoverFilters, QueryMode, SortKey};

const VERSION: &str = "v1";

/// Normalized cache key derived from a query's effective parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the fingerprint of a query. Pure and total.
pub fn fingerprint(query: &CatalogQuery) -> Fingerprint {
    let mut key = format!("{}|{}|{}", VERSION, query.mode().name(), query.kind());

    match query.mode() {
        QueryMode::Discover(filters) => push_filters(&mut key, filters),
        QueryMode::Search { term } => {
            let _ = write!(key, "|term={}", escape(&normalize_term(term)));
        }
        QueryMode::FixedCategory(category) => {
            let _ = write!(key, "|category={}", category.as_str());
        }
        QueryMode::GenreList => {}
    }

    let _ = write!(key, "|page={}", query.page());
    Fingerprint(key)
}

fn push_filters(key: &mut String, filters: &DiscoverFilters) {
    if let Some(genre) = filters.genre_id() {
        let _ = write!(key, "|genre={}", genre);
    }
    if filters.sort_by() != SortKey::default() {
        let _ = write!(key, "|sort={}", filters.sort_by().token());
    }
    if !filters.watch_providers().is_empty() {
        let providers: Vec<String> = filters
            .watch_providers()
            .iter()
            .map(|id| id.to_string())
            .collect();
        let _ = write!(key, "|providers={}", providers.join(","));
    }
    if let Some(region) = filters.watch_region() {
        let _ = write!(key, "|region={}", escape(region));
    }
    if let Some(runtime) = filters.max_runtime() {
        let _ = write!(key, "|runtime={}", runtime);
    }
}

fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Keeps separators out of free-form components
fn escape(value: &str) -> String {
    value.replace('%', "%25").replace('|', "%7C")
}
