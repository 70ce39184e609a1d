//! Catalog data provider abstraction
//!
//! A provider performs exactly one upstream call per `fetch`. It neither
//! caches nor retries; both belong to the aggregator and its callers.
use crate::{
    error::FetchError,
    models::{CatalogQuery, Page},
};

pub mod tmdb;

pub use tmdb::TmdbProvider;

/// Trait for catalog providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetch one page of catalog results for the query
    ///
    /// Fails with `UpstreamUnavailable` on transport failure, `UpstreamRejected`
    /// on a non-success status and `MalformedResponse` when the body does not
    /// have the expected shape.
    async fn fetch(&self, query: &CatalogQuery) -> Result<Page, FetchError>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
