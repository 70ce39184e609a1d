use std::sync::Arc;

use crate::{
    db::{TieredCache, TtlClass},
    error::FetchError,
    models::{CatalogQuery, Category, MediaKind, Page},
    services::{
        collapser::RequestCollapser,
        fingerprint::{fingerprint, Fingerprint},
        providers::CatalogProvider,
    },
};

/// Answers catalog queries from cache, collapsing concurrent misses into
/// a single upstream fetch
///
/// Created once per process and shared by every request handler.
pub struct CatalogAggregator {
    provider: Arc<dyn CatalogProvider>,
    cache: Arc<TieredCache>,
    collapser: RequestCollapser,
}

impl CatalogAggregator {
    pub fn new(provider: Arc<dyn CatalogProvider>, cache: Arc<TieredCache>) -> Self {
        Self {
            provider,
            cache,
            collapser: RequestCollapser::new(),
        }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Returns the page for `query`
    ///
    /// Successful fetches are cached under the query's TTL class before
    /// any waiter sees them. Failures are returned as-is and never cached.
    pub async fn query(&self, query: &CatalogQuery) -> Result<Arc<Page>, FetchError> {
        let fp = fingerprint(query);

        if let Some(entry) = self.cache.get(&fp).await {
            return Ok(Arc::clone(&entry.payload));
        }

        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let query = query.clone();
        let key = fp.clone();

        self.collapser
            .run(&fp, move || fetch_and_store(provider, cache, query, key))
            .await
    }

    /// Convenience wrapper for fixed, provider-curated listings
    pub async fn query_fixed_category(
        &self,
        kind: MediaKind,
        category: Category,
        page: u32,
    ) -> crate::error::AppResult<Arc<Page>> {
        let query = CatalogQuery::fixed_category(kind, category, page)?;
        Ok(self.query(&query).await?)
    }
}

/// Body of the single producer for a fingerprint
///
/// The local tier is checked again first: a fetch that completed while the
/// caller was reading the shared tier has already stored its page.
async fn fetch_and_store(
    provider: Arc<dyn CatalogProvider>,
    cache: Arc<TieredCache>,
    query: CatalogQuery,
    key: Fingerprint,
) -> Result<Arc<Page>, FetchError> {
    if let Some(entry) = cache.get_local(&key) {
        tracing::debug!(fingerprint = %key, "Page stored by a just-finished fetch");
        return Ok(Arc::clone(&entry.payload));
    }

    tracing::info!(
        fingerprint = %key,
        provider = provider.name(),
        "Fetching catalog page from upstream"
    );
    cache.record_upstream_fetch();

    match provider.fetch(&query).await {
        Ok(page) => {
            let page = Arc::new(page);
            cache.put(key, Arc::clone(&page), TtlClass::for_mode(query.mode()));
            Ok(page)
        }
        Err(e) => {
            match &e {
                FetchError::MalformedResponse(_) => {
                    tracing::error!(fingerprint = %key, error = %e, "Upstream contract violation")
                }
                _ => tracing::warn!(fingerprint = %key, error = %e, "Upstream fetch failed"),
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TtlPolicy;
    use crate::error::AppError;
    use crate::models::{CatalogItem, DiscoverFilters};
    use crate::services::providers::MockCatalogProvider;
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    fn sample_page(ids: &[u64]) -> Page {
        Page {
            page: 1,
            total_pages: 1,
            total_results: ids.len() as u32,
            items: ids
                .iter()
                .map(|&id| CatalogItem {
                    id,
                    media_kind: MediaKind::Movie,
                    fields: Map::new(),
                })
                .collect(),
        }
    }

    fn action_query() -> CatalogQuery {
        CatalogQuery::discover(MediaKind::Movie, DiscoverFilters::new().with_genre(28), 1).unwrap()
    }

    fn aggregator(provider: impl CatalogProvider + 'static) -> CatalogAggregator {
        CatalogAggregator::new(
            Arc::new(provider),
            Arc::new(TieredCache::new(100, TtlPolicy::default())),
        )
    }

    /// Provider that blocks on a gate so callers can pile up
    struct GatedProvider {
        calls: AtomicUsize,
        gate: Notify,
    }

    #[async_trait::async_trait]
    impl CatalogProvider for GatedProvider {
        async fn fetch(&self, _query: &CatalogQuery) -> Result<Page, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(sample_page(&[603, 604]))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn test_second_query_served_from_cache() {
        let mut provider = MockCatalogProvider::new();
        provider
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(sample_page(&[1, 2, 3])));
        provider.expect_name().return_const("mock");
        let aggregator = aggregator(provider);

        let first = assert_ok!(aggregator.query(&action_query()).await);
        let second = assert_ok!(aggregator.query(&action_query()).await);

        assert_eq!(first, second);
        assert_eq!(aggregator.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_equivalent_queries_share_entry() {
        let mut provider = MockCatalogProvider::new();
        provider
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(sample_page(&[1])));
        provider.expect_name().return_const("mock");
        let aggregator = aggregator(provider);

        let explicit_default = CatalogQuery::discover(
            MediaKind::Movie,
            DiscoverFilters::new()
                .with_genre(28)
                .with_watch_providers(Vec::new()),
            1,
        )
        .unwrap();

        assert_ok!(aggregator.query(&action_query()).await);
        assert_ok!(aggregator.query(&explicit_default).await);
    }

    #[tokio::test]
    async fn test_changed_filter_triggers_new_fetch() {
        let mut provider = MockCatalogProvider::new();
        provider
            .expect_fetch()
            .times(2)
            .returning(|_| Ok(sample_page(&[1])));
        provider.expect_name().return_const("mock");
        let aggregator = aggregator(provider);

        let comedy =
            CatalogQuery::discover(MediaKind::Movie, DiscoverFilters::new().with_genre(35), 1)
                .unwrap();

        assert_ok!(aggregator.query(&action_query()).await);
        assert_ok!(aggregator.query(&comedy).await);
        assert_eq!(aggregator.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let mut provider = MockCatalogProvider::new();
        let mut attempts = 0;
        provider.expect_fetch().times(2).returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err(FetchError::UpstreamUnavailable("connection reset".into()))
            } else {
                Ok(sample_page(&[7]))
            }
        });
        provider.expect_name().return_const("mock");
        let aggregator = aggregator(provider);

        let err = assert_err!(aggregator.query(&action_query()).await);
        assert!(err.is_retryable());
        assert!(aggregator.cache().is_empty());

        let page = assert_ok!(aggregator.query(&action_query()).await);
        assert_eq!(page.items[0].id, 7);
    }

    #[tokio::test]
    async fn test_error_kind_propagates_unchanged() {
        let mut provider = MockCatalogProvider::new();
        provider.expect_fetch().returning(|_| {
            Err(FetchError::MalformedResponse("missing results".into()))
        });
        provider.expect_name().return_const("mock");
        let aggregator = aggregator(provider);

        let err = assert_err!(aggregator.query(&action_query()).await);
        assert_eq!(err, FetchError::MalformedResponse("missing results".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_category_refetched_after_short_ttl() {
        let mut provider = MockCatalogProvider::new();
        provider
            .expect_fetch()
            .times(2)
            .returning(|_| Ok(sample_page(&[1])));
        provider.expect_name().return_const("mock");
        let aggregator = aggregator(provider);

        assert_ok!(
            aggregator
                .query_fixed_category(MediaKind::Movie, Category::NowPlaying, 1)
                .await
        );
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_ok!(
            aggregator
                .query_fixed_category(MediaKind::Movie, Category::NowPlaying, 1)
                .await
        );
    }

    #[tokio::test]
    async fn test_invalid_category_rejected_before_fetch() {
        let mut provider = MockCatalogProvider::new();
        provider.expect_fetch().never();
        let aggregator = aggregator(provider);

        let result = aggregator
            .query_fixed_category(MediaKind::Tv, Category::Upcoming, 1)
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_queries_fetch_once() {
        let provider = Arc::new(GatedProvider {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
        });
        let aggregator = Arc::new(CatalogAggregator::new(
            provider.clone(),
            Arc::new(TieredCache::new(100, TtlPolicy::default())),
        ));
        let fp = fingerprint(&action_query());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let aggregator = Arc::clone(&aggregator);
                tokio::spawn(async move { aggregator.query(&action_query()).await })
            })
            .collect();

        while aggregator.collapser.waiters(&fp) < 10 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        provider.gate.notify_one();

        let mut pages = Vec::new();
        for handle in handles {
            pages.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.cache().stats().upstream_fetches, 1);
        assert!(pages.iter().all(|page| Arc::ptr_eq(page, &pages[0])));
        assert!(aggregator.cache().get(&fp).await.is_some());
    }

    #[tokio::test]
    async fn test_producer_reuses_page_stored_meanwhile() {
        let mut provider = MockCatalogProvider::new();
        provider.expect_fetch().never();
        let cache = Arc::new(TieredCache::new(100, TtlPolicy::default()));
        let fp = fingerprint(&action_query());
        let stored = Arc::new(sample_page(&[550]));
        cache.put(fp.clone(), Arc::clone(&stored), TtlClass::Long);

        let page = assert_ok!(
            fetch_and_store(Arc::new(provider), Arc::clone(&cache), action_query(), fp).await
        );

        assert!(Arc::ptr_eq(&page, &stored));
        assert_eq!(cache.stats().upstream_fetches, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_query_still_populates_cache() {
        let provider = Arc::new(GatedProvider {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
        });
        let aggregator = Arc::new(CatalogAggregator::new(
            provider.clone(),
            Arc::new(TieredCache::new(100, TtlPolicy::default())),
        ));
        let fp = fingerprint(&action_query());

        let caller = {
            let aggregator = Arc::clone(&aggregator);
            tokio::spawn(async move { aggregator.query(&action_query()).await })
        };
        while aggregator.collapser.waiters(&fp) < 1 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        caller.abort();
        provider.gate.notify_one();

        while aggregator.collapser.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let page = aggregator.query(&action_query()).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
