use std::sync::Arc;

use crate::{
    db::TieredCache,
    services::{
        collections::CollectionStore, providers::CatalogProvider, CatalogAggregator,
        PersonalizationOverlay,
    },
};

/// Shared application state, built once per process
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<CatalogAggregator>,
    pub overlay: Arc<PersonalizationOverlay>,
    pub collections: Arc<dyn CollectionStore>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        collections: Arc<dyn CollectionStore>,
        cache: Arc<TieredCache>,
    ) -> Self {
        Self {
            aggregator: Arc::new(CatalogAggregator::new(provider, cache)),
            overlay: Arc::new(PersonalizationOverlay::new(Arc::clone(&collections))),
            collections,
        }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        self.aggregator.cache()
    }
}
