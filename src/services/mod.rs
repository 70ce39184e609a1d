pub mod aggregator;
pub mod collapser;
pub mod collections;
pub mod fingerprint;
pub mod personalization;
pub mod providers;

pub use aggregator::CatalogAggregator;
pub use personalization::PersonalizationOverlay;
