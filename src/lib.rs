//! Catalog aggregation and personalization service.
//!
//! Catalog pages are fetched from an upstream provider, cached per query
//! fingerprint with class-based TTLs, collapsed under concurrent demand, and
//! decorated per caller with watchlist/list membership on the way out.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
