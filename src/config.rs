use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Bearer token for the catalog provider
    pub tmdb_api_token: String,

    /// Catalog provider base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Language requested for catalog listings
    #[serde(default = "default_catalog_language")]
    pub catalog_language: String,

    /// Upstream request timeout in seconds
    #[serde(default = "default_catalog_timeout_secs")]
    pub catalog_timeout_secs: u64,

    /// PostgreSQL connection URL for collection memberships.
    /// Memberships are kept in process memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL for the shared cache tier
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Maximum number of pages held in the in-process cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Freshness of fixed categories and search results
    #[serde(default = "default_cache_short_ttl_secs")]
    pub cache_short_ttl_secs: u64,

    /// Freshness of discover listings and genre taxonomies
    #[serde(default = "default_cache_long_ttl_secs")]
    pub cache_long_ttl_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_catalog_language() -> String {
    "en-US".to_string()
}

fn default_catalog_timeout_secs() -> u64 {
    10
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_cache_short_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_cache_long_ttl_secs() -> u64 {
    18_000 // 5 hours
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde defaults can't express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache_capacity == 0 {
            anyhow::bail!("CACHE_CAPACITY must be at least 1");
        }
        if self.cache_short_ttl_secs == 0 || self.cache_long_ttl_secs == 0 {
            anyhow::bail!("Cache TTLs must be non-zero");
        }
        if self.cache_short_ttl_secs >= self.cache_long_ttl_secs {
            anyhow::bail!(
                "CACHE_SHORT_TTL_SECS ({}) must be less than CACHE_LONG_TTL_SECS ({})",
                self.cache_short_ttl_secs,
                self.cache_long_ttl_secs
            );
        }
        Ok(())
    }

    pub fn short_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_short_ttl_secs)
    }

    pub fn long_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_long_ttl_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
