use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use crate::error::{AppError, AppResult};

/// Highest page number the catalog provider will serve
pub const MAX_PAGE: u32 = 500;

/// Kind of media a catalog query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Tv),
            other => Err(AppError::InvalidInput(format!("Unknown media kind: {}", other))),
        }
    }
}

/// Fixed, provider-curated listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NowPlaying,
    Upcoming,
    AiringToday,
    OnTheAir,
    Popular,
    TopRated,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::NowPlaying => "now_playing",
            Category::Upcoming => "upcoming",
            Category::AiringToday => "airing_today",
            Category::OnTheAir => "on_the_air",
            Category::Popular => "popular",
            Category::TopRated => "top_rated",
        }
    }

    /// Whether the provider publishes this category for the given media kind
    pub fn supports(&self, kind: MediaKind) -> bool {
        match self {
            Category::NowPlaying | Category::Upcoming => kind == MediaKind::Movie,
            Category::AiringToday | Category::OnTheAir => kind == MediaKind::Tv,
            Category::Popular | Category::TopRated => true,
        }
    }
}

/// Ordering applied to discover listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "popularity.desc")]
    PopularityDesc,
    #[serde(rename = "popularity.asc")]
    PopularityAsc,
    #[serde(rename = "vote_average.desc")]
    VoteAverageDesc,
    #[serde(rename = "vote_average.asc")]
    VoteAverageAsc,
    #[serde(rename = "vote_count.desc")]
    VoteCountDesc,
    #[serde(rename = "vote_count.asc")]
    VoteCountAsc,
    #[serde(rename = "release_date.desc")]
    ReleaseDateDesc,
    #[serde(rename = "release_date.asc")]
    ReleaseDateAsc,
}

impl SortKey {
    /// Kind-neutral token, used in fingerprints
    pub fn token(&self) -> &'static str {
        match self {
            SortKey::PopularityDesc => "popularity.desc",
            SortKey::PopularityAsc => "popularity.asc",
            SortKey::VoteAverageDesc => "vote_average.desc",
            SortKey::VoteAverageAsc => "vote_average.asc",
            SortKey::VoteCountDesc => "vote_count.desc",
            SortKey::VoteCountAsc => "vote_count.asc",
            SortKey::ReleaseDateDesc => "release_date.desc",
            SortKey::ReleaseDateAsc => "release_date.asc",
        }
    }

    /// Provider parameter value; release dates are named differently per kind
    pub fn provider_param(&self, kind: MediaKind) -> String {
        match (self, kind) {
            (SortKey::ReleaseDateDesc, MediaKind::Movie) => "primary_release_date.desc".into(),
            (SortKey::ReleaseDateAsc, MediaKind::Movie) => "primary_release_date.asc".into(),
            (SortKey::ReleaseDateDesc, MediaKind::Tv) => "first_air_date.desc".into(),
            (SortKey::ReleaseDateAsc, MediaKind::Tv) => "first_air_date.asc".into(),
            _ => self.token().to_string(),
        }
    }
}

/// Filters accepted by discover queries
///
/// Defaults are represented as absence: genre id 0, runtime 0, an empty
/// provider set and a blank region all collapse to `None`/empty, so an
/// explicit default and a missing filter are the same value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoverFilters {
    genre_id: Option<u32>,
    sort_by: SortKey,
    watch_providers: BTreeSet<u32>,
    watch_region: Option<String>,
    max_runtime: Option<u32>,
}

impl DiscoverFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_genre(mut self, genre_id: u32) -> Self {
        self.genre_id = (genre_id != 0).then_some(genre_id);
        self
    }

    pub fn with_sort(mut self, sort_by: SortKey) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn with_watch_providers<I: IntoIterator<Item = u32>>(mut self, providers: I) -> Self {
        self.watch_providers = providers.into_iter().collect();
        self
    }

    pub fn with_watch_region(mut self, region: &str) -> Self {
        let region = region.trim().to_uppercase();
        self.watch_region = (!region.is_empty()).then_some(region);
        self
    }

    pub fn with_max_runtime(mut self, minutes: u32) -> Self {
        self.max_runtime = (minutes != 0).then_some(minutes);
        self
    }

    pub fn genre_id(&self) -> Option<u32> {
        self.genre_id
    }

    pub fn sort_by(&self) -> SortKey {
        self.sort_by
    }

    /// Provider ids, ascending and de-duplicated
    pub fn watch_providers(&self) -> &BTreeSet<u32> {
        &self.watch_providers
    }

    pub fn watch_region(&self) -> Option<&str> {
        self.watch_region.as_deref()
    }

    pub fn max_runtime(&self) -> Option<u32> {
        self.max_runtime
    }
}

/// What a catalog query asks the provider for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    Discover(DiscoverFilters),
    Search { term: String },
    FixedCategory(Category),
    GenreList,
}

impl QueryMode {
    pub fn name(&self) -> &'static str {
        match self {
            QueryMode::Discover(_) => "discover",
            QueryMode::Search { .. } => "search",
            QueryMode::FixedCategory(_) => "category",
            QueryMode::GenreList => "genres",
        }
    }
}

/// Immutable description of one catalog request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    kind: MediaKind,
    mode: QueryMode,
    page: u32,
}

impl CatalogQuery {
    pub fn discover(kind: MediaKind, filters: DiscoverFilters, page: u32) -> AppResult<Self> {
        Self::build(kind, QueryMode::Discover(filters), page)
    }

    pub fn search(kind: MediaKind, term: &str, page: u32) -> AppResult<Self> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }
        Self::build(
            kind,
            QueryMode::Search {
                term: term.to_string(),
            },
            page,
        )
    }

    pub fn fixed_category(kind: MediaKind, category: Category, page: u32) -> AppResult<Self> {
        if !category.supports(kind) {
            return Err(AppError::InvalidInput(format!(
                "Category {} is not available for {}",
                category.as_str(),
                kind
            )));
        }
        Self::build(kind, QueryMode::FixedCategory(category), page)
    }

    /// Genre taxonomy; not paginated upstream, so always page 1
    pub fn genre_list(kind: MediaKind) -> Self {
        Self {
            kind,
            mode: QueryMode::GenreList,
            page: 1,
        }
    }

    fn build(kind: MediaKind, mode: QueryMode, page: u32) -> AppResult<Self> {
        if page == 0 || page > MAX_PAGE {
            return Err(AppError::InvalidInput(format!(
                "Page must be between 1 and {}, got {}",
                MAX_PAGE, page
            )));
        }
        Ok(Self { kind, mode, page })
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn mode(&self) -> &QueryMode {
        &self.mode
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_str() {
        assert_eq!("movie".parse::<MediaKind>().unwrap(), MediaKind::Movie);
        assert_eq!("tv".parse::<MediaKind>().unwrap(), MediaKind::Tv);
        assert!("series".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_filters_collapse_defaults() {
        let explicit = DiscoverFilters::new()
            .with_genre(0)
            .with_max_runtime(0)
            .with_watch_providers(Vec::new())
            .with_watch_region("  ");
        assert_eq!(explicit, DiscoverFilters::default());
    }

    #[test]
    fn test_filters_sort_and_dedupe_providers() {
        let filters = DiscoverFilters::new().with_watch_providers(vec![337, 8, 8, 15]);
        let providers: Vec<u32> = filters.watch_providers().iter().copied().collect();
        assert_eq!(providers, vec![8, 15, 337]);
    }

    #[test]
    fn test_region_is_uppercased() {
        let filters = DiscoverFilters::new().with_watch_region("gb");
        assert_eq!(filters.watch_region(), Some("GB"));
    }

    #[test]
    fn test_sort_key_provider_param_per_kind() {
        assert_eq!(
            SortKey::ReleaseDateDesc.provider_param(MediaKind::Movie),
            "primary_release_date.desc"
        );
        assert_eq!(
            SortKey::ReleaseDateDesc.provider_param(MediaKind::Tv),
            "first_air_date.desc"
        );
        assert_eq!(
            SortKey::VoteAverageDesc.provider_param(MediaKind::Tv),
            "vote_average.desc"
        );
    }

    #[test]
    fn test_sort_key_serde() {
        let key: SortKey = serde_json::from_str("\"vote_count.asc\"").unwrap();
        assert_eq!(key, SortKey::VoteCountAsc);
        assert!(serde_json::from_str::<SortKey>("\"rating\"").is_err());
    }

    #[test]
    fn test_page_bounds() {
        assert!(CatalogQuery::discover(MediaKind::Movie, DiscoverFilters::new(), 0).is_err());
        assert!(CatalogQuery::discover(MediaKind::Movie, DiscoverFilters::new(), 501).is_err());
        assert!(CatalogQuery::discover(MediaKind::Movie, DiscoverFilters::new(), 500).is_ok());
    }

    #[test]
    fn test_empty_search_rejected() {
        let result = CatalogQuery::search(MediaKind::Tv, "   ", 1);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_category_kind_combinations() {
        assert!(CatalogQuery::fixed_category(MediaKind::Movie, Category::NowPlaying, 1).is_ok());
        assert!(CatalogQuery::fixed_category(MediaKind::Tv, Category::NowPlaying, 1).is_err());
        assert!(CatalogQuery::fixed_category(MediaKind::Tv, Category::AiringToday, 1).is_ok());
        assert!(CatalogQuery::fixed_category(MediaKind::Movie, Category::OnTheAir, 1).is_err());
        assert!(CatalogQuery::fixed_category(MediaKind::Tv, Category::TopRated, 2).is_ok());
    }

    #[test]
    fn test_category_serde_snake_case() {
        let category: Category = serde_json::from_str("\"airing_today\"").unwrap();
        assert_eq!(category, Category::AiringToday);
        assert_eq!(category.as_str(), "airing_today");
    }
}
