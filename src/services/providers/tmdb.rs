/// TMDB catalog provider
///
/// API Flow:
/// 1. Discover: /discover/{kind} with genre, sort, watch-provider, region and runtime filters
/// 2. Search: /search/{kind}?query=
/// 3. Fixed categories: /{kind}/{category} (now_playing, top_rated, ...)
/// 4. Genre taxonomy: /genre/{kind}/list (not paginated)
use crate::{
    error::FetchError,
    models::{CatalogItem, CatalogQuery, MediaKind, Page, QueryMode},
    services::providers::CatalogProvider,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Longest slice of an error body kept in `UpstreamRejected`
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Deserialize)]
struct ApiPage {
    page: u32,
    results: Vec<Map<String, Value>>,
    total_pages: u32,
    total_results: u32,
}

#[derive(Debug, Deserialize)]
struct ApiGenreList {
    genres: Vec<Map<String, Value>>,
}

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_token: String,
    api_url: String,
    language: String,
}

impl TmdbProvider {
    pub fn new(
        api_token: String,
        api_url: String,
        language: String,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            language,
        })
    }

    /// Path of the endpoint serving this query, relative to the API root
    fn endpoint(query: &CatalogQuery) -> String {
        let kind = query.kind();
        match query.mode() {
            QueryMode::Discover(_) => format!("/discover/{}", kind),
            QueryMode::Search { .. } => format!("/search/{}", kind),
            QueryMode::FixedCategory(category) => format!("/{}/{}", kind, category.as_str()),
            QueryMode::GenreList => format!("/genre/{}/list", kind),
        }
    }

    fn query_params(&self, query: &CatalogQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![("language", self.language.clone())];

        match query.mode() {
            QueryMode::GenreList => return params,
            QueryMode::Discover(filters) => {
                params.push(("include_adult", "false".to_string()));
                params.push(("sort_by", filters.sort_by().provider_param(query.kind())));
                if let Some(genre) = filters.genre_id() {
                    params.push(("with_genres", genre.to_string()));
                }
                if !filters.watch_providers().is_empty() {
                    let providers: Vec<String> = filters
                        .watch_providers()
                        .iter()
                        .map(|id| id.to_string())
                        .collect();
                    // '|' means "any of" to the provider
                    params.push(("with_watch_providers", providers.join("|")));
                }
                if let Some(region) = filters.watch_region() {
                    params.push(("watch_region", region.to_string()));
                }
                if let Some(runtime) = filters.max_runtime() {
                    params.push(("with_runtime.lte", runtime.to_string()));
                }
            }
            QueryMode::Search { term } => {
                params.push(("include_adult", "false".to_string()));
                params.push(("query", term.clone()));
            }
            QueryMode::FixedCategory(_) => {}
        }

        params.push(("page", query.page().to_string()));
        params
    }

    fn parse_page(query: &CatalogQuery, body: &str) -> Result<Page, FetchError> {
        let kind = query.kind();

        if let QueryMode::GenreList = query.mode() {
            let list: ApiGenreList = serde_json::from_str(body)
                .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
            let items = list
                .genres
                .into_iter()
                .map(|fields| into_item(kind, fields))
                .collect::<Result<Vec<_>, _>>()?;
            let total = items.len() as u32;
            return Ok(Page {
                page: 1,
                total_pages: 1,
                total_results: total,
                items,
            });
        }

        let raw: ApiPage = serde_json::from_str(body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
        let items = raw
            .results
            .into_iter()
            .map(|fields| into_item(kind, fields))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            page: raw.page,
            total_pages: raw.total_pages,
            total_results: raw.total_results,
            items,
        })
    }
}

fn into_item(kind: MediaKind, mut fields: Map<String, Value>) -> Result<CatalogItem, FetchError> {
    let id = fields
        .remove("id")
        .and_then(|id| id.as_u64())
        .ok_or_else(|| FetchError::MalformedResponse("result item without numeric id".to_string()))?;

    Ok(CatalogItem {
        id,
        media_kind: kind,
        fields,
    })
}

#[async_trait::async_trait]
impl CatalogProvider for TmdbProvider {
    async fn fetch(&self, query: &CatalogQuery) -> Result<Page, FetchError> {
        let url = format!("{}{}", self.api_url, Self::endpoint(query));

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_token)
            .query(&self.query_params(query))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(ERROR_BODY_LIMIT)
                    .map(|(i, _)| i)
                    .unwrap_or(body.len()),
            );
            tracing::error!(
                url = %url,
                status = %status,
                body = %body,
                "Catalog request rejected"
            );
            return Err(FetchError::UpstreamRejected {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let page = Self::parse_page(query, &body).map_err(|e| {
            tracing::error!(url = %url, error = %e, "Catalog response did not match expected shape");
            e
        })?;

        tracing::info!(
            url = %url,
            page = page.page,
            results = page.items.len(),
            provider = self.name(),
            "Catalog page fetched"
        );

        Ok(page)
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, DiscoverFilters, SortKey};

    fn create_test_provider() -> TmdbProvider {
        TmdbProvider::new(
            "test_token".to_string(),
            "http://test.local/3/".to_string(),
            "en-US".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn param<'a>(params: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_endpoints() {
        let discover =
            CatalogQuery::discover(MediaKind::Movie, DiscoverFilters::new(), 1).unwrap();
        let search = CatalogQuery::search(MediaKind::Tv, "severance", 1).unwrap();
        let category =
            CatalogQuery::fixed_category(MediaKind::Tv, Category::AiringToday, 1).unwrap();
        let genres = CatalogQuery::genre_list(MediaKind::Movie);

        assert_eq!(TmdbProvider::endpoint(&discover), "/discover/movie");
        assert_eq!(TmdbProvider::endpoint(&search), "/search/tv");
        assert_eq!(TmdbProvider::endpoint(&category), "/tv/airing_today");
        assert_eq!(TmdbProvider::endpoint(&genres), "/genre/movie/list");
    }

    #[test]
    fn test_trailing_slash_trimmed_from_base_url() {
        let provider = create_test_provider();
        assert_eq!(provider.api_url, "http://test.local/3");
    }

    #[test]
    fn test_discover_params() {
        let provider = create_test_provider();
        let query = CatalogQuery::discover(
            MediaKind::Tv,
            DiscoverFilters::new()
                .with_genre(18)
                .with_sort(SortKey::ReleaseDateDesc)
                .with_watch_providers(vec![337, 8])
                .with_watch_region("us")
                .with_max_runtime(60),
            2,
        )
        .unwrap();

        let params = provider.query_params(&query);
        assert_eq!(param(&params, "with_genres"), Some("18"));
        assert_eq!(param(&params, "sort_by"), Some("first_air_date.desc"));
        assert_eq!(param(&params, "with_watch_providers"), Some("8|337"));
        assert_eq!(param(&params, "watch_region"), Some("US"));
        assert_eq!(param(&params, "with_runtime.lte"), Some("60"));
        assert_eq!(param(&params, "page"), Some("2"));
        assert_eq!(param(&params, "language"), Some("en-US"));
    }

    #[test]
    fn test_discover_params_omit_absent_filters() {
        let provider = create_test_provider();
        let query =
            CatalogQuery::discover(MediaKind::Movie, DiscoverFilters::new(), 1).unwrap();

        let params = provider.query_params(&query);
        assert_eq!(param(&params, "with_genres"), None);
        assert_eq!(param(&params, "with_watch_providers"), None);
        assert_eq!(param(&params, "sort_by"), Some("popularity.desc"));
    }

    #[test]
    fn test_search_params_keep_original_term() {
        let provider = create_test_provider();
        let query = CatalogQuery::search(MediaKind::Movie, "  Blade Runner ", 1).unwrap();
        let params = provider.query_params(&query);
        assert_eq!(param(&params, "query"), Some("Blade Runner"));
    }

    #[test]
    fn test_genre_list_has_no_page_param() {
        let provider = create_test_provider();
        let params = provider.query_params(&CatalogQuery::genre_list(MediaKind::Tv));
        assert_eq!(param(&params, "page"), None);
    }

    #[test]
    fn test_parse_page_success() {
        let query =
            CatalogQuery::fixed_category(MediaKind::Movie, Category::TopRated, 1).unwrap();
        let body = r#"{
            "page": 1,
            "results": [
                {"id": 278, "title": "The Shawshank Redemption", "vote_average": 8.7},
                {"id": 238, "title": "The Godfather", "vote_average": 8.7}
            ],
            "total_pages": 500,
            "total_results": 10000
        }"#;

        let page = TmdbProvider::parse_page(&query, body).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 500);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, 278);
        assert_eq!(page.items[0].media_kind, MediaKind::Movie);
        assert_eq!(page.items[0].fields["title"], "The Shawshank Redemption");
        assert!(!page.items[0].fields.contains_key("id"));
    }

    #[test]
    fn test_parse_genre_list() {
        let query = CatalogQuery::genre_list(MediaKind::Movie);
        let body = r#"{"genres": [{"id": 28, "name": "Action"}, {"id": 35, "name": "Comedy"}]}"#;

        let page = TmdbProvider::parse_page(&query, body).unwrap();
        assert_eq!(page.total_results, 2);
        assert_eq!(page.items[1].id, 35);
        assert_eq!(page.items[1].fields["name"], "Comedy");
    }

    #[test]
    fn test_parse_page_malformed_json() {
        let query = CatalogQuery::search(MediaKind::Movie, "alien", 1).unwrap();
        let result = TmdbProvider::parse_page(&query, "<html>gateway timeout</html>");
        assert!(matches!(result, Err(FetchError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_page_item_without_id() {
        let query = CatalogQuery::search(MediaKind::Movie, "alien", 1).unwrap();
        let body = r#"{"page": 1, "results": [{"title": "Alien"}], "total_pages": 1, "total_results": 1}"#;
        let result = TmdbProvider::parse_page(&query, body);
        assert!(matches!(result, Err(FetchError::MalformedResponse(_))));
    }
}
