use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    db::CacheStatsSnapshot,
    error::{AppError, AppResult},
    middleware::identity::{CurrentUser, MaybeUser},
    models::{
        CatalogQuery, Category, CollectionKind, DiscoverFilters, GenreListing, MediaKind,
        Membership, PersonalizedPage, ResourceId, SortKey, UserId,
    },
};

use super::AppState;

// Request/Response types

#[derive(Debug, Default, Deserialize)]
pub struct DiscoverParams {
    pub genre: Option<u32>,
    pub sort_by: Option<SortKey>,
    /// Comma-separated watch-provider ids
    pub providers: Option<String>,
    pub region: Option<String>,
    pub max_runtime: Option<u32>,
    pub page: Option<u32>,
}

impl DiscoverParams {
    fn filters(&self) -> AppResult<DiscoverFilters> {
        let mut filters = DiscoverFilters::new()
            .with_genre(self.genre.unwrap_or(0))
            .with_sort(self.sort_by.unwrap_or_default())
            .with_max_runtime(self.max_runtime.unwrap_or(0));

        if let Some(raw) = &self.providers {
            let providers = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u32>().map_err(|_| {
                        AppError::InvalidInput(format!("Invalid watch provider id: {}", s))
                    })
                })
                .collect::<AppResult<Vec<u32>>>()?;
            filters = filters.with_watch_providers(providers);
        }
        if let Some(region) = &self.region {
            filters = filters.with_watch_region(region);
        }

        Ok(filters)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub resource_id: ResourceId,
    pub resource_type: MediaKind,
    pub collection: CollectionKind,
}

impl MembershipRequest {
    fn into_membership(self, user_id: UserId) -> Membership {
        Membership {
            user_id,
            resource_id: self.resource_id,
            resource_type: self.resource_type,
            collection: self.collection,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckParams {
    pub resource_id: ResourceId,
    pub resource_type: MediaKind,
    pub collection: Option<CollectionKind>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub member: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub resource_type: MediaKind,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

async fn answer(
    state: &AppState,
    query: CatalogQuery,
    user: Option<UserId>,
) -> AppResult<Json<PersonalizedPage>> {
    let page = state.aggregator.query(&query).await?;
    Ok(Json(state.overlay.personalize(&page, user.as_ref()).await))
}

/// Discover listing filtered by genre, providers, region and runtime
pub async fn discover(
    State(state): State<AppState>,
    Path(kind): Path<MediaKind>,
    MaybeUser(user): MaybeUser,
    Query(params): Query<DiscoverParams>,
) -> AppResult<Json<PersonalizedPage>> {
    let query = CatalogQuery::discover(kind, params.filters()?, params.page.unwrap_or(1))?;
    answer(&state, query, user).await
}

/// Free-text search
pub async fn search(
    State(state): State<AppState>,
    Path(kind): Path<MediaKind>,
    MaybeUser(user): MaybeUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<PersonalizedPage>> {
    let query = CatalogQuery::search(kind, &params.q, params.page.unwrap_or(1))?;
    answer(&state, query, user).await
}

/// Fixed category listing such as now playing or top rated
pub async fn category(
    State(state): State<AppState>,
    Path((kind, category)): Path<(MediaKind, Category)>,
    MaybeUser(user): MaybeUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PersonalizedPage>> {
    let page = state
        .aggregator
        .query_fixed_category(kind, category, params.page.unwrap_or(1))
        .await?;
    Ok(Json(state.overlay.personalize(&page, user.as_ref()).await))
}

/// Genre taxonomy for a media kind
pub async fn genres(
    State(state): State<AppState>,
    Path(kind): Path<MediaKind>,
) -> AppResult<Json<GenreListing>> {
    let page = state.aggregator.query(&CatalogQuery::genre_list(kind)).await?;
    Ok(Json(GenreListing::from_page(kind, &page)))
}

/// Add a title to one of the caller's collections
pub async fn add_membership(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<MembershipRequest>,
) -> AppResult<StatusCode> {
    let membership = request.into_membership(user);
    state.collections.add(&membership).await?;
    tracing::info!(
        user_id = %membership.user_id,
        resource_id = membership.resource_id,
        collection = %membership.collection,
        "Membership added"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a title from one of the caller's collections
pub async fn remove_membership(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<MembershipRequest>,
) -> AppResult<StatusCode> {
    let membership = request.into_membership(user);
    state.collections.remove(&membership).await?;
    tracing::info!(
        user_id = %membership.user_id,
        resource_id = membership.resource_id,
        collection = %membership.collection,
        "Membership removed"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Whether a title is in one of the caller's collections (watchlist by default)
pub async fn check_membership(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<CheckParams>,
) -> AppResult<Json<CheckResponse>> {
    let membership = Membership {
        user_id: user,
        resource_id: params.resource_id,
        resource_type: params.resource_type,
        collection: params.collection.unwrap_or(CollectionKind::Watchlist),
    };
    let member = state.collections.is_member(&membership).await?;
    Ok(Json(CheckResponse { member }))
}

/// All of the caller's memberships for a media kind, newest first
pub async fn list_memberships(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<Membership>>> {
    let memberships = state
        .collections
        .list_by_user_and_type(&user, params.resource_type)
        .await?;
    Ok(Json(memberships))
}

/// Cache counters
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsSnapshot> {
    Json(state.cache().stats())
}

/// Drop every page held by this process
pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.cache().clear();
    Json(json!({ "cleared": cleared }))
}
