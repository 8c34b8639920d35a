use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{Catalog, MovieId, MovieRecord, SelectionCriteria, WatchState},
    services::{selection, watch_state},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Default, Deserialize)]
pub struct PickRequest {
    #[serde(default)]
    pub categories: SelectionCriteria,
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub id: MovieId,
    pub title: String,
    pub categories: Vec<String>,
    pub pending_watched: bool,
    pub confirmed_watched: bool,
    pub reconciled: bool,
}

impl From<&MovieRecord> for MovieResponse {
    fn from(movie: &MovieRecord) -> Self {
        let watch = movie.watch();
        Self {
            id: movie.id().clone(),
            title: movie.title().to_string(),
            categories: movie.categories().to_vec(),
            pending_watched: watch.pending,
            confirmed_watched: watch.confirmed,
            reconciled: watch.is_reconciled(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub built_at: DateTime<Utc>,
    pub categories: Vec<String>,
    pub movies: Vec<MovieResponse>,
}

impl From<&Catalog> for CatalogResponse {
    fn from(catalog: &Catalog) -> Self {
        Self {
            built_at: catalog.built_at(),
            categories: catalog.categories().as_slice().to_vec(),
            movies: catalog.movies().iter().map(MovieResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WatchStateResponse {
    pub id: MovieId,
    pub pending_watched: bool,
    pub confirmed_watched: bool,
    pub reconciled: bool,
}

impl WatchStateResponse {
    fn new(id: MovieId, watch: WatchState) -> Self {
        Self {
            id,
            pending_watched: watch.pending,
            confirmed_watched: watch.confirmed,
            reconciled: watch.is_reconciled(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub built_at: DateTime<Utc>,
    pub movie_count: usize,
    pub category_count: usize,
}

// Handlers

/// Single-page UI
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Distinct categories of the current catalog, in first-seen order
pub async fn get_categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let catalog = state.catalog.current().await?;
    Ok(Json(catalog.categories().as_slice().to_vec()))
}

/// Current catalog with per-movie watch state
pub async fn get_movies(State(state): State<AppState>) -> AppResult<Json<CatalogResponse>> {
    let catalog = state.catalog.current().await?;
    Ok(Json(CatalogResponse::from(&catalog)))
}

/// Picks a random movie matching any of the selected categories
pub async fn pick_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<PickRequest>,
) -> AppResult<Json<MovieResponse>> {
    let catalog = state.catalog.current().await?;

    let unknown: Vec<&String> = request
        .categories
        .iter()
        .filter(|c| !catalog.categories().contains(c))
        .collect();
    if !unknown.is_empty() {
        tracing::debug!(
            request_id = %request_id,
            unknown = ?unknown,
            "Pick request names categories outside the catalog"
        );
    }

    let picked = {
        let mut rng = state
            .rng
            .lock()
            .map_err(|_| AppError::Internal("Random source lock poisoned".to_string()))?;
        selection::pick(catalog.movies(), &request.categories, &mut *rng)
    };

    match picked {
        Ok(movie) => {
            tracing::info!(
                request_id = %request_id,
                criteria = request.categories.len(),
                movie_id = %movie.id(),
                "Movie picked"
            );
            Ok(Json(MovieResponse::from(movie)))
        }
        Err(e) => {
            tracing::info!(
                request_id = %request_id,
                criteria = request.categories.len(),
                catalog_size = catalog.len(),
                "No candidates for pick"
            );
            Err(e)
        }
    }
}

/// Flips a movie's watched flag and persists it
pub async fn toggle_watched(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> AppResult<Json<WatchStateResponse>> {
    let id = MovieId::new(id);
    state.catalog.ensure_loaded().await?;
    let watch = watch_state::toggle_watched(&state.catalog, &state.store, &id).await?;

    tracing::info!(
        request_id = %request_id,
        movie_id = %id,
        watched = watch.pending,
        "Watched flag toggled"
    );

    Ok(Json(WatchStateResponse::new(id, watch)))
}

/// Rebuilds the catalog from the record store on demand
pub async fn refresh_catalog(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<RefreshResponse>> {
    tracing::info!(request_id = %request_id, "Catalog refresh requested");

    let catalog = state.catalog.refresh().await?;

    Ok(Json(RefreshResponse {
        built_at: catalog.built_at(),
        movie_count: catalog.len(),
        category_count: catalog.categories().len(),
    }))
}
