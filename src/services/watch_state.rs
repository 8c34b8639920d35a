use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{Catalog, MovieId, WatchState},
    services::{catalog::CatalogState, store::RecordStore},
};

/// Flips the local watched flag of one movie and returns the new value.
/// Leaves the catalog untouched when the id is unknown.
pub fn flip_local(catalog: &mut Catalog, id: &MovieId) -> AppResult<bool> {
    catalog
        .get_mut(id)
        .map(|movie| movie.flip_pending())
        .ok_or_else(|| AppError::NotFound(format!("Movie {} is not in the catalog", id)))
}

/// Records that the store accepted `watched` for `id`.
///
/// `flipped_in` is the build time of the catalog the flip was applied to. If
/// the catalog has been rebuilt since, its record never saw the flip, so both
/// flags take the accepted value. Returns `None` if the movie is gone.
pub fn confirm_local(
    catalog: &mut Catalog,
    id: &MovieId,
    watched: bool,
    flipped_in: DateTime<Utc>,
) -> Option<WatchState> {
    let rebuilt = catalog.built_at() != flipped_in;
    catalog.get_mut(id).map(|movie| {
        if rebuilt {
            movie.settle(watched);
        } else {
            movie.confirm(watched);
        }
        movie.watch()
    })
}

/// Optimistically toggles a movie's watched flag and persists it upstream.
///
/// The local flip is applied before the store call and is kept when the store
/// call fails, leaving the movie unreconciled until the next rebuild.
pub async fn toggle_watched(
    state: &CatalogState,
    store: &Arc<dyn RecordStore>,
    id: &MovieId,
) -> AppResult<WatchState> {
    let (pending, flipped_in) = state
        .with_catalog_mut(|catalog| Ok((flip_local(catalog, id)?, catalog.built_at())))
        .await?;

    if let Err(e) = store.set_watched(id, pending).await {
        tracing::warn!(
            movie_id = %id,
            pending = pending,
            error = %e,
            "Watched flag not persisted, local state left unreconciled"
        );
        return Err(match e {
            AppError::UpstreamUpdate(_) => e,
            other => AppError::UpstreamUpdate(other.to_string()),
        });
    }

    // the catalog may have been rebuilt while the update was in flight
    let watch = state
        .with_catalog_mut(|catalog| Ok(confirm_local(catalog, id, pending, flipped_in)))
        .await
        .ok()
        .flatten()
        .unwrap_or(WatchState {
            pending,
            confirmed: pending,
        });

    tracing::debug!(movie_id = %id, watched = pending, "Watch state toggled");

    Ok(watch)
}
