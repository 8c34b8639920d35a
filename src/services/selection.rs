use rand::Rng;

use crate::{
    error::{AppError, AppResult},
    models::{MovieRecord, SelectionCriteria},
};

/// Movies eligible for a pick: those sharing at least one category with the
/// criteria, or every movie when no category is selected.
pub fn candidate_pool<'a>(
    movies: &'a [MovieRecord],
    criteria: &SelectionCriteria,
) -> Vec<&'a MovieRecord> {
    if criteria.is_empty() {
        movies.iter().collect()
    } else {
        movies.iter().filter(|m| criteria.matches(m)).collect()
    }
}

/// Picks one candidate uniformly at random
pub fn pick<'a, R>(
    movies: &'a [MovieRecord],
    criteria: &SelectionCriteria,
    rng: &mut R,
) -> AppResult<&'a MovieRecord>
where
    R: Rng,
{
    let pool = candidate_pool(movies, criteria);
    if pool.is_empty() {
        return Err(AppError::EmptyPool);
    }

    let index = rng.random_range(0..pool.len());
    Ok(pool[index])
}
