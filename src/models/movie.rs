use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Display};

/// Opaque identifier of a movie in the record store (a Notion page id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(String);

impl MovieId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MovieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Watched flag split into the optimistic local value and the last value
/// the record store acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchState {
    pub pending: bool,
    pub confirmed: bool,
}

impl WatchState {
    pub fn is_watched(&self) -> bool {
        self.pending
    }

    /// True when the local flag matches what the store last confirmed
    pub fn is_reconciled(&self) -> bool {
        self.pending == self.confirmed
    }
}

/// One unwatched movie from the record store
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    id: MovieId,
    title: String,
    categories: Vec<String>,
    watch: WatchState,
}

impl MovieRecord {
    /// Creates a record that is unwatched both locally and upstream.
    /// Repeated category labels are kept once, in first-seen order.
    pub fn new(id: MovieId, title: impl Into<String>, categories: Vec<String>) -> Self {
        let mut distinct: Vec<String> = Vec::with_capacity(categories.len());
        for category in categories {
            if !distinct.contains(&category) {
                distinct.push(category);
            }
        }

        Self {
            id,
            title: title.into(),
            categories: distinct,
            watch: WatchState::default(),
        }
    }

    pub fn id(&self) -> &MovieId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn watch(&self) -> WatchState {
        self.watch
    }

    pub fn is_watched(&self) -> bool {
        self.watch.is_watched()
    }

    /// Flips the local flag and returns the new value
    pub(crate) fn flip_pending(&mut self) -> bool {
        self.watch.pending = !self.watch.pending;
        self.watch.pending
    }

    pub(crate) fn confirm(&mut self, watched: bool) {
        self.watch.confirmed = watched;
    }

    /// Sets both flags to a value the store has already accepted
    pub(crate) fn settle(&mut self, watched: bool) {
        self.watch = WatchState {
            pending: watched,
            confirmed: watched,
        };
    }
}

/// Distinct category labels in the order they were first seen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySet(Vec<String>);

impl CategorySet {
    pub fn from_movies(movies: &[MovieRecord]) -> Self {
        let mut labels: Vec<String> = Vec::new();
        for category in movies.iter().flat_map(|m| m.categories()) {
            if !labels.contains(category) {
                labels.push(category.clone());
            }
        }
        Self(labels)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|c| c == label)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Categories chosen for a single pick. Empty means "anything".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SelectionCriteria(HashSet<String>);

impl SelectionCriteria {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(categories.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// OR semantics: any shared category is a match
    pub fn matches(&self, movie: &MovieRecord) -> bool {
        movie.categories().iter().any(|c| self.0.contains(c))
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

/// Flattened list of unwatched movies from one build cycle
#[derive(Debug, Clone)]
pub struct Catalog {
    movies: Vec<MovieRecord>,
    categories: CategorySet,
    built_at: DateTime<Utc>,
}

impl Catalog {
    pub fn new(movies: Vec<MovieRecord>) -> Self {
        Self::with_timestamp(movies, Utc::now())
    }

    pub fn with_timestamp(movies: Vec<MovieRecord>, built_at: DateTime<Utc>) -> Self {
        let categories = CategorySet::from_movies(&movies);
        Self {
            movies,
            categories,
            built_at,
        }
    }

    pub fn movies(&self) -> &[MovieRecord] {
        &self.movies
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn get(&self, id: &MovieId) -> Option<&MovieRecord> {
        self.movies.iter().find(|m| m.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: &MovieId) -> Option<&mut MovieRecord> {
        self.movies.iter_mut().find(|m| m.id() == id)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}
