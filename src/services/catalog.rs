use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, Mutex, RwLock},
    time::MissedTickBehavior,
};

use crate::{
    config::{Config, PropertyNames},
    error::{AppError, AppResult},
    models::Catalog,
    services::store::RecordStore,
};

/// Drains the record store into a fresh `Catalog`
#[derive(Clone)]
pub struct CatalogBuilder {
    store: Arc<dyn RecordStore>,
    props: PropertyNames,
    max_pages: usize,
}

impl CatalogBuilder {
    pub fn new(store: Arc<dyn RecordStore>, props: PropertyNames, max_pages: usize) -> Self {
        Self {
            store,
            props,
            max_pages,
        }
    }

    pub fn from_config(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        Self::new(store, config.property_names(), config.max_pages)
    }

    /// Requests every page of unwatched records in order and maps them.
    ///
    /// Stops with `TooManyPages` once `max_pages` requests have been made and
    /// the store still reports more. Malformed records are skipped.
    pub async fn build(&self) -> AppResult<Catalog> {
        let mut movies = Vec::new();
        let mut skipped = 0usize;
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            if pages == self.max_pages {
                tracing::error!(
                    max_pages = self.max_pages,
                    store = self.store.name(),
                    "Record store kept reporting more pages"
                );
                return Err(AppError::TooManyPages(self.max_pages));
            }

            let page = self.store.query_unwatched(cursor.take()).await?;
            pages += 1;

            for record in &page.records {
                match record.to_movie(&self.props) {
                    Ok(movie) => movies.push(movie),
                    Err(e) => {
                        skipped += 1;
                        tracing::warn!(error = %e, "Skipping malformed record");
                    }
                }
            }

            if !page.has_more {
                break;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    return Err(AppError::UpstreamFetch(
                        "page reported more results without a cursor".to_string(),
                    ))
                }
            }
        }

        let catalog = Catalog::new(movies);

        tracing::info!(
            pages = pages,
            movies = catalog.len(),
            categories = catalog.categories().len(),
            skipped = skipped,
            store = self.store.name(),
            "Catalog built"
        );

        Ok(catalog)
    }
}

/// Holds the catalog currently served to the user.
///
/// A rebuild happens without holding the read/write lock and the result
/// replaces the old catalog in one write, so readers never see a half-built
/// catalog. Rebuilds are serialized so an older build never overwrites a
/// newer one.
#[derive(Clone)]
pub struct CatalogState {
    builder: CatalogBuilder,
    current: Arc<RwLock<Option<Catalog>>>,
    rebuild: Arc<Mutex<()>>,
    interval: Duration,
}

impl CatalogState {
    pub fn new(builder: CatalogBuilder, interval: Duration) -> Self {
        Self {
            builder,
            current: Arc::new(RwLock::new(None)),
            rebuild: Arc::new(Mutex::new(())),
            interval,
        }
    }

    /// Rebuilds the catalog and swaps it in.
    ///
    /// On failure the previous catalog, if any, stays in place.
    pub async fn refresh(&self) -> AppResult<Catalog> {
        let _rebuild = self.rebuild.lock().await;
        self.rebuild_locked().await
    }

    /// Caller must hold `self.rebuild`
    async fn rebuild_locked(&self) -> AppResult<Catalog> {
        match self.builder.build().await {
            Ok(catalog) => {
                *self.current.write().await = Some(catalog.clone());
                Ok(catalog)
            }
            Err(e) => {
                let has_previous = self.is_loaded().await;
                tracing::warn!(
                    error = %e,
                    serving_previous = has_previous,
                    "Catalog rebuild failed"
                );
                Err(e)
            }
        }
    }

    async fn snapshot(&self) -> Option<Catalog> {
        self.current.read().await.clone()
    }

    /// Returns the loaded catalog, building it first if none is loaded
    pub async fn current(&self) -> AppResult<Catalog> {
        if let Some(catalog) = self.snapshot().await {
            return Ok(catalog);
        }

        let _rebuild = self.rebuild.lock().await;
        // another request may have finished the first build while we waited
        if let Some(catalog) = self.snapshot().await {
            return Ok(catalog);
        }
        self.rebuild_locked().await
    }

    /// Builds the catalog if none is loaded yet
    pub async fn ensure_loaded(&self) -> AppResult<()> {
        self.current().await.map(|_| ())
    }

    pub async fn is_loaded(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Runs `f` against the loaded catalog under the write lock.
    /// Fails with `NotFound` when nothing is loaded.
    pub async fn with_catalog_mut<T>(
        &self,
        f: impl FnOnce(&mut Catalog) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut guard = self.current.write().await;
        match guard.as_mut() {
            Some(catalog) => f(catalog),
            None => Err(AppError::NotFound("No catalog loaded".to_string())),
        }
    }

    /// Spawns the background task that rebuilds the catalog every interval
    pub fn spawn_revalidation(&self) -> RevalidationHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let state = self.clone();
        tokio::spawn(async move {
            state.revalidation_task(shutdown_rx).await;
        });
        RevalidationHandle { shutdown_tx }
    }

    async fn revalidation_task(self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Catalog revalidation task started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // errors are logged by refresh and the old catalog stays
                    let _ = self.refresh().await;
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Catalog revalidation task stopped");
                    break;
                }
            }
        }
    }
}

/// Handle for stopping the background revalidation task
pub struct RevalidationHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl RevalidationHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Catalog revalidation shutdown signal sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::NotionPage,
        services::store::{MockRecordStore, RecordPage},
    };
    use crate::models::MovieId;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn record(id: &str, title: &str, categories: &[&str]) -> NotionPage {
        let options: Vec<_> = categories.iter().map(|c| json!({ "name": c })).collect();
        serde_json::from_value(json!({
            "id": id,
            "properties": {
                "Title": { "type": "title", "title": [{ "plain_text": title }] },
                "Categories": { "type": "multi_select", "multi_select": options }
            }
        }))
        .unwrap()
    }

    fn untitled(id: &str) -> NotionPage {
        serde_json::from_value(json!({
            "id": id,
            "properties": {
                "Title": { "type": "title", "title": [] },
                "Categories": { "type": "multi_select", "multi_select": [] }
            }
        }))
        .unwrap()
    }

    fn page(records: Vec<NotionPage>, next_cursor: Option<&str>) -> RecordPage {
        RecordPage {
            records,
            has_more: next_cursor.is_some(),
            next_cursor: next_cursor.map(str::to_string),
        }
    }

    fn builder(store: MockRecordStore, max_pages: usize) -> CatalogBuilder {
        CatalogBuilder::new(Arc::new(store), PropertyNames::default(), max_pages)
    }

    fn two_page_store() -> MockRecordStore {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        let first = page(
            vec![
                record("1", "Alien", &["Horror", "Sci-Fi"]),
                record("2", "Airplane!", &["Comedy"]),
            ],
            Some("cursor-2"),
        );
        let second = page(vec![record("3", "Aliens", &["Sci-Fi", "Action"])], None);
        store
            .expect_query_unwatched()
            .withf(|cursor| cursor.is_none())
            .times(1)
            .returning(move |_| Ok(first.clone()));
        store
            .expect_query_unwatched()
            .withf(|cursor| cursor.as_deref() == Some("cursor-2"))
            .times(1)
            .returning(move |_| Ok(second.clone()));
        store
    }

    #[tokio::test]
    async fn test_build_drains_pages_in_order() {
        let catalog = builder(two_page_store(), 10).build().await.unwrap();

        let titles: Vec<&str> = catalog.movies().iter().map(|m| m.title()).collect();
        assert_eq!(titles, vec!["Alien", "Airplane!", "Aliens"]);
        assert_eq!(
            catalog.categories().as_slice(),
            &["Horror", "Sci-Fi", "Comedy", "Action"]
        );
    }

    #[tokio::test]
    async fn test_build_empty_store() {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        store
            .expect_query_unwatched()
            .times(1)
            .returning(|_| Ok(RecordPage::default()));

        let catalog = builder(store, 10).build().await.unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.categories().is_empty());
    }

    #[tokio::test]
    async fn test_build_skips_malformed_records() {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        store.expect_query_unwatched().times(1).returning(|_| {
            Ok(page(
                vec![untitled("bad"), record("good", "Heat", &["Crime"])],
                None,
            ))
        });

        let catalog = builder(store, 10).build().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.movies()[0].title(), "Heat");
    }

    #[tokio::test]
    async fn test_build_fails_on_fetch_error() {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        store
            .expect_query_unwatched()
            .withf(|cursor| cursor.is_none())
            .returning(|_| Ok(page(vec![record("1", "Alien", &[])], Some("c2"))));
        store
            .expect_query_unwatched()
            .withf(|cursor| cursor.as_deref() == Some("c2"))
            .returning(|_| Err(AppError::UpstreamFetch("503".to_string())));

        let result = builder(store, 10).build().await;
        assert!(matches!(result, Err(AppError::UpstreamFetch(_))));
    }

    #[tokio::test]
    async fn test_build_stops_at_page_ceiling() {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        store
            .expect_query_unwatched()
            .times(3)
            .returning(|_| Ok(page(vec![], Some("again"))));

        let result = builder(store, 3).build().await;
        assert!(matches!(result, Err(AppError::TooManyPages(3))));
    }

    #[tokio::test]
    async fn test_build_rejects_more_without_cursor() {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        store.expect_query_unwatched().times(1).returning(|_| {
            Ok(RecordPage {
                records: vec![],
                has_more: true,
                next_cursor: None,
            })
        });

        let result = builder(store, 10).build().await;
        assert!(matches!(result, Err(AppError::UpstreamFetch(_))));
    }

    #[tokio::test]
    async fn test_state_builds_on_first_access() {
        let state = CatalogState::new(builder(two_page_store(), 10), Duration::from_secs(60));
        assert!(!state.is_loaded().await);

        let catalog = assert_ok!(state.current().await);
        assert_eq!(catalog.len(), 3);
        assert!(state.is_loaded().await);

        // served from memory, the mock only allows one query per cursor
        let again = assert_ok!(state.current().await);
        assert_eq!(again.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_catalog() {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        let mut calls = 0;
        store.expect_query_unwatched().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(page(vec![record("1", "Alien", &["Horror"])], None))
            } else {
                Err(AppError::UpstreamFetch("timeout".to_string()))
            }
        });

        let state = CatalogState::new(builder(store, 10), Duration::from_secs(60));
        assert_ok!(state.refresh().await);
        assert_err!(state.refresh().await);

        let catalog = assert_ok!(state.current().await);
        assert_eq!(catalog.movies()[0].title(), "Alien");
    }

    #[tokio::test]
    async fn test_failed_first_build_is_an_error() {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        store
            .expect_query_unwatched()
            .returning(|_| Err(AppError::UpstreamFetch("unauthorized".to_string())));

        let state = CatalogState::new(builder(store, 10), Duration::from_secs(60));
        assert_err!(state.current().await);
    }

    #[tokio::test]
    async fn test_ensure_loaded_builds_once() {
        let state = CatalogState::new(builder(two_page_store(), 10), Duration::from_secs(60));
        assert_ok!(state.ensure_loaded().await);
        assert_ok!(state.ensure_loaded().await);
        let len = assert_ok!(state.with_catalog_mut(|c| Ok(c.len())).await);
        assert_eq!(len, 3);
    }

    #[tokio::test]
    async fn test_with_catalog_mut_without_catalog() {
        let store = MockRecordStore::new();
        let state = CatalogState::new(builder(store, 10), Duration::from_secs(60));
        let result = state.with_catalog_mut(|c| Ok(c.len())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_revalidation_task_shutdown() {
        let mut store = MockRecordStore::new();
        store.expect_name().return_const("mock");
        store
            .expect_query_unwatched()
            .returning(|_| Ok(RecordPage::default()));

        let state = CatalogState::new(builder(store, 10), Duration::from_secs(3600));
        let handle = state.spawn_revalidation();

        // the first tick fires immediately and loads the empty state
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.is_loaded().await);

        handle.shutdown().await;
    }

    /// Single-page store that takes `latency` per query and counts queries
    struct CountingStore {
        queries: Arc<AtomicUsize>,
        latency: Duration,
    }

    impl CountingStore {
        fn new(latency: Duration) -> (Self, Arc<AtomicUsize>) {
            let queries = Arc::new(AtomicUsize::new(0));
            let store = Self {
                queries: queries.clone(),
                latency,
            };
            (store, queries)
        }
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn query_unwatched(&self, _cursor: Option<String>) -> AppResult<RecordPage> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.latency).await;
            Ok(page(vec![record(&n.to_string(), "Alien", &["Horror"])], None))
        }

        async fn set_watched(&self, _id: &MovieId, _watched: bool) -> AppResult<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn counting_state(latency: Duration, interval: Duration) -> (CatalogState, Arc<AtomicUsize>) {
        let (store, queries) = CountingStore::new(latency);
        let builder = CatalogBuilder::new(Arc::new(store), PropertyNames::default(), 10);
        (CatalogState::new(builder, interval), queries)
    }

    #[tokio::test(start_paused = true)]
    async fn test_revalidation_rebuilds_every_interval() {
        let (state, queries) =
            counting_state(Duration::from_millis(200), Duration::from_secs(1));
        let handle = state.spawn_revalidation();

        // ticks at 0s, 1s, ..., 10s, each build finishing 200ms later
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(queries.load(Ordering::SeqCst), 11);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_builds_once() {
        let (state, queries) =
            counting_state(Duration::from_millis(500), Duration::from_secs(60));

        let (a, b, c) = tokio::join!(state.current(), state.current(), state.ensure_loaded());
        assert_ok!(c);
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(queries.load(Ordering::SeqCst), 1);
        assert_eq!(a.built_at(), b.built_at());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_keep_latest_build() {
        let (state, queries) =
            counting_state(Duration::from_millis(500), Duration::from_secs(60));

        let (first, second) = tokio::join!(state.refresh(), state.refresh());
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(queries.load(Ordering::SeqCst), 2);

        // the second build runs after the first and is the one kept
        let ids: Vec<&str> = [&first, &second]
            .iter()
            .map(|c| c.movies()[0].id().as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
        let current = assert_ok!(state.current().await);
        assert_eq!(current.movies()[0].id().as_str(), "2");
    }
}
