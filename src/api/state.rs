use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::Config,
    services::{CatalogBuilder, CatalogState, RecordStore},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogState,
    pub store: Arc<dyn RecordStore>,
    /// Source of randomness for picks, seedable for reproducible runs
    pub rng: Arc<Mutex<StdRng>>,
}

impl AppState {
    /// Wires the catalog, store and RNG from configuration
    pub fn new(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        let builder = CatalogBuilder::from_config(store.clone(), config);
        let catalog = CatalogState::new(builder, config.revalidate_interval());
        let rng = match config.pick_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::from_parts(catalog, store, rng)
    }

    pub fn from_parts(catalog: CatalogState, store: Arc<dyn RecordStore>, rng: StdRng) -> Self {
        Self {
            catalog,
            store,
            rng: Arc::new(Mutex::new(rng)),
        }
    }
}
