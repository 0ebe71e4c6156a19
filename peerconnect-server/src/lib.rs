use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use peerconnect_common::UserProfile;
use tracing::info;

pub mod browse;
pub mod config;
pub mod error;
mod routes;
pub mod status;
pub mod storage;
pub mod store;
#[cfg(test)]
mod testing;

use config::{Config, StoreConfig};
use storage::Storage;
use store::ConnectionStore;

#[derive(Clone)]
pub struct State {
    pub store: Arc<ConnectionStore>,
    pub catalog: Arc<Vec<UserProfile>>,
}

impl State {
    pub fn new(storage: Storage, config: StoreConfig, catalog: Vec<UserProfile>) -> Self {
        Self {
            store: Arc::new(ConnectionStore::open(storage, config)),
            catalog: Arc::new(catalog),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let storage = Storage::open(&config.db_path)
            .with_context(|| format!("opening database at {}", config.db_path.display()))?;
        let catalog = match &config.catalog_path {
            Some(path) => load_catalog(path)?,
            None => Vec::new(),
        };
        Ok(Self::new(storage, config.store.clone(), catalog))
    }

    pub fn storage(&self) -> &Storage {
        self.store.storage()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.storage().user_profile()
    }
}

/// Reads the browsable profile catalog, a JSON array of profiles.
pub fn load_catalog(path: &Path) -> anyhow::Result<Vec<UserProfile>> {
    let bytes = fs::read(path).with_context(|| format!("reading catalog {}", path.display()))?;
    let catalog: Vec<UserProfile> =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing catalog {}", path.display()))?;
    info!(profiles = catalog.len(), path = %path.display(), "catalog loaded");
    Ok(catalog)
}

pub fn app(state: State) -> Router {
    routes::router(state)
}
