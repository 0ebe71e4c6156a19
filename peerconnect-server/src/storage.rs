//! Durable key-value adapter.
//!
//! One sled tree stands in for the browser's local storage. Every logical
//! collection lives under a fixed key as a JSON blob wrapped in a version
//! envelope. The public accessors are best-effort: failures are logged and
//! turned into `None`/`false`/defaults. The `try_*` variants keep the reason.

use std::path::Path;

use chrono::Utc;
use peerconnect_common::non_api_structs::LocalData;
use peerconnect_common::{
    Connection, ConnectionRequest, ProfilePatch, SearchFilters, UiPreferences, UiPreferencesPatch,
    UserProfile,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sled::{Db, Tree};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const SCHEMA_VERSION: u32 = 1;
pub const MAX_RECENT_SEARCHES: usize = 10;

const PROBE_KEY: &str = "__storage_test__";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StorageKey {
    UserProfile,
    Connections,
    SentRequests,
    ReceivedRequests,
    OnboardingComplete,
    SearchFilters,
    UiPreferences,
    RecentSearches,
}

impl StorageKey {
    pub const ALL: [StorageKey; 8] = [
        StorageKey::UserProfile,
        StorageKey::Connections,
        StorageKey::SentRequests,
        StorageKey::ReceivedRequests,
        StorageKey::OnboardingComplete,
        StorageKey::SearchFilters,
        StorageKey::UiPreferences,
        StorageKey::RecentSearches,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::UserProfile => "peerconnect_user_profile",
            StorageKey::Connections => "peerconnect_connections",
            StorageKey::SentRequests => "peerconnect_connection_requests",
            StorageKey::ReceivedRequests => "peerconnect_received_connection_requests",
            StorageKey::OnboardingComplete => "peerconnect_onboarding_complete",
            StorageKey::SearchFilters => "peerconnect_search_filters",
            StorageKey::UiPreferences => "peerconnect_ui_preferences",
            StorageKey::RecentSearches => "peerconnect_recent_searches",
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported schema version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

enum Decoded<T> {
    Current(T),
    Legacy(T),
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<Decoded<T>, StorageError> {
    let raw: Value = serde_json::from_slice(bytes)?;
    let versioned = matches!(
        &raw,
        Value::Object(map) if map.len() == 2 && map.contains_key("version") && map.contains_key("data")
    );
    if !versioned {
        return Ok(Decoded::Legacy(serde_json::from_value(raw)?));
    }
    let envelope: Envelope<Value> = serde_json::from_value(raw)?;
    if envelope.version != SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: envelope.version,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(Decoded::Current(serde_json::from_value(envelope.data)?))
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(&Envelope {
        version: SCHEMA_VERSION,
        data: value,
    })?)
}

#[derive(Clone)]
pub struct Storage {
    tree: Tree,
    #[cfg(test)]
    read_only: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl Storage {
    pub fn new(db: &Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree("local_storage")?,
            #[cfg(test)]
            read_only: Default::default(),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::new(&db)
    }

    /// A store that lives only as long as the process.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::new(&db)
    }

    pub fn try_get<T>(&self, key: StorageKey) -> Result<Option<T>, StorageError>
    where
        T: DeserializeOwned + Serialize,
    {
        let Some(bytes) = self.tree.get(key.as_str())? else {
            return Ok(None);
        };
        match decode(&bytes)? {
            Decoded::Current(value) => Ok(Some(value)),
            Decoded::Legacy(value) => {
                info!(key = key.as_str(), version = SCHEMA_VERSION, "migrating unversioned blob");
                self.try_set(key, &value)?;
                Ok(Some(value))
            }
        }
    }

    pub fn try_set<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> Result<(), StorageError> {
        let bytes = encode(value)?;
        self.check_writable()?;
        self.tree.insert(key.as_str(), bytes)?;
        Ok(())
    }

    /// Writes two keys in one atomic batch: either both land or neither does.
    pub fn try_set_both<A, B>(&self, first: (StorageKey, &A), second: (StorageKey, &B)) -> Result<(), StorageError>
    where
        A: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let mut batch = sled::Batch::default();
        batch.insert(first.0.as_str(), encode(first.1)?);
        batch.insert(second.0.as_str(), encode(second.1)?);
        self.check_writable()?;
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    pub fn try_remove(&self, key: StorageKey) -> Result<(), StorageError> {
        self.check_writable()?;
        self.tree.remove(key.as_str())?;
        Ok(())
    }

    #[cfg(not(test))]
    fn check_writable(&self) -> Result<(), StorageError> {
        Ok(())
    }

    #[cfg(test)]
    fn check_writable(&self) -> Result<(), StorageError> {
        use std::sync::atomic::Ordering;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(sled::Error::Unsupported("storage is read-only".into()).into());
        }
        Ok(())
    }

    /// Makes every later write on this storage (and its clones) fail.
    #[cfg(test)]
    pub(crate) fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn get<T: DeserializeOwned + Serialize>(&self, key: StorageKey) -> Option<T> {
        self.try_get(key).unwrap_or_else(|err| {
            error!(key = key.as_str(), error = %err, "error reading from storage");
            None
        })
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(err) => {
                error!(key = key.as_str(), error = %err, "error writing to storage");
                false
            }
        }
    }

    pub fn remove(&self, key: StorageKey) -> bool {
        match self.try_remove(key) {
            Ok(()) => true,
            Err(err) => {
                error!(key = key.as_str(), error = %err, "error removing from storage");
                false
            }
        }
    }

    /// Removes every known key. Keeps going past individual failures.
    pub fn clear_all(&self) -> bool {
        let mut ok = true;
        for key in StorageKey::ALL {
            ok &= self.remove(key);
        }
        info!(ok, "cleared local storage");
        ok
    }

    pub async fn flush(&self) -> Result<usize, StorageError> {
        Ok(self.tree.flush_async().await?)
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        self.get(StorageKey::UserProfile)
    }

    pub fn set_user_profile(&self, profile: &UserProfile) -> bool {
        self.set(StorageKey::UserProfile, profile)
    }

    /// Applies `patch` to the stored profile and stamps `updated_at`.
    /// `None` when there is no profile yet or the write failed.
    pub fn update_user_profile(&self, patch: ProfilePatch) -> Option<UserProfile> {
        let mut profile = self.user_profile()?;
        patch.apply(&mut profile);
        profile.updated_at = Utc::now();
        self.set_user_profile(&profile).then_some(profile)
    }

    pub fn remove_user_profile(&self) -> bool {
        self.remove(StorageKey::UserProfile)
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.get(StorageKey::Connections).unwrap_or_default()
    }

    pub fn set_connections(&self, connections: &[Connection]) -> bool {
        self.set(StorageKey::Connections, connections)
    }

    pub fn sent_requests(&self) -> Vec<ConnectionRequest> {
        self.get(StorageKey::SentRequests).unwrap_or_default()
    }

    pub fn set_sent_requests(&self, requests: &[ConnectionRequest]) -> bool {
        self.set(StorageKey::SentRequests, requests)
    }

    pub fn received_requests(&self) -> Vec<ConnectionRequest> {
        self.get(StorageKey::ReceivedRequests).unwrap_or_default()
    }

    pub fn set_received_requests(&self, requests: &[ConnectionRequest]) -> bool {
        self.set(StorageKey::ReceivedRequests, requests)
    }

    pub fn onboarding_complete(&self) -> bool {
        self.get(StorageKey::OnboardingComplete).unwrap_or(false)
    }

    pub fn set_onboarding_complete(&self, completed: bool) -> bool {
        self.set(StorageKey::OnboardingComplete, &completed)
    }

    pub fn search_filters(&self) -> SearchFilters {
        self.get(StorageKey::SearchFilters).unwrap_or_default()
    }

    pub fn set_search_filters(&self, filters: &SearchFilters) -> bool {
        self.set(StorageKey::SearchFilters, filters)
    }

    pub fn ui_preferences(&self) -> UiPreferences {
        self.get(StorageKey::UiPreferences).unwrap_or_default()
    }

    pub fn set_ui_preferences(&self, preferences: &UiPreferences) -> bool {
        self.set(StorageKey::UiPreferences, preferences)
    }

    pub fn update_ui_preferences(&self, patch: UiPreferencesPatch) -> Option<UiPreferences> {
        let mut preferences = self.ui_preferences();
        if let Some(view_mode) = patch.view_mode {
            preferences.view_mode = view_mode;
        }
        if let Some(theme) = patch.theme {
            preferences.theme = theme;
        }
        self.set_ui_preferences(&preferences).then_some(preferences)
    }

    pub fn recent_searches(&self) -> Vec<String> {
        self.get(StorageKey::RecentSearches).unwrap_or_default()
    }

    /// Moves `query` to the front of the recent list, keeping at most
    /// [`MAX_RECENT_SEARCHES`]. Blank queries are ignored.
    pub fn add_recent_search(&self, query: &str) -> bool {
        if query.trim().is_empty() {
            return false;
        }
        let mut searches = self.recent_searches();
        searches.retain(|search| search != query);
        searches.insert(0, query.to_string());
        searches.truncate(MAX_RECENT_SEARCHES);
        self.set(StorageKey::RecentSearches, &searches)
    }

    pub fn clear_recent_searches(&self) -> bool {
        self.remove(StorageKey::RecentSearches)
    }

    pub fn export_data(&self) -> LocalData {
        LocalData {
            user_profile: self.user_profile(),
            connections: Some(self.connections()),
            sent_requests: Some(self.sent_requests()),
            received_requests: Some(self.received_requests()),
            has_completed_onboarding: Some(self.onboarding_complete()),
            search_filters: Some(self.search_filters()),
            ui_preferences: Some(self.ui_preferences()),
            recent_searches: Some(self.recent_searches()),
        }
    }

    /// Writes every field present in `data`, leaving the rest untouched.
    pub fn import_data(&self, data: &LocalData) -> bool {
        let mut ok = true;
        if let Some(profile) = &data.user_profile {
            ok &= self.set_user_profile(profile);
        }
        if let Some(connections) = &data.connections {
            ok &= self.set_connections(connections);
        }
        if let Some(requests) = &data.sent_requests {
            ok &= self.set_sent_requests(requests);
        }
        if let Some(requests) = &data.received_requests {
            ok &= self.set_received_requests(requests);
        }
        if let Some(completed) = data.has_completed_onboarding {
            ok &= self.set_onboarding_complete(completed);
        }
        if let Some(filters) = &data.search_filters {
            ok &= self.set_search_filters(filters);
        }
        if let Some(preferences) = &data.ui_preferences {
            ok &= self.set_ui_preferences(preferences);
        }
        if let Some(searches) = &data.recent_searches {
            ok &= self.set(StorageKey::RecentSearches, searches);
        }
        debug!(ok, "imported local data");
        ok
    }

    /// Total bytes held under the known keys.
    pub fn storage_size(&self) -> usize {
        StorageKey::ALL
            .iter()
            .filter_map(|key| match self.tree.get(key.as_str()) {
                Ok(value) => value.map(|bytes| bytes.len()),
                Err(err) => {
                    error!(key = key.as_str(), error = %err, "error calculating storage size");
                    None
                }
            })
            .sum()
    }

    pub fn is_available(&self) -> bool {
        let probe = self
            .tree
            .insert(PROBE_KEY, "test")
            .and_then(|_| self.tree.remove(PROBE_KEY));
        if let Err(err) = &probe {
            warn!(error = %err, "storage unavailable");
        }
        probe.is_ok()
    }

    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: StorageKey, bytes: &[u8]) {
        self.tree.insert(key.as_str(), bytes).unwrap();
    }

    #[cfg(test)]
    pub(crate) fn raw(&self, key: StorageKey) -> Option<Vec<u8>> {
        self.tree.get(key.as_str()).unwrap().map(|bytes| bytes.to_vec())
    }
}
