//! # Recent Routes
//!
//! Bounded, most-recently-used history of confirmed routes.
//!
//! - Entries are identified by their (origin label, destination label) pair:
//!   adding a pair that is already present moves it to the head.
//! - The list never exceeds its capacity; the oldest (tail) entry goes first.
//! - Every mutation rewrites the whole list under one key of a
//!   [`KeyValueStore`]. Unreadable stored content loads as an empty history.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{GeoPoint, NavError, Result, Route};

/// Storage key holding the serialized history.
pub const RECENT_ROUTES_KEY: &str = "recent_routes";

/// Maximum number of remembered routes.
pub const RECENT_ROUTES_CAPACITY: usize = 10;

/// Disambiguates entries created within the same microsecond.
static ENTRY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Storage
// ============================================================================

/// Durable string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local storage, for tests and hosts without a disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| NavError::persistence("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ============================================================================
// Entries
// ============================================================================

/// A remembered route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRouteEntry {
    pub id: String,
    pub origin_label: String,
    pub destination_label: String,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub distance_meters: f64,
    pub duration_minutes: u32,
    /// Creation time, serialized as RFC 3339
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl RecentRouteEntry {
    /// Build an entry for a confirmed route, stamped with the current time.
    pub fn from_route(
        origin_label: &str,
        origin: GeoPoint,
        destination_label: &str,
        destination: GeoPoint,
        route: &Route,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: format!(
                "route_{}_{}",
                timestamp.timestamp_micros(),
                ENTRY_SEQUENCE.fetch_add(1, Ordering::Relaxed)
            ),
            origin_label: origin_label.to_string(),
            destination_label: destination_label.to_string(),
            origin,
            destination,
            distance_meters: route.distance_meters,
            duration_minutes: route.duration_minutes(),
            timestamp,
            thumbnail_url: None,
        }
    }

    pub fn with_thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    /// Same route identity: exact label match on both ends.
    pub fn same_labels(&self, other: &RecentRouteEntry) -> bool {
        self.matches_labels(&other.origin_label, &other.destination_label)
    }

    pub fn matches_labels(&self, origin_label: &str, destination_label: &str) -> bool {
        self.origin_label == origin_label && self.destination_label == destination_label
    }
}

// ============================================================================
// Store
// ============================================================================

/// Persisted most-recently-used route history.
///
/// Mutations hold the entry lock across the storage write, so concurrent
/// callers are sequenced and each write is a complete list.
pub struct RecentRoutesStore {
    storage: Box<dyn KeyValueStore>,
    entries: Mutex<Vec<RecentRouteEntry>>,
    capacity: usize,
}

impl RecentRoutesStore {
    /// Open the store, loading any history already in `storage`.
    pub fn open(storage: Box<dyn KeyValueStore>) -> Self {
        Self::with_capacity(storage, RECENT_ROUTES_CAPACITY)
    }

    pub fn with_capacity(storage: Box<dyn KeyValueStore>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = load_entries(storage.as_ref());
        entries.truncate(capacity);

        info!("[RecentRoutes] Loaded {} entries", entries.len());

        Self {
            storage,
            entries: Mutex::new(entries),
            capacity,
        }
    }

    /// In-memory store (for testing).
    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryStore::new()))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries, most recent first.
    pub fn list(&self) -> Vec<RecentRouteEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert at the head, replacing any entry with the same label pair and
    /// dropping from the tail beyond capacity.
    pub fn add(&self, entry: RecentRouteEntry) -> Result<()> {
        self.mutate(|entries| {
            entries.retain(|e| !e.same_labels(&entry));
            debug!(
                "[RecentRoutes] Adding {} -> {}",
                entry.origin_label, entry.destination_label
            );
            entries.insert(0, entry);
            true
        })
        .map(|_| ())
    }

    /// Remove the entry with `id`. Returns whether anything was removed.
    pub fn remove_by_id(&self, id: &str) -> Result<bool> {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() != before
        })
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.lock_entries()?;
        self.storage.remove(RECENT_ROUTES_KEY)?;
        guard.clear();
        debug!("[RecentRoutes] Cleared");
        Ok(())
    }

    /// Most recent entry for a label pair.
    pub fn find_by_labels(
        &self,
        origin_label: &str,
        destination_label: &str,
    ) -> Option<RecentRouteEntry> {
        self.list()
            .into_iter()
            .find(|e| e.matches_labels(origin_label, destination_label))
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, Vec<RecentRouteEntry>>> {
        self.entries
            .lock()
            .map_err(|_| NavError::persistence("recent routes lock poisoned"))
    }

    /// Apply `f` to a copy of the list and persist it. The in-memory list is
    /// replaced only after the write succeeds. `f` returns whether it changed
    /// anything; unchanged lists are not rewritten.
    fn mutate<F>(&self, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<RecentRouteEntry>) -> bool,
    {
        let mut guard = self.lock_entries()?;

        let mut updated = guard.clone();
        if !f(&mut updated) {
            return Ok(false);
        }
        updated.truncate(self.capacity);

        let json = serde_json::to_string(&updated).map_err(|e| NavError::Internal {
            message: format!("Failed to serialize recent routes: {}", e),
        })?;
        self.storage.set(RECENT_ROUTES_KEY, &json)?;

        *guard = updated;
        Ok(true)
    }
}

/// Read the persisted list. Missing, unreadable or corrupt content is an
/// empty history.
fn load_entries(storage: &dyn KeyValueStore) -> Vec<RecentRouteEntry> {
    let raw = match storage.get(RECENT_ROUTES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("[RecentRoutes] Failed to read history, starting empty: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<RecentRouteEntry>>(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("[RecentRoutes] Stored history is corrupt, starting empty: {}", e);
            Vec::new()
        }
    }
}
