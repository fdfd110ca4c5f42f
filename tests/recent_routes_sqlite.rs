//! Recent routes persisted through SQLite across store instances.

use ride_nav::{
    GeoPoint, KeyValueStore, RecentRouteEntry, RecentRoutesStore, Route, SqliteStore,
    RECENT_ROUTES_KEY,
};
use tempfile::TempDir;

fn route(distance_meters: f64, duration_seconds: f64) -> Route {
    Route::new(
        vec![GeoPoint::new(41.1579, -8.6291), GeoPoint::new(41.1600, -8.6250)],
        vec![],
        distance_meters,
        duration_seconds,
    )
}

fn entry(origin: &str, destination: &str, distance_meters: f64) -> RecentRouteEntry {
    RecentRouteEntry::from_route(
        origin,
        GeoPoint::new(41.1579, -8.6291),
        destination,
        GeoPoint::new(41.1600, -8.6250),
        &route(distance_meters, 600.0),
    )
}

fn open(dir: &TempDir) -> RecentRoutesStore {
    let path = dir.path().join("nav.db");
    let storage = SqliteStore::new(path.to_str().unwrap()).unwrap();
    RecentRoutesStore::open(Box::new(storage))
}

#[test]
fn test_history_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        store.add(entry("Home", "Work", 5000.0)).unwrap();
        store
            .add(entry("Ribeira", "Bolhão", 420.0).with_thumbnail(Some("https://t/1".into())))
            .unwrap();
    }

    let store = open(&dir);
    let list = store.list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].origin_label, "Ribeira");
    assert_eq!(list[0].duration_minutes, 10);
    assert_eq!(list[0].thumbnail_url.as_deref(), Some("https://t/1"));
    assert_eq!(list[1].origin_label, "Home");
}

#[test]
fn test_duplicate_labels_move_to_front_after_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        store.add(entry("A", "B", 1000.0)).unwrap();
        store.add(entry("C", "D", 2000.0)).unwrap();
        store.add(entry("A", "B", 1500.0)).unwrap();
    }

    let list = open(&dir).list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].origin_label, "A");
    assert_eq!(list[0].distance_meters, 1500.0);
    assert_eq!(list[1].origin_label, "C");
}

#[test]
fn test_capacity_persists_newest_ten() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        for i in 0..12 {
            store
                .add(entry(&format!("origin {}", i), "Destination", 100.0 * i as f64))
                .unwrap();
        }
    }

    let list = open(&dir).list();
    assert_eq!(list.len(), 10);
    assert_eq!(list[0].origin_label, "origin 11");
    assert_eq!(list[9].origin_label, "origin 2");
}

#[test]
fn test_remove_and_clear_persist() {
    let dir = TempDir::new().unwrap();

    let id = {
        let store = open(&dir);
        store.add(entry("A", "B", 1000.0)).unwrap();
        store.add(entry("C", "D", 2000.0)).unwrap();
        let id = store.find_by_labels("A", "B").unwrap().id;
        assert!(store.remove_by_id(&id).unwrap());
        id
    };

    let store = open(&dir);
    assert_eq!(store.len(), 1);
    assert!(store.find_by_labels("A", "B").is_none());
    assert!(!store.remove_by_id(&id).unwrap());

    store.clear().unwrap();
    assert!(open(&dir).is_empty());
}

#[test]
fn test_corrupt_blob_loads_empty_and_recovers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nav.db");

    {
        let storage = SqliteStore::new(path.to_str().unwrap()).unwrap();
        storage.set(RECENT_ROUTES_KEY, "{ not a list").unwrap();
    }

    let store = open(&dir);
    assert!(store.is_empty());

    // The next write replaces the corrupt blob
    store.add(entry("A", "B", 1000.0)).unwrap();
    assert_eq!(open(&dir).len(), 1);
}

#[test]
fn test_stored_record_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nav.db");

    {
        let store = open(&dir);
        store.add(entry("Home", "Work", 5000.0)).unwrap();
    }

    let storage = SqliteStore::new(path.to_str().unwrap()).unwrap();
    let raw = storage.get(RECENT_ROUTES_KEY).unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    let record = &json[0];
    assert_eq!(record["originLabel"], "Home");
    assert_eq!(record["destinationLabel"], "Work");
    assert_eq!(record["origin"]["lat"], 41.1579);
    assert_eq!(record["destination"]["lon"], -8.625);
    assert_eq!(record["durationMinutes"], 10);
    assert!(record["timestamp"].as_str().unwrap().contains('T'));
    assert!(record["id"].as_str().unwrap().starts_with("route_"));
}
