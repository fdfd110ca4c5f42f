//! # Navigator Engine
//!
//! Process-wide navigation session for mobile hosts.
//!
//! The host UI drives one [`NavigationStateMachine`] through thin FFI calls;
//! the session state, route and history stay on the Rust side. The
//! navigator lock is never held across a network call: a route request is
//! issued under the lock, performed unlocked, and applied under the lock
//! again, where superseded results are discarded by generation.

use std::sync::{Mutex, MutexGuard};

use log::info;
use once_cell::sync::Lazy;

use crate::NavigationStateMachine;
#[cfg(feature = "http")]
use crate::{DirectionsClient, NavError, Result, RouteOutcome, RouteRequest};

// ============================================================================
// Global Singleton
// ============================================================================

/// Global navigator instance, `None` until [`init_navigator`] runs.
pub static NAVIGATOR: Lazy<Mutex<Option<NavigationStateMachine>>> = Lazy::new(|| Mutex::new(None));

fn lock_navigator() -> MutexGuard<'static, Option<NavigationStateMachine>> {
    // A panic mid-transition leaves plain data behind; keep serving it
    NAVIGATOR.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Install `machine` as the global navigator, replacing any previous session.
pub fn init_navigator(machine: NavigationStateMachine) {
    let mut navigator = lock_navigator();
    if navigator.is_some() {
        info!("[Navigator] Replacing existing session");
    }
    *navigator = Some(machine);
}

/// Run `f` against the global navigator. Returns `None` if not initialized.
pub fn with_navigator<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut NavigationStateMachine) -> R,
{
    let mut navigator = lock_navigator();
    navigator.as_mut().map(f)
}

/// Remove and return the global navigator.
pub fn take_navigator() -> Option<NavigationStateMachine> {
    lock_navigator().take()
}

/// Perform `request` and apply the result to the global navigator.
///
/// The lock is released for the duration of the call, so positions and user
/// intents are not blocked on the network. A result that was superseded in
/// the meantime comes back as [`RouteOutcome::Stale`].
#[cfg(feature = "http")]
pub fn fetch_route(client: &DirectionsClient, request: RouteRequest) -> Result<RouteOutcome> {
    let result = client.compute_route_blocking(&request.directions);
    with_navigator(|nav| nav.apply_route(request.generation, result)).unwrap_or_else(|| {
        Err(NavError::Internal {
            message: "navigator is not initialized".to_string(),
        })
    })
}

// ============================================================================
// FFI Exports
// ============================================================================

#[cfg(feature = "ffi")]
pub mod engine_ffi {
    use super::*;
    use std::sync::Arc;

    use log::{error, warn};

    use crate::{
        format_distance, maneuver_rotation, ArrivalEvent, DirectionsConfig, GeoPoint, Maneuver,
        NavigationConfig, NavigationState, Place, RecentRouteEntry, RecentRoutesStore, Route,
        SqliteStore, TrackingState, TravelProfile,
    };

    static CLIENT: Lazy<Mutex<Option<Arc<DirectionsClient>>>> = Lazy::new(|| Mutex::new(None));

    fn client() -> Option<Arc<DirectionsClient>> {
        CLIENT
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Log a failed call and flatten it for the host.
    fn report<T>(context: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("[Navigator] {} failed: {}", context, e);
                None
            }
        }
    }

    /// Route step as seen by the host, with the icon rotation resolved.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiRouteStep {
        pub instruction: String,
        pub maneuver: Maneuver,
        /// Short maneuver label for the banner, e.g. "Turn left"
        pub maneuver_text: String,
        pub rotation_degrees: f64,
        pub distance_meters: f64,
        pub start: GeoPoint,
        pub end: GeoPoint,
    }

    /// Route as seen by the host.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiRoute {
        pub path: Vec<GeoPoint>,
        pub steps: Vec<FfiRouteStep>,
        pub distance_meters: f64,
        pub duration_seconds: f64,
        /// Formatted total distance, e.g. "12.4 km"
        pub distance_label: String,
    }

    impl From<&Route> for FfiRoute {
        fn from(route: &Route) -> Self {
            Self {
                path: route.path.clone(),
                steps: route
                    .steps
                    .iter()
                    .map(|s| FfiRouteStep {
                        instruction: s.instruction.clone(),
                        maneuver: s.maneuver,
                        maneuver_text: s.maneuver.description().to_string(),
                        rotation_degrees: s.maneuver.rotation_degrees(),
                        distance_meters: s.distance_meters,
                        start: s.start,
                        end: s.end,
                    })
                    .collect(),
                distance_meters: route.distance_meters,
                duration_seconds: route.duration_seconds,
                distance_label: format_distance(route.distance_meters),
            }
        }
    }

    /// History entry with the timestamp as RFC 3339 text.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiRecentRoute {
        pub id: String,
        pub origin_label: String,
        pub destination_label: String,
        pub origin: GeoPoint,
        pub destination: GeoPoint,
        pub distance_meters: f64,
        pub duration_minutes: u32,
        pub timestamp: String,
        pub thumbnail_url: Option<String>,
    }

    impl From<RecentRouteEntry> for FfiRecentRoute {
        fn from(entry: RecentRouteEntry) -> Self {
            Self {
                id: entry.id,
                origin_label: entry.origin_label,
                destination_label: entry.destination_label,
                origin: entry.origin,
                destination: entry.destination,
                distance_meters: entry.distance_meters,
                duration_minutes: entry.duration_minutes,
                timestamp: entry.timestamp.to_rfc3339(),
                thumbnail_url: entry.thumbnail_url,
            }
        }
    }

    /// Initialize the navigator (call once at app startup).
    ///
    /// Opens the history database at `db_path` and configures the directions
    /// client with `api_key`. Returns false if either fails.
    #[uniffi::export]
    pub fn nav_init(db_path: String, api_key: String) -> bool {
        crate::init_logging();

        let config = NavigationConfig::default();
        let setup = || -> Result<(NavigationStateMachine, DirectionsClient)> {
            let storage = SqliteStore::new(&db_path)?;
            let recent = RecentRoutesStore::with_capacity(
                Box::new(storage),
                config.recent_routes_capacity,
            );
            let machine = NavigationStateMachine::new(config.clone())?
                .with_recent_routes(Arc::new(recent));
            let client = DirectionsClient::new(DirectionsConfig::with_api_key(api_key))?;
            Ok((machine, client))
        };

        match setup() {
            Ok((machine, client)) => {
                init_navigator(machine);
                *CLIENT.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
                    Some(Arc::new(client));
                info!("[Navigator] Initialized with history at {}", db_path);
                true
            }
            Err(e) => {
                error!("[Navigator] Initialization failed: {}", e);
                false
            }
        }
    }

    /// Current state; `Idle` before initialization.
    #[uniffi::export]
    pub fn nav_get_state() -> NavigationState {
        with_navigator(|nav| nav.state()).unwrap_or_default()
    }

    #[uniffi::export]
    pub fn nav_set_origin(label: String, point: GeoPoint) -> bool {
        with_navigator(|nav| report("set origin", nav.set_origin(Place::new(label, point))))
            .flatten()
            .is_some()
    }

    #[uniffi::export]
    pub fn nav_set_destination(label: String, point: GeoPoint) -> bool {
        with_navigator(|nav| report("set destination", nav.set_destination(Place::new(label, point))))
            .flatten()
            .is_some()
    }

    fn run_request(request: Option<RouteRequest>) -> bool {
        let (Some(request), Some(client)) = (request, client()) else {
            return false;
        };
        matches!(
            report("route request", fetch_route(&client, request)),
            Some(RouteOutcome::Ready)
        )
    }

    /// Request a route for the current endpoints and profile.
    ///
    /// Blocks on the network. Returns true if a route is ready for preview.
    #[uniffi::export]
    pub fn nav_compute_route() -> bool {
        let request = with_navigator(|nav| report("request route", nav.request_route())).flatten();
        run_request(request)
    }

    /// Change the travel profile. In preview the route is recomputed.
    #[uniffi::export]
    pub fn nav_select_profile(profile: TravelProfile) -> bool {
        let Some(request) =
            with_navigator(|nav| report("select profile", nav.select_profile(profile))).flatten()
        else {
            return false;
        };
        match request {
            Some(request) => run_request(Some(request)),
            None => true,
        }
    }

    #[uniffi::export]
    pub fn nav_get_profile() -> TravelProfile {
        with_navigator(|nav| nav.profile()).unwrap_or_default()
    }

    #[uniffi::export]
    pub fn nav_get_route() -> Option<FfiRoute> {
        with_navigator(|nav| nav.route().map(FfiRoute::from)).flatten()
    }

    /// Start navigating the previewed route.
    #[uniffi::export]
    pub fn nav_start() -> bool {
        let client = client();
        with_navigator(|nav| {
            let thumbnail = client
                .as_ref()
                .zip(nav.route())
                .and_then(|(c, route)| c.thumbnail_url(route));
            report("start", nav.start_with_thumbnail(thumbnail))
        })
        .flatten()
        .is_some()
    }

    #[uniffi::export]
    pub fn nav_cancel() -> bool {
        with_navigator(|nav| report("cancel", nav.cancel()))
            .flatten()
            .is_some()
    }

    /// Feed one live position. Returns the arrival event when it completes
    /// the route.
    #[uniffi::export]
    pub fn nav_update_position(point: GeoPoint) -> Option<ArrivalEvent> {
        with_navigator(|nav| report("position update", nav.update_position(point)))
            .flatten()
            .flatten()
    }

    #[uniffi::export]
    pub fn nav_get_tracking_state() -> Option<TrackingState> {
        with_navigator(|nav| nav.tracking_state().cloned()).flatten()
    }

    /// Acknowledge completion and return to search.
    #[uniffi::export]
    pub fn nav_acknowledge() -> bool {
        with_navigator(|nav| report("acknowledge", nav.acknowledge()))
            .flatten()
            .is_some()
    }

    /// Recent routes, most recent first.
    #[uniffi::export]
    pub fn nav_get_recent_routes() -> Vec<FfiRecentRoute> {
        with_navigator(|nav| nav.recent_routes().map(|store| store.list()))
            .flatten()
            .unwrap_or_default()
            .into_iter()
            .map(FfiRecentRoute::from)
            .collect()
    }

    /// Restore a history entry's endpoints and recompute its route.
    #[uniffi::export]
    pub fn nav_select_recent(id: String) -> bool {
        let request = with_navigator(|nav| {
            let entry = nav
                .recent_routes()
                .and_then(|store| store.list().into_iter().find(|e| e.id == id))?;
            report("select recent", nav.select_recent(&entry))
        })
        .flatten();
        run_request(request)
    }

    #[uniffi::export]
    pub fn nav_remove_recent_route(id: String) -> bool {
        with_navigator(|nav| {
            nav.recent_routes()
                .and_then(|store| report("remove recent", store.remove_by_id(&id)))
        })
        .flatten()
        .unwrap_or(false)
    }

    #[uniffi::export]
    pub fn nav_clear_recent_routes() -> bool {
        with_navigator(|nav| {
            nav.recent_routes()
                .and_then(|store| report("clear recent", store.clear()))
        })
        .flatten()
        .is_some()
    }

    /// Banner distance text, e.g. "450 m" or "1.2 km".
    #[uniffi::export]
    pub fn nav_format_distance(meters: f64) -> String {
        format_distance(meters)
    }

    /// Icon rotation for a service maneuver tag.
    #[uniffi::export]
    pub fn nav_maneuver_rotation(tag: String) -> f64 {
        maneuver_rotation(&tag)
    }
}
