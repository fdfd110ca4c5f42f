//! # Ride Nav
//!
//! Navigation-tracking core for ride navigation.
//!
//! This library provides:
//! - Route requests against an external directions service, decoded into a
//!   dense path plus a coarse list of maneuver steps
//! - Live position matching against the route (current step, distance to the
//!   next maneuver, remaining distance, latched arrival)
//! - The user-facing navigation flow (search, preview, navigating, completed)
//! - A bounded, de-duplicated history of recently used routes
//!
//! ## Features
//!
//! - **`http`** - Enable the HTTP client for the directions service
//! - **`persistence`** - Enable SQLite storage for recent routes
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use ride_nav::{GeoPoint, NavigationTracker, Route, RouteStep, Maneuver, TrackerConfig};
//!
//! let path = vec![
//!     GeoPoint::new(41.1579, -8.6291),
//!     GeoPoint::new(41.1590, -8.6270),
//!     GeoPoint::new(41.1600, -8.6250),
//! ];
//! let steps = vec![RouteStep {
//!     instruction: "Head north-east".to_string(),
//!     maneuver: Maneuver::Depart,
//!     distance_meters: 420.0,
//!     start: path[0],
//!     end: path[2],
//! }];
//! let route = Route::new(path, steps, 420.0, 90.0);
//!
//! let mut tracker = NavigationTracker::new(route.into(), TrackerConfig::default()).unwrap();
//! let arrival = tracker.update(GeoPoint::new(41.1579, -8.6291));
//! assert!(arrival.is_none());
//! assert!(tracker.state().remaining_distance > 300.0);
//! ```

use geo::{BoundingRect, Coord, LineString};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{NavError, OptionExt, Result};

// Geographic utilities (distance, nearest vertex, remaining distance)
pub mod geo_utils;

// Maneuver vocabulary and iconography lookup
pub mod maneuver;
pub use maneuver::{format_distance, maneuver_rotation, Maneuver};

// Route model and travel profiles
pub mod route;
pub use route::{Route, RouteModifiers, RouteStep, TravelMode, TravelProfile};

// Directions wire format and request generations
pub mod directions;
pub use directions::{parse_directions_response, DirectionsConfig, DirectionsRequest, RequestGate};

// HTTP client for the directions service
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::DirectionsClient;

// Recent routes history
pub mod recent_routes;
pub use recent_routes::{
    KeyValueStore, MemoryStore, RecentRouteEntry, RecentRoutesStore, RECENT_ROUTES_CAPACITY,
    RECENT_ROUTES_KEY,
};

// SQLite key-value storage for the history
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;

// Live position tracking
pub mod tracker;
pub use tracker::{ArrivalEvent, NavigationTracker, PositionSink, TrackerConfig, TrackingState};

// User-facing navigation flow
pub mod navigation;
pub use navigation::{
    CompletedSession, NavigationState, NavigationStateMachine, Place, RouteOutcome, RouteRequest,
};

// Process-wide navigator (singleton used by the FFI layer)
pub mod engine;
pub use engine::{init_navigator, take_navigator, with_navigator, NAVIGATOR};
#[cfg(feature = "http")]
pub use engine::fetch_route;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RideNavRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate in degrees.
///
/// Serialized as `{"lat": .., "lon": ..}`; `latitude`/`longitude` keys are
/// accepted when reading.
///
/// # Example
/// ```
/// use ride_nav::GeoPoint;
/// let point = GeoPoint::new(41.1579, -8.6291); // Porto
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    #[serde(rename = "lat", alias = "latitude")]
    pub latitude: f64,
    #[serde(rename = "lon", alias = "longitude")]
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Zero-valued points stand in for coordinates the directions service
    /// did not report. They never mean the literal (0, 0).
    pub fn is_unknown(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// Validate the point, naming it in the error.
    pub fn validate(&self, what: &str) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(NavError::invalid_input(format!(
                "{} ({}, {}) is out of range",
                what, self.latitude, self.longitude
            )))
        }
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for an empty slice.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let line: LineString<f64> = points
            .iter()
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect();
        let rect = line.bounding_rect()?;

        Some(Self {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Configuration for a navigation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Tracker settings (arrival threshold).
    pub tracker: TrackerConfig,

    /// Maximum number of remembered routes.
    /// Default: 10
    pub recent_routes_capacity: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            recent_routes_capacity: RECENT_ROUTES_CAPACITY,
        }
    }
}

impl NavigationConfig {
    /// Check the configuration for values the tracker and store cannot use.
    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        if self.recent_routes_capacity == 0 {
            return Err(NavError::config("recent_routes_capacity must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
