//! Route model.
//!
//! A [`Route`] is built once from a successful directions response and never
//! mutated afterwards. It carries the dense decoded path (for progress) and
//! the coarse step list (for the maneuver banner).

use serde::{Deserialize, Serialize};

use crate::geo_utils::polyline_length;
use crate::{Bounds, GeoPoint, Maneuver};

/// One maneuver-to-maneuver leg of the route.
///
/// Consecutive steps are contiguous: the end of step `i` is approximately
/// the start of step `i + 1`. Unreported endpoints are zero-valued
/// (see [`GeoPoint::is_unknown`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub instruction: String,
    pub maneuver: Maneuver,
    pub distance_meters: f64,
    pub start: GeoPoint,
    pub end: GeoPoint,
}

impl Default for RouteStep {
    fn default() -> Self {
        Self {
            instruction: "Continue".to_string(),
            maneuver: Maneuver::Straight,
            distance_meters: 0.0,
            start: GeoPoint::default(),
            end: GeoPoint::default(),
        }
    }
}

/// A computed route between two points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Decoded polyline, in traversal order
    pub path: Vec<GeoPoint>,
    /// All legs' steps flattened in traversal order
    pub steps: Vec<RouteStep>,
    /// Total distance in meters
    pub distance_meters: f64,
    /// Total duration in seconds
    pub duration_seconds: f64,
}

impl Route {
    pub fn new(
        path: Vec<GeoPoint>,
        steps: Vec<RouteStep>,
        distance_meters: f64,
        duration_seconds: f64,
    ) -> Self {
        Self {
            path,
            steps,
            distance_meters,
            duration_seconds,
        }
    }

    /// The "no route found" result: no path, no steps, zero totals.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the service found nothing usable.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.steps.is_empty()
    }

    /// Final point of the route: the last path vertex, or the last known step end.
    pub fn destination(&self) -> Option<GeoPoint> {
        self.path.last().copied().or_else(|| {
            self.steps
                .iter()
                .rev()
                .map(|s| s.end)
                .find(|p| !p.is_unknown())
        })
    }

    /// Bounding box of the path, for framing the preview.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.path)
    }

    /// Length of the decoded path. May differ slightly from the service's
    /// `distance_meters` because the overview path is simplified.
    pub fn path_length(&self) -> f64 {
        polyline_length(&self.path)
    }

    /// Duration in whole minutes, as shown in history.
    pub fn duration_minutes(&self) -> u32 {
        (self.duration_seconds / 60.0).round().max(0.0) as u32
    }
}

/// Transport mode understood by the directions service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Motorized,
    NonMotorized,
}

/// Route modifiers sent with motorized performance requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteModifiers {
    pub avoid_tolls: bool,
    pub avoid_highways: bool,
}

/// Named preset selecting transport mode and modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum TravelProfile {
    /// Road riding on a motorized vehicle
    #[default]
    Performance,
    /// Eco touring on a non-motorized vehicle
    Touring,
    Safety,
}

impl TravelProfile {
    /// Default transport mode for the profile.
    pub fn travel_mode(&self) -> TravelMode {
        match self {
            TravelProfile::Performance | TravelProfile::Safety => TravelMode::Motorized,
            TravelProfile::Touring => TravelMode::NonMotorized,
        }
    }

    /// Modifiers for the profile on a given mode. Only the motorized
    /// performance combination avoids tolls and highways.
    pub fn route_modifiers(&self, mode: TravelMode) -> Option<RouteModifiers> {
        match (self, mode) {
            (TravelProfile::Performance, TravelMode::Motorized) => Some(RouteModifiers {
                avoid_tolls: true,
                avoid_highways: true,
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TravelProfile::Performance => "performance",
            TravelProfile::Touring => "touring",
            TravelProfile::Safety => "safety",
        };
        write!(f, "{}", name)
    }
}
