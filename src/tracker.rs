//! # Navigation Tracker
//!
//! Matches live positions against a route.
//!
//! Each update:
//! 1. picks the step whose start or end point is nearest the position
//!    (steps are coarse waypoints, so this is independent of the dense path),
//! 2. measures the distance to that step's end (the next maneuver),
//! 3. measures the remaining distance along the dense path,
//! 4. latches arrival once the remaining distance drops below the threshold.
//!
//! Arrival is reported exactly once per tracker; the latch never resets.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance, remaining_distance};
use crate::{GeoPoint, NavError, Result, Route, RouteStep};

/// Configuration for arrival detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TrackerConfig {
    /// Remaining distance below which the rider has arrived.
    /// Default: 50.0 meters
    pub arrival_threshold_meters: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            arrival_threshold_meters: 50.0,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.arrival_threshold_meters.is_finite() && self.arrival_threshold_meters > 0.0) {
            return Err(NavError::config(format!(
                "arrival_threshold_meters must be positive, got {}",
                self.arrival_threshold_meters
            )));
        }
        Ok(())
    }
}

/// Progress of one navigation session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
    /// Index of the step shown in the maneuver banner
    pub current_step_index: u32,
    /// Distance from the position to the end of that step, in meters
    pub distance_to_maneuver: f64,
    /// Distance left along the whole route, in meters
    pub remaining_distance: f64,
    /// Estimated time left, in seconds
    pub remaining_duration_seconds: f64,
    /// Latched once the destination is reached
    pub arrived: bool,
    /// Last position processed
    pub position: Option<GeoPoint>,
    /// Number of positions processed
    pub update_count: u64,
}

/// Emitted once, on the update that first crosses the arrival threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct ArrivalEvent {
    pub position: GeoPoint,
    pub remaining_distance: f64,
}

/// Receiver of the live position feed.
///
/// Returns an [`ArrivalEvent`] on the one update that completes the route.
pub trait PositionSink {
    fn on_position(&mut self, position: GeoPoint) -> Option<ArrivalEvent>;
}

/// Tracks one session's progress along a route.
pub struct NavigationTracker {
    route: Arc<Route>,
    config: TrackerConfig,
    state: TrackingState,
}

impl NavigationTracker {
    /// Start tracking `route`. The route must have a path or steps.
    pub fn new(route: Arc<Route>, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        if route.is_empty() {
            return Err(NavError::invalid_input("cannot track an empty route"));
        }

        let state = TrackingState {
            remaining_distance: route.distance_meters,
            remaining_duration_seconds: route.duration_seconds,
            ..TrackingState::default()
        };

        Ok(Self {
            route,
            config,
            state,
        })
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn has_arrived(&self) -> bool {
        self.state.arrived
    }

    /// Step currently shown in the banner.
    pub fn current_step(&self) -> Option<&RouteStep> {
        self.route
            .steps
            .get(self.state.current_step_index as usize)
    }

    /// Fraction of the route covered, from 0.0 to 1.0.
    pub fn progress_fraction(&self) -> f64 {
        if self.state.arrived {
            return 1.0;
        }
        let total = self.total_distance();
        if total <= 0.0 {
            return 0.0;
        }
        (1.0 - self.state.remaining_distance / total).clamp(0.0, 1.0)
    }

    /// Process one position. Returns the arrival event the first time the
    /// route is completed, `None` otherwise.
    pub fn update(&mut self, position: GeoPoint) -> Option<ArrivalEvent> {
        let route = Arc::clone(&self.route);

        let (step_index, distance_to_maneuver) = nearest_step(&position, &route.steps);
        let remaining = if route.path.is_empty() {
            self.distance_to_final_step(&position)
        } else {
            remaining_distance(&position, &route.path)
        };

        self.state.current_step_index = step_index as u32;
        self.state.distance_to_maneuver = distance_to_maneuver;
        self.state.remaining_distance = remaining;
        self.state.remaining_duration_seconds = self.estimate_remaining_duration(remaining);
        self.state.position = Some(position);
        self.state.update_count += 1;

        debug!(
            "[Tracker] Update #{}: step {}, {:.0}m to maneuver, {:.0}m remaining",
            self.state.update_count, step_index, distance_to_maneuver, remaining
        );

        if self.state.arrived || remaining >= self.config.arrival_threshold_meters {
            return None;
        }

        self.state.arrived = true;
        info!(
            "[Tracker] Arrived after {} updates ({:.0}m from destination)",
            self.state.update_count, remaining
        );

        Some(ArrivalEvent {
            position,
            remaining_distance: remaining,
        })
    }

    fn total_distance(&self) -> f64 {
        if self.route.distance_meters > 0.0 {
            self.route.distance_meters
        } else {
            self.route.path_length()
        }
    }

    fn distance_to_final_step(&self, position: &GeoPoint) -> f64 {
        self.route
            .destination()
            .map(|end| haversine_distance(position, &end))
            .unwrap_or(0.0)
    }

    fn estimate_remaining_duration(&self, remaining: f64) -> f64 {
        let total = self.total_distance();
        if total <= 0.0 {
            return 0.0;
        }
        self.route.duration_seconds * (remaining / total).clamp(0.0, 1.0)
    }
}

impl PositionSink for NavigationTracker {
    fn on_position(&mut self, position: GeoPoint) -> Option<ArrivalEvent> {
        self.update(position)
    }
}

/// Step whose start or end is nearest `position`, with the distance to its end.
///
/// Unknown (zero-valued) endpoints are ignored; ties keep the lowest index.
/// With no usable endpoints the first step is chosen at distance 0.
fn nearest_step(position: &GeoPoint, steps: &[RouteStep]) -> (usize, f64) {
    let mut best_index = 0;
    let mut best_distance = f64::INFINITY;

    for (i, step) in steps.iter().enumerate() {
        let d = [step.start, step.end]
            .iter()
            .filter(|p| !p.is_unknown())
            .map(|p| haversine_distance(position, p))
            .fold(f64::INFINITY, f64::min);
        if d < best_distance {
            best_distance = d;
            best_index = i;
        }
    }

    let to_end = steps
        .get(best_index)
        .filter(|s| !s.end.is_unknown())
        .map(|s| haversine_distance(position, &s.end))
        .unwrap_or(0.0);

    (best_index, to_end)
}
