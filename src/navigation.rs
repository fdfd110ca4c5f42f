//! # Navigation Flow
//!
//! User-facing state machine for one navigation session:
//!
//! ```text
//! Idle --route ready--> Preview --start--> Navigating --arrival--> Completed
//!  ^                     |   ^               |                       |
//!  +-------cancel--------+   +----cancel-----+                       |
//!  +---------------------------acknowledge---------------------------+
//! ```
//!
//! Route requests are issued as [`RouteRequest`] tickets carrying a
//! generation. The caller performs the network call and hands the result
//! back to [`NavigationStateMachine::apply_route`]; results for superseded
//! generations are discarded. All transitions are synchronous and expected
//! on one thread of control per session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::directions::{DirectionsRequest, RequestGate};
use crate::recent_routes::{RecentRouteEntry, RecentRoutesStore};
use crate::tracker::{ArrivalEvent, NavigationTracker, PositionSink, TrackingState};
use crate::{GeoPoint, NavError, NavigationConfig, OptionExt, Result, Route, TravelProfile};

/// Where the session is in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum NavigationState {
    /// Choosing origin and destination
    #[default]
    Idle,
    /// Route computed (or being recomputed), profile selectable
    Preview,
    /// Live tracking
    Navigating,
    /// Arrived; waiting for acknowledgement
    Completed,
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavigationState::Idle => "Idle",
            NavigationState::Preview => "Preview",
            NavigationState::Navigating => "Navigating",
            NavigationState::Completed => "Completed",
        };
        write!(f, "{}", name)
    }
}

/// A labelled endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Place {
    pub label: String,
    pub point: GeoPoint,
}

impl Place {
    pub fn new(label: impl Into<String>, point: GeoPoint) -> Self {
        Self {
            label: label.into(),
            point,
        }
    }
}

/// A route request to perform, tagged with its generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub generation: u64,
    pub directions: DirectionsRequest,
}

/// What [`NavigationStateMachine::apply_route`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Route stored; the session is in Preview
    Ready,
    /// The service found no route; the session is back in Idle
    NoRoute,
    /// A newer request superseded this one; the result was discarded
    Stale,
}

/// Summary handed to the post-activity flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub origin_label: String,
    pub destination_label: String,
    pub profile: TravelProfile,
    pub distance_meters: f64,
    pub planned_duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CompletedSession {
    /// Wall-clock time between start and arrival, in seconds.
    pub fn elapsed_seconds(&self) -> i64 {
        (self.completed_at - self.started_at).num_seconds()
    }
}

/// Orchestrates search, preview, navigation and completion.
pub struct NavigationStateMachine {
    state: NavigationState,
    config: NavigationConfig,
    origin: Option<Place>,
    destination: Option<Place>,
    profile: TravelProfile,
    route: Option<Arc<Route>>,
    tracker: Option<NavigationTracker>,
    gate: RequestGate,
    recent_routes: Option<Arc<RecentRoutesStore>>,
    started_at: Option<DateTime<Utc>>,
    completed: Option<CompletedSession>,
}

impl NavigationStateMachine {
    pub fn new(config: NavigationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: NavigationState::Idle,
            config,
            origin: None,
            destination: None,
            profile: TravelProfile::default(),
            route: None,
            tracker: None,
            gate: RequestGate::new(),
            recent_routes: None,
            started_at: None,
            completed: None,
        })
    }

    /// Record confirmed routes in `store` when navigation starts.
    pub fn with_recent_routes(mut self, store: Arc<RecentRoutesStore>) -> Self {
        self.recent_routes = Some(store);
        self
    }

    // ========================================================================
    // Observables
    // ========================================================================

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn profile(&self) -> TravelProfile {
        self.profile
    }

    pub fn origin(&self) -> Option<&Place> {
        self.origin.as_ref()
    }

    pub fn destination(&self) -> Option<&Place> {
        self.destination.as_ref()
    }

    /// Current route, if one is computed and not invalidated.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_deref()
    }

    pub fn tracker(&self) -> Option<&NavigationTracker> {
        self.tracker.as_ref()
    }

    pub fn tracking_state(&self) -> Option<&TrackingState> {
        self.tracker.as_ref().map(|t| t.state())
    }

    pub fn completed_session(&self) -> Option<&CompletedSession> {
        self.completed.as_ref()
    }

    pub fn recent_routes(&self) -> Option<&Arc<RecentRoutesStore>> {
        self.recent_routes.as_ref()
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Set the origin. A changed origin supersedes any request in flight.
    pub fn set_origin(&mut self, place: Place) -> Result<()> {
        self.require(NavigationState::Idle, "set origin")?;
        place.point.validate("origin")?;
        if self.origin.as_ref() != Some(&place) {
            self.route_inputs_changed();
            self.origin = Some(place);
        }
        Ok(())
    }

    /// Set the destination. A changed destination supersedes any request in
    /// flight.
    pub fn set_destination(&mut self, place: Place) -> Result<()> {
        self.require(NavigationState::Idle, "set destination")?;
        place.point.validate("destination")?;
        if self.destination.as_ref() != Some(&place) {
            self.route_inputs_changed();
            self.destination = Some(place);
        }
        Ok(())
    }

    /// Drop the route and any request in flight; both describe old inputs.
    fn route_inputs_changed(&mut self) {
        debug!("[Navigation] Route inputs changed");
        self.gate.invalidate();
        self.route = None;
    }

    /// Issue a route request for the current endpoints and profile.
    ///
    /// Supersedes any request still in flight. In Preview the current route
    /// is invalidated until the new result arrives.
    pub fn request_route(&mut self) -> Result<RouteRequest> {
        match self.state {
            NavigationState::Idle | NavigationState::Preview => {}
            other => return Err(NavError::invalid_transition("request a route", other)),
        }

        let origin = self.origin.as_ref().ok_or_invalid_input("origin is not set")?;
        let destination = self
            .destination
            .as_ref()
            .ok_or_invalid_input("destination is not set")?;

        let directions = DirectionsRequest::new(origin.point, destination.point, self.profile);
        let generation = self.gate.issue();
        self.route = None;

        debug!(
            "[Navigation] Issued route request #{} ({} -> {}, {})",
            generation, origin.label, destination.label, self.profile
        );

        Ok(RouteRequest {
            generation,
            directions,
        })
    }

    /// Apply the result of a route request.
    ///
    /// Results for superseded generations are discarded as `Stale`. A
    /// non-empty route moves the session to Preview, an empty one back to
    /// Idle. Request errors are returned to the caller; if no route remains,
    /// the session falls back to Idle.
    pub fn apply_route(&mut self, generation: u64, result: Result<Route>) -> Result<RouteOutcome> {
        let accepting = matches!(self.state, NavigationState::Idle | NavigationState::Preview);
        if !accepting || !self.gate.is_current(generation) {
            debug!(
                "[Navigation] Discarding stale route result #{} (latest #{}, {})",
                generation,
                self.gate.latest(),
                self.state
            );
            return Ok(RouteOutcome::Stale);
        }
        // Each generation is applied at most once
        self.gate.invalidate();

        let route = match result {
            Ok(route) => route,
            Err(e) => {
                warn!("[Navigation] Route request #{} failed: {}", generation, e);
                self.route = None;
                self.state = NavigationState::Idle;
                return Err(e);
            }
        };

        if route.is_empty() {
            info!("[Navigation] No route found for request #{}", generation);
            self.route = None;
            self.state = NavigationState::Idle;
            return Ok(RouteOutcome::NoRoute);
        }

        info!(
            "[Navigation] Route #{} ready: {:.0}m, {:.0}s, {} steps",
            generation,
            route.distance_meters,
            route.duration_seconds,
            route.steps.len()
        );
        self.route = Some(Arc::new(route));
        self.state = NavigationState::Preview;
        Ok(RouteOutcome::Ready)
    }

    /// Restore endpoints from history and request the route again.
    pub fn select_recent(&mut self, entry: &RecentRouteEntry) -> Result<RouteRequest> {
        self.require(NavigationState::Idle, "select a recent route")?;
        entry.origin.validate("origin")?;
        entry.destination.validate("destination")?;

        self.origin = Some(Place::new(entry.origin_label.clone(), entry.origin));
        self.destination = Some(Place::new(entry.destination_label.clone(), entry.destination));
        self.request_route()
    }

    // ========================================================================
    // Preview
    // ========================================================================

    /// Change the travel profile.
    ///
    /// In Preview a different profile invalidates the route and returns the
    /// replacement request. The profile is frozen once navigation starts.
    pub fn select_profile(&mut self, profile: TravelProfile) -> Result<Option<RouteRequest>> {
        match self.state {
            NavigationState::Idle => {
                if profile != self.profile {
                    self.route_inputs_changed();
                    self.profile = profile;
                }
                Ok(None)
            }
            NavigationState::Preview => {
                if profile == self.profile {
                    return Ok(None);
                }
                info!("[Navigation] Profile {} -> {}", self.profile, profile);
                self.profile = profile;
                self.request_route().map(Some)
            }
            other => Err(NavError::invalid_transition("change profile", other)),
        }
    }

    /// Confirm the previewed route and begin live tracking.
    pub fn start(&mut self) -> Result<()> {
        self.start_with_thumbnail(None)
    }

    /// Like [`start`](Self::start), storing `thumbnail_url` with the history entry.
    pub fn start_with_thumbnail(&mut self, thumbnail_url: Option<String>) -> Result<()> {
        self.require(NavigationState::Preview, "start navigation")?;
        let route = self
            .route
            .clone()
            .ok_or_invalid_input("no route to navigate; wait for the route result")?;

        let tracker = NavigationTracker::new(Arc::clone(&route), self.config.tracker.clone())?;

        self.record_recent(&route, thumbnail_url);

        self.tracker = Some(tracker);
        self.started_at = Some(Utc::now());
        self.completed = None;
        self.state = NavigationState::Navigating;

        info!("[Navigation] Started navigating ({})", self.profile);
        Ok(())
    }

    /// Back out one level: Preview -> Idle, Navigating -> Preview.
    ///
    /// Leaving Navigating discards the tracker and its arrival latch.
    pub fn cancel(&mut self) -> Result<()> {
        match self.state {
            NavigationState::Preview => {
                self.gate.invalidate();
                self.route = None;
                self.state = NavigationState::Idle;
                info!("[Navigation] Preview cancelled");
                Ok(())
            }
            NavigationState::Navigating => {
                self.tracker = None;
                self.started_at = None;
                self.state = NavigationState::Preview;
                info!("[Navigation] Navigation cancelled, back to preview");
                Ok(())
            }
            other => Err(NavError::invalid_transition("cancel", other)),
        }
    }

    // ========================================================================
    // Navigating
    // ========================================================================

    /// Feed one live position.
    ///
    /// Ignored outside Navigating. Returns the arrival event on the update
    /// that completes the route, which also moves the session to Completed.
    pub fn update_position(&mut self, position: GeoPoint) -> Result<Option<ArrivalEvent>> {
        position.validate("position")?;

        if self.state != NavigationState::Navigating {
            debug!("[Navigation] Ignoring position while {}", self.state);
            return Ok(None);
        }

        let Some(tracker) = self.tracker.as_mut() else {
            return Err(NavError::Internal {
                message: "navigating without a tracker".to_string(),
            });
        };

        let arrival = tracker.on_position(position);
        if let Some(event) = arrival {
            self.complete(event);
        }
        Ok(arrival)
    }

    fn complete(&mut self, event: ArrivalEvent) {
        let completed_at = Utc::now();
        let route = self.route.as_deref();

        self.completed = Some(CompletedSession {
            origin_label: self.origin.as_ref().map(|p| p.label.clone()).unwrap_or_default(),
            destination_label: self
                .destination
                .as_ref()
                .map(|p| p.label.clone())
                .unwrap_or_default(),
            profile: self.profile,
            distance_meters: route.map(|r| r.distance_meters).unwrap_or(0.0),
            planned_duration_seconds: route.map(|r| r.duration_seconds).unwrap_or(0.0),
            started_at: self.started_at.unwrap_or(completed_at),
            completed_at,
        });
        self.state = NavigationState::Completed;

        info!(
            "[Navigation] Completed ({:.0}m from destination)",
            event.remaining_distance
        );
    }

    // ========================================================================
    // Completed
    // ========================================================================

    /// Close the completed session and return to Idle.
    pub fn acknowledge(&mut self) -> Result<CompletedSession> {
        self.require(NavigationState::Completed, "acknowledge")?;
        let session = self
            .completed
            .take()
            .ok_or_internal("completed without a session summary")?;

        self.tracker = None;
        self.route = None;
        self.started_at = None;
        self.state = NavigationState::Idle;
        Ok(session)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn require(&self, expected: NavigationState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(NavError::invalid_transition(action, self.state))
        }
    }

    fn record_recent(&self, route: &Route, thumbnail_url: Option<String>) {
        let (Some(store), Some(origin), Some(destination)) =
            (&self.recent_routes, &self.origin, &self.destination)
        else {
            return;
        };

        let entry = RecentRouteEntry::from_route(
            &origin.label,
            origin.point,
            &destination.label,
            destination.point,
            route,
        )
        .with_thumbnail(thumbnail_url);

        // History is a convenience; a failed write must not block navigation
        if let Err(e) = store.add(entry) {
            warn!("[Navigation] Failed to record recent route: {}", e);
        }
    }
}
