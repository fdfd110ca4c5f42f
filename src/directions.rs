//! Directions service wire format.
//!
//! Builds `computeRoutes` request bodies and decodes responses into a
//! [`Route`]. Transport lives in the `http` module; everything here is pure
//! so it can be exercised without a network.
//!
//! A success response without `routes`, or whose first route has no usable
//! polyline, decodes to [`Route::empty`] ("no route found"), not an error.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils::polyline_length;
use crate::{
    GeoPoint, Maneuver, NavError, Result, Route, RouteModifiers, RouteStep, TravelMode,
    TravelProfile,
};

/// Google Routes API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://routes.googleapis.com/directions/v2:computeRoutes";

/// Response fields requested from the service. Keeps the payload to the
/// totals, the overview polyline and per-step metadata.
pub const FIELD_MASK: &str = "routes.distanceMeters,routes.duration,routes.polyline.encodedPolyline,routes.legs.steps.navigationInstruction,routes.legs.steps.distanceMeters,routes.legs.steps.startLocation,routes.legs.steps.endLocation";

/// Precision factor of the encoded polyline (1e5).
pub const POLYLINE_PRECISION: u32 = 5;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the directions client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionsConfig {
    /// API key sent in the `X-Goog-Api-Key` header
    pub api_key: String,
    /// Default: the Google Routes `computeRoutes` endpoint
    pub endpoint: String,
    /// Request timeout. Default: 30 seconds
    pub timeout_secs: u64,
    /// Service travel mode for motorized profiles. Default: "DRIVE"
    pub motorized_mode: String,
    /// Service travel mode for non-motorized profiles. Default: "BICYCLE"
    pub non_motorized_mode: String,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
            motorized_mode: "DRIVE".to_string(),
            non_motorized_mode: "BICYCLE".to_string(),
        }
    }
}

impl DirectionsConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(NavError::config("directions api_key is empty"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(NavError::config("directions endpoint is empty"));
        }
        if self.timeout_secs == 0 {
            return Err(NavError::config("timeout_secs must be positive"));
        }
        Ok(())
    }

    /// Service-side name of a travel mode.
    pub fn mode_name(&self, mode: TravelMode) -> &str {
        match mode {
            TravelMode::Motorized => &self.motorized_mode,
            TravelMode::NonMotorized => &self.non_motorized_mode,
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// What to route: endpoints, profile and the mode the profile resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionsRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub profile: TravelProfile,
    pub mode: TravelMode,
}

impl DirectionsRequest {
    /// Request using the profile's default transport mode.
    pub fn new(origin: GeoPoint, destination: GeoPoint, profile: TravelProfile) -> Self {
        Self::with_mode(origin, destination, profile, profile.travel_mode())
    }

    /// Request with an explicit transport mode.
    pub fn with_mode(
        origin: GeoPoint,
        destination: GeoPoint,
        profile: TravelProfile,
        mode: TravelMode,
    ) -> Self {
        Self {
            origin,
            destination,
            profile,
            mode,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.origin.validate("origin")?;
        self.destination.validate("destination")
    }

    pub fn modifiers(&self) -> Option<RouteModifiers> {
        self.profile.route_modifiers(self.mode)
    }

    /// Build the JSON body for the service.
    pub fn to_body(&self, config: &DirectionsConfig) -> ComputeRoutesBody {
        ComputeRoutesBody {
            origin: ApiWaypoint::at(self.origin),
            destination: ApiWaypoint::at(self.destination),
            travel_mode: config.mode_name(self.mode).to_string(),
            polyline_quality: "OVERVIEW".to_string(),
            polyline_encoding: "ENCODED_POLYLINE".to_string(),
            route_modifiers: self.modifiers(),
        }
    }
}

/// Request body sent to `computeRoutes`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRoutesBody {
    pub origin: ApiWaypoint,
    pub destination: ApiWaypoint,
    pub travel_mode: String,
    pub polyline_quality: String,
    pub polyline_encoding: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_modifiers: Option<RouteModifiers>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiWaypoint {
    pub location: ApiLocation,
}

impl ApiWaypoint {
    fn at(point: GeoPoint) -> Self {
        Self {
            location: ApiLocation {
                lat_lng: Some(ApiLatLng {
                    latitude: point.latitude,
                    longitude: point.longitude,
                }),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLocation {
    #[serde(default)]
    pub lat_lng: Option<ApiLatLng>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApiLatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Deserialize)]
struct ComputeRoutesResponse {
    #[serde(default)]
    routes: Vec<ApiRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRoute {
    distance_meters: Option<f64>,
    duration: Option<ApiDuration>,
    polyline: Option<ApiPolyline>,
    #[serde(default)]
    legs: Vec<ApiLeg>,
}

/// Durations arrive as `"523s"`; bare numbers are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiDuration {
    Seconds(f64),
    Text(String),
}

impl ApiDuration {
    fn seconds(&self) -> f64 {
        match self {
            ApiDuration::Seconds(s) => *s,
            ApiDuration::Text(text) => text.trim().trim_end_matches('s').parse().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPolyline {
    encoded_polyline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    #[serde(default)]
    steps: Vec<ApiStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStep {
    navigation_instruction: Option<ApiInstruction>,
    distance_meters: Option<f64>,
    start_location: Option<ApiLocation>,
    end_location: Option<ApiLocation>,
}

#[derive(Debug, Deserialize)]
struct ApiInstruction {
    maneuver: Option<String>,
    instructions: Option<String>,
}

fn location_point(location: Option<ApiLocation>) -> GeoPoint {
    location
        .and_then(|l| l.lat_lng)
        .map(|ll| GeoPoint::new(ll.latitude, ll.longitude))
        .unwrap_or_default()
}

impl From<ApiStep> for RouteStep {
    fn from(step: ApiStep) -> Self {
        let (maneuver, instruction) = match step.navigation_instruction {
            Some(ni) => (ni.maneuver, ni.instructions),
            None => (None, None),
        };

        RouteStep {
            instruction: instruction
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| "Continue".to_string()),
            maneuver: maneuver
                .as_deref()
                .map(Maneuver::from_tag)
                .unwrap_or(Maneuver::Straight),
            distance_meters: step.distance_meters.unwrap_or(0.0),
            start: location_point(step.start_location),
            end: location_point(step.end_location),
        }
    }
}

/// Decode an encoded polyline into points.
///
/// Returns `None` when the string is malformed or decodes to coordinates
/// outside the valid lat/lon range.
pub fn decode_path(encoded: &str) -> Option<Vec<GeoPoint>> {
    let line = match polyline::decode_polyline(encoded, POLYLINE_PRECISION) {
        Ok(line) => line,
        Err(e) => {
            warn!("[Directions] Failed to decode polyline: {:?}", e);
            return None;
        }
    };

    let points: Vec<GeoPoint> = line.0.iter().map(|c| GeoPoint::new(c.y, c.x)).collect();

    if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
        warn!(
            "[Directions] Decoded polyline has out-of-range point ({}, {})",
            bad.latitude, bad.longitude
        );
        return None;
    }

    Some(points)
}

/// Parse a success response body into a route.
///
/// Only `routes[0]` is used. Steps from every leg are flattened in traversal
/// order. A body that is not valid JSON is a `RouteRequestFailed`.
pub fn parse_directions_response(body: &str) -> Result<Route> {
    let response: ComputeRoutesResponse =
        serde_json::from_str(body).map_err(|e| NavError::RouteRequestFailed {
            status: None,
            message: format!("Parse error: {}", e),
            body: body.to_string(),
        })?;

    let Some(api_route) = response.routes.into_iter().next() else {
        debug!("[Directions] Response has no routes");
        return Ok(Route::empty());
    };

    let encoded = api_route
        .polyline
        .and_then(|p| p.encoded_polyline)
        .filter(|s| !s.is_empty());
    let Some(encoded) = encoded else {
        debug!("[Directions] First route has no polyline");
        return Ok(Route::empty());
    };

    let Some(path) = decode_path(&encoded) else {
        return Ok(Route::empty());
    };

    let steps: Vec<RouteStep> = api_route
        .legs
        .into_iter()
        .flat_map(|leg| leg.steps)
        .map(RouteStep::from)
        .collect();

    let distance_meters = api_route
        .distance_meters
        .unwrap_or_else(|| polyline_length(&path));
    let duration_seconds = api_route.duration.map(|d| d.seconds()).unwrap_or(0.0);

    debug!(
        "[Directions] Decoded route: {} points, {} steps, {:.0}m, {:.0}s",
        path.len(),
        steps.len(),
        distance_meters,
        duration_seconds
    );

    Ok(Route::new(path, steps, distance_meters, duration_seconds))
}

// ============================================================================
// Request generations
// ============================================================================

/// Monotonic counter that keeps only the latest route request relevant.
///
/// Every issued request gets a new generation; a response is applied only if
/// its generation is still the latest. Issuing a new request supersedes all
/// earlier ones.
#[derive(Debug, Default)]
pub struct RequestGate {
    latest: AtomicU64,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new generation, superseding any request in flight.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether a response for `generation` may still be applied.
    pub fn is_current(&self, generation: u64) -> bool {
        generation != 0 && self.latest.load(Ordering::SeqCst) == generation
    }

    /// Supersede whatever is in flight without issuing a new request.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
