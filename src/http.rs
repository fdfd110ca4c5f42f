//! HTTP client for the directions service.
//!
//! One request per call, no automatic retry: the service is metered, so
//! retrying is left to the caller. Staleness between overlapping calls is
//! handled by the caller's [`RequestGate`](crate::RequestGate) generation.

use std::time::{Duration, Instant};

use geo::{Coord, LineString};
use log::{debug, info, warn};
use reqwest::{Client, Url};

use crate::directions::{parse_directions_response, DirectionsConfig, DirectionsRequest, FIELD_MASK};
use crate::{NavError, Result, Route};

/// Static map endpoint used for history thumbnails.
const STATIC_MAP_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/staticmap";
const THUMBNAIL_SIZE: &str = "320x160";
/// Overview paths beyond this many points are thinned for the thumbnail URL.
const THUMBNAIL_MAX_POINTS: usize = 200;

/// Client for the `computeRoutes` endpoint.
pub struct DirectionsClient {
    client: Client,
    config: DirectionsConfig,
}

impl DirectionsClient {
    /// Create a new client. Fails on an invalid configuration.
    pub fn new(config: DirectionsConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| NavError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DirectionsConfig {
        &self.config
    }

    /// Request a route. Non-success statuses surface as `RouteRequestFailed`
    /// with the status and raw body; an empty result is `Ok(Route::empty())`.
    pub async fn compute_route(&self, request: &DirectionsRequest) -> Result<Route> {
        request.validate()?;

        let body = request.to_body(&self.config);
        let start = Instant::now();

        debug!(
            "[DirectionsClient] Requesting {} route ({:?}, modifiers: {:?})",
            request.profile, request.mode, body.route_modifiers
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("X-Goog-Api-Key", &self.config.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("[DirectionsClient] Request error: {}", e);
                NavError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(
                "[DirectionsClient] HTTP {} after {:?}: {}",
                status,
                start.elapsed(),
                text
            );
            return Err(NavError::RouteRequestFailed {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
                body: text,
            });
        }

        let route = parse_directions_response(&text).map_err(|e| match e {
            NavError::RouteRequestFailed { message, body, .. } => NavError::RouteRequestFailed {
                status: Some(status.as_u16()),
                message,
                body,
            },
            other => other,
        })?;

        info!(
            "[DirectionsClient] Route ready in {:?}: {} points, {} steps, {:.0}m",
            start.elapsed(),
            route.path.len(),
            route.steps.len(),
            route.distance_meters
        );

        Ok(route)
    }

    /// Synchronous wrapper - runs the request on a private tokio runtime.
    ///
    /// Must not be called from inside an async context.
    pub fn compute_route_blocking(&self, request: &DirectionsRequest) -> Result<Route> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NavError::Internal {
                message: format!("Runtime error: {}", e),
            })?;

        rt.block_on(self.compute_route(request))
    }

    /// Static map URL drawing the route, stored as the history thumbnail.
    ///
    /// Returns `None` for routes without a path.
    pub fn thumbnail_url(&self, route: &Route) -> Option<String> {
        if route.path.len() < 2 {
            return None;
        }

        let stride = route.path.len().div_ceil(THUMBNAIL_MAX_POINTS);
        let mut line: LineString<f64> = route
            .path
            .iter()
            .step_by(stride)
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect();
        // Always end on the destination
        if let Some(last) = route.path.last() {
            if (route.path.len() - 1) % stride != 0 {
                line.0.push(Coord {
                    x: last.longitude,
                    y: last.latitude,
                });
            }
        }

        let encoded = polyline::encode_coordinates(line, crate::directions::POLYLINE_PRECISION).ok()?;

        Url::parse_with_params(
            STATIC_MAP_ENDPOINT,
            &[
                ("size", THUMBNAIL_SIZE.to_string()),
                ("path", format!("weight:4|enc:{}", encoded)),
                ("key", self.config.api_key.clone()),
            ],
        )
        .ok()
        .map(|url| url.to_string())
    }
}
