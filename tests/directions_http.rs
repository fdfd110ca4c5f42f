//! Directions client against a local canned HTTP server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use ride_nav::{
    fetch_route, init_navigator, take_navigator, with_navigator, DirectionsClient,
    DirectionsConfig, DirectionsRequest, GeoPoint, Maneuver, NavError, NavigationConfig,
    NavigationState, NavigationStateMachine, Place, RouteOutcome, TravelProfile,
};

/// Porto riverside to Bolhão, five points.
const PORTO_POLYLINE: &str = "{sezFzjts@cBgEwB{EcBgEcBgE";

fn porto_response() -> String {
    format!(
        r#"{{
            "routes": [{{
                "distanceMeters": 420,
                "duration": "95s",
                "polyline": {{"encodedPolyline": "{}"}},
                "legs": [{{"steps": [
                    {{
                        "distanceMeters": 210,
                        "navigationInstruction": {{"maneuver": "DEPART", "instructions": "Head north-east"}},
                        "startLocation": {{"latLng": {{"latitude": 41.1579, "longitude": -8.6291}}}},
                        "endLocation": {{"latLng": {{"latitude": 41.1590, "longitude": -8.6270}}}}
                    }},
                    {{
                        "distanceMeters": 210,
                        "navigationInstruction": {{"maneuver": "TURN_SLIGHT_LEFT", "instructions": "Keep left"}},
                        "startLocation": {{"latLng": {{"latitude": 41.1590, "longitude": -8.6270}}}},
                        "endLocation": {{"latLng": {{"latitude": 41.1600, "longitude": -8.6250}}}}
                    }}
                ]}}]
            }}]
        }}"#,
        PORTO_POLYLINE
    )
}

/// Captured request: lowercased head plus raw body.
struct Captured {
    head: String,
    body: String,
}

/// Serve exactly one request with `status` and `body`, returning the endpoint
/// URL and a handle yielding what the client sent.
fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut head = String::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            head.push_str(&line.to_ascii_lowercase());
        }

        let content_length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        let mut raw_body = vec![0u8; content_length];
        reader.read_exact(&mut raw_body).unwrap();

        let mut stream = stream;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();

        Captured {
            head,
            body: String::from_utf8(raw_body).unwrap(),
        }
    });

    (
        format!("http://127.0.0.1:{}/directions/v2:computeRoutes", port),
        handle,
    )
}

fn client_for(endpoint: String) -> DirectionsClient {
    DirectionsClient::new(DirectionsConfig {
        endpoint,
        ..DirectionsConfig::with_api_key("test-key")
    })
    .unwrap()
}

fn porto_request(profile: TravelProfile) -> DirectionsRequest {
    DirectionsRequest::new(
        GeoPoint::new(41.1579, -8.6291),
        GeoPoint::new(41.1600, -8.6250),
        profile,
    )
}

#[test]
fn test_full_response_and_request_shape() {
    let (endpoint, server) = serve_once("200 OK", porto_response());
    let client = client_for(endpoint);

    let route = client
        .compute_route_blocking(&porto_request(TravelProfile::Performance))
        .unwrap();

    assert_eq!(route.path.len(), 5);
    assert_eq!(route.steps.len(), 2);
    assert_eq!(route.distance_meters, 420.0);
    assert_eq!(route.duration_seconds, 95.0);
    assert_eq!(route.steps[1].maneuver, Maneuver::SlightLeft);
    assert!((route.path[0].latitude - 41.1579).abs() < 1e-5);

    let captured = server.join().unwrap();
    assert!(captured.head.starts_with("post /directions/v2:computeroutes"));
    assert!(captured.head.contains("x-goog-api-key: test-key"));
    assert!(captured.head.contains("x-goog-fieldmask: routes.distancemeters"));

    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["travelMode"], "DRIVE");
    assert_eq!(body["polylineQuality"], "OVERVIEW");
    assert_eq!(body["routeModifiers"]["avoidTolls"], true);
    assert_eq!(body["routeModifiers"]["avoidHighways"], true);
}

#[test]
fn test_touring_request_has_no_modifiers() {
    let (endpoint, server) = serve_once("200 OK", porto_response());
    let client = client_for(endpoint);

    client
        .compute_route_blocking(&porto_request(TravelProfile::Touring))
        .unwrap();

    let captured = server.join().unwrap();
    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["travelMode"], "BICYCLE");
    assert!(body.get("routeModifiers").is_none());
}

#[test]
fn test_server_error_is_request_failure() {
    let (endpoint, server) = serve_once(
        "500 Internal Server Error",
        r#"{"error": {"message": "backend unavailable"}}"#.to_string(),
    );
    let client = client_for(endpoint);

    let result = client.compute_route_blocking(&porto_request(TravelProfile::Safety));
    server.join().unwrap();

    match result {
        Err(NavError::RouteRequestFailed { status, body, .. }) => {
            assert_eq!(status, Some(500));
            assert!(body.contains("backend unavailable"));
        }
        other => panic!("expected RouteRequestFailed, got {:?}", other),
    }
}

#[test]
fn test_empty_routes_is_no_route() {
    let (endpoint, server) = serve_once("200 OK", r#"{"routes": []}"#.to_string());
    let client = client_for(endpoint);

    let route = client
        .compute_route_blocking(&porto_request(TravelProfile::Performance))
        .unwrap();
    server.join().unwrap();

    assert!(route.is_empty());
    assert_eq!(route.distance_meters, 0.0);
    assert_eq!(route.duration_seconds, 0.0);
}

#[test]
fn test_malformed_success_body_keeps_status() {
    let (endpoint, server) = serve_once("200 OK", "not json".to_string());
    let client = client_for(endpoint);

    let result = client.compute_route_blocking(&porto_request(TravelProfile::Performance));
    server.join().unwrap();

    assert!(matches!(
        result,
        Err(NavError::RouteRequestFailed {
            status: Some(200),
            ..
        })
    ));
}

#[tokio::test]
async fn test_async_compute_route() {
    let (endpoint, server) = serve_once("200 OK", porto_response());
    let client = client_for(endpoint);

    let route = client
        .compute_route(&porto_request(TravelProfile::Touring))
        .await
        .unwrap();
    assert_eq!(route.steps.len(), 2);

    tokio::task::spawn_blocking(move || server.join().unwrap())
        .await
        .unwrap();
}

// The only test in this binary that touches the global navigator
#[test]
fn test_fetch_route_through_global_navigator() {
    let (endpoint, server) = serve_once("200 OK", porto_response());
    let client = client_for(endpoint);

    init_navigator(NavigationStateMachine::new(NavigationConfig::default()).unwrap());
    let request = with_navigator(|nav| {
        nav.set_origin(Place::new("Ribeira", GeoPoint::new(41.1579, -8.6291)))?;
        nav.set_destination(Place::new("Bolhão", GeoPoint::new(41.1600, -8.6250)))?;
        nav.request_route()
    })
    .unwrap()
    .unwrap();

    let outcome = fetch_route(&client, request).unwrap();
    server.join().unwrap();

    assert_eq!(outcome, RouteOutcome::Ready);
    assert_eq!(
        with_navigator(|nav| nav.state()),
        Some(NavigationState::Preview)
    );

    // Each generation is applied once
    let stale = with_navigator(|nav| nav.apply_route(request.generation, Ok(Default::default())))
        .unwrap()
        .unwrap();
    assert_eq!(stale, RouteOutcome::Stale);

    take_navigator();
}
