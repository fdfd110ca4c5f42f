//! Geographic utilities.
//!
//! Pure, deterministic distance and path functions on a spherical earth.
//! Callers validate coordinates first (see [`GeoPoint::is_valid`]); these
//! functions do not re-check ranges.

use crate::{GeoPoint, NavError, Result};

/// Sphere radius used for all great-circle distances, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine formula).
///
/// Symmetric, and zero exactly when the points are equal.
///
/// # Example
/// ```
/// use ride_nav::GeoPoint;
/// use ride_nav::geo_utils::haversine_distance;
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
/// let d = haversine_distance(&london, &paris);
/// assert!((d - 343_500.0).abs() < 1_000.0);
/// ```
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Index of the path vertex closest to `point`.
///
/// Ties resolve to the lowest index. An empty path is a precondition
/// violation and is reported as `InvalidInput` rather than a sentinel index.
pub fn nearest_index(point: &GeoPoint, path: &[GeoPoint]) -> Result<usize> {
    if path.is_empty() {
        return Err(NavError::invalid_input(
            "nearest_index requires a non-empty path",
        ));
    }
    Ok(nearest_index_unchecked(point, path))
}

fn nearest_index_unchecked(point: &GeoPoint, path: &[GeoPoint]) -> usize {
    let mut best_index = 0;
    let mut best_distance = f64::INFINITY;

    for (i, vertex) in path.iter().enumerate() {
        let d = haversine_distance(point, vertex);
        // Strict comparison keeps the first occurrence on ties
        if d < best_distance {
            best_distance = d;
            best_index = i;
        }
    }

    best_index
}

/// Distance left to travel along `path` from the vertex nearest `point`.
///
/// Sums the segment lengths from the nearest vertex to the final vertex.
/// Returns 0 for paths with fewer than two points.
pub fn remaining_distance(point: &GeoPoint, path: &[GeoPoint]) -> f64 {
    if path.len() < 2 {
        return 0.0;
    }

    let start = nearest_index_unchecked(point, path);
    polyline_length(&path[start..])
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(41.1579, -8.6291),
            GeoPoint::new(41.1585, -8.6280),
            GeoPoint::new(41.1590, -8.6270),
            GeoPoint::new(41.1595, -8.6260),
            GeoPoint::new(41.1600, -8.6250),
        ]
    }

    #[test]
    fn test_distance_identity_and_symmetry() {
        let a = GeoPoint::new(41.1579, -8.6291);
        let b = GeoPoint::new(41.1600, -8.6250);

        assert_eq!(haversine_distance(&a, &a), 0.0);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
        assert!(haversine_distance(&a, &b) > 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        // One degree of latitude on a 6,371 km sphere
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let expected = EARTH_RADIUS_METERS * 1f64.to_radians();
        assert!((haversine_distance(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_triangle_inequality() {
        let points = [
            GeoPoint::new(41.1579, -8.6291),
            GeoPoint::new(38.7223, -9.1393),
            GeoPoint::new(40.4168, -3.7038),
            GeoPoint::new(-33.8688, 151.2093),
            GeoPoint::new(64.1466, -21.9426),
        ];
        for a in &points {
            for b in &points {
                for c in &points {
                    let direct = haversine_distance(a, c);
                    let via = haversine_distance(a, b) + haversine_distance(b, c);
                    assert!(direct <= via + 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_nearest_index() {
        let path = sample_path();
        assert_eq!(nearest_index(&path[0], &path).unwrap(), 0);
        assert_eq!(nearest_index(&GeoPoint::new(41.1591, -8.6269), &path).unwrap(), 2);
        assert_eq!(nearest_index(&GeoPoint::new(41.2, -8.6), &path).unwrap(), 4);
    }

    #[test]
    fn test_nearest_index_ties_pick_first() {
        let p = GeoPoint::new(41.0, -8.0);
        let path = vec![GeoPoint::new(41.1, -8.0), p, p, GeoPoint::new(41.2, -8.0)];
        assert_eq!(nearest_index(&p, &path).unwrap(), 1);
    }

    #[test]
    fn test_nearest_index_empty_path() {
        let result = nearest_index(&GeoPoint::new(0.0, 0.0), &[]);
        assert!(matches!(result, Err(NavError::InvalidInput { .. })));
    }

    #[test]
    fn test_remaining_distance_short_paths() {
        let p = GeoPoint::new(41.0, -8.0);
        assert_eq!(remaining_distance(&p, &[]), 0.0);
        assert_eq!(remaining_distance(&p, &[p]), 0.0);
    }

    #[test]
    fn test_remaining_distance_from_start_is_full_length() {
        let path = sample_path();
        let total = polyline_length(&path);
        assert!((remaining_distance(&path[0], &path) - total).abs() < 1e-9);
        assert_eq!(remaining_distance(&path[4], &path), 0.0);
    }

    #[test]
    fn test_remaining_distance_non_increasing_along_path() {
        let path = sample_path();
        let mut previous = f64::INFINITY;
        for p in &path {
            let remaining = remaining_distance(p, &path);
            assert!(remaining <= previous);
            previous = remaining;
        }
    }
}
