// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geometry kernel: pure functions over GPS coordinate sequences.
//!
//! Everything here degrades on malformed input (returns the input unchanged,
//! `false`, or empty) instead of failing, so the capture resolver can drive
//! its control flow with length checks alone.

use geo::{Buffer, Intersects, LineString, MultiPolygon, Point, Polygon, Simplify};

use crate::models::territory::{Coordinate, PrivacyZone, Viewport};

/// Mean earth radius used by the haversine distance (km).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate meters per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Two ring endpoints closer than this (degrees) count as coincident,
/// i.e. the ring is closed.
const RING_CLOSE_EPSILON: f64 = 1e-5;

/// Great-circle distance between two coordinates in kilometers
/// (haversine formula).
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Total length of a route in kilometers. Routes with fewer than two
/// points have length 0.
pub fn route_distance_km(coords: &[Coordinate]) -> f64 {
    coords
        .windows(2)
        .map(|pair| distance_km(&pair[0], &pair[1]))
        .sum()
}

/// Convert a distance in meters to approximate degrees of arc.
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Reduce the point count of a route while staying within `tolerance_deg`
/// of the original shape (Ramer-Douglas-Peucker). One-shot transform;
/// inputs of 0 or 1 points pass through unchanged.
pub fn simplify_route(coords: &[Coordinate], tolerance_deg: f64) -> Vec<Coordinate> {
    if coords.len() < 2 {
        return coords.to_vec();
    }
    from_line_string(to_line_string(coords).simplify(tolerance_deg))
}

/// Expand a polyline into a closed constant-width "capsule" polygon of
/// `width_km` half-width around the line.
///
/// Inputs of fewer than two points are returned unchanged (degenerate
/// territory). When buffering yields disjoint polygon parts only the first
/// ring is kept; callers must be aware disjoint buffers collapse to one
/// ring.
pub fn buffer_route(coords: &[Coordinate], width_km: f64) -> Vec<Coordinate> {
    if coords.len() < 2 {
        return coords.to_vec();
    }

    let buffered: MultiPolygon<f64> = to_line_string(coords).buffer(meters_to_degrees(width_km * 1000.0));

    match buffered.0.into_iter().next() {
        Some(polygon) => from_line_string(polygon.exterior().clone()),
        None => Vec::new(),
    }
}

/// Whether a route's buffered corridor shares any area or boundary with a
/// territory shape.
///
/// The route is buffered by `buffer_m`. If `territory` is already a closed
/// ring it is tested as a polygon directly; otherwise it is buffered by the
/// same tolerance first.
pub fn route_intersects(route: &[Coordinate], territory: &[Coordinate], buffer_m: f64) -> bool {
    if route.len() < 2 || territory.is_empty() {
        return false;
    }

    let route_area: MultiPolygon<f64> =
        to_line_string(route).buffer(meters_to_degrees(buffer_m));

    if is_closed_ring(territory) {
        let polygon = Polygon::new(to_line_string(territory), vec![]);
        return route_area.intersects(&polygon);
    }

    if territory.len() >= 2 {
        let other: MultiPolygon<f64> =
            to_line_string(territory).buffer(meters_to_degrees(buffer_m));
        return route_area.intersects(&other);
    }

    // Single stray point
    route_area.intersects(&Point::new(territory[0].longitude, territory[0].latitude))
}

/// Drop the portions of a route inside the privacy zone at both ends.
///
/// Returns the inclusive sub-sequence between the first and last coordinates
/// farther than the zone radius from its center. A route that never leaves
/// the zone trims to empty. A disabled zone (or a route of fewer than two
/// points) passes through unchanged.
pub fn trim_to_privacy_zone(coords: &[Coordinate], zone: Option<&PrivacyZone>) -> Vec<Coordinate> {
    let zone = match zone {
        Some(z) if z.enabled => z,
        _ => return coords.to_vec(),
    };
    if coords.len() < 2 {
        return coords.to_vec();
    }

    let radius_km = zone.radius_m / 1000.0;
    let outside = |c: &Coordinate| distance_km(c, &zone.center) > radius_km;

    let start = match coords.iter().position(outside) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let end = match coords.iter().rposition(outside) {
        Some(i) => i,
        None => return Vec::new(),
    };
    if start > end {
        return Vec::new();
    }
    coords[start..=end].to_vec()
}

/// Whether any point of the sequence lies within the viewport's lat/lng
/// bounding box. An approximation, not exact screen-space containment.
pub fn any_point_in_viewport(coords: &[Coordinate], viewport: &Viewport) -> bool {
    let half_lat = viewport.latitude_delta / 2.0;
    let half_lng = viewport.longitude_delta / 2.0;
    coords.iter().any(|c| {
        (c.latitude - viewport.center.latitude).abs() <= half_lat
            && (c.longitude - viewport.center.longitude).abs() <= half_lng
    })
}

/// The element at floor(n/2): a cheap label-placement anchor, not a true
/// centroid.
pub fn route_midpoint(coords: &[Coordinate]) -> Option<Coordinate> {
    if coords.is_empty() {
        return None;
    }
    Some(coords[coords.len() / 2])
}

/// Whether the sequence describes a closed polygon ring: more than three
/// points with coincident endpoints.
fn is_closed_ring(coords: &[Coordinate]) -> bool {
    if coords.len() <= 3 {
        return false;
    }
    let first = &coords[0];
    let last = &coords[coords.len() - 1];
    (first.latitude - last.latitude).abs() < RING_CLOSE_EPSILON
        && (first.longitude - last.longitude).abs() < RING_CLOSE_EPSILON
}

fn to_line_string(coords: &[Coordinate]) -> LineString<f64> {
    LineString::from(
        coords
            .iter()
            .map(|c| (c.longitude, c.latitude))
            .collect::<Vec<_>>(),
    )
}

fn from_line_string(line: LineString<f64>) -> Vec<Coordinate> {
    line.into_inner()
        .into_iter()
        .map(|c| Coordinate::new(c.y, c.x))
        .collect()
}
