// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spatial index client: geohash bucket queries for the map viewport.
//!
//! Territories are indexed by a geohash string field; proximity search is a
//! set of two-sided string range queries whose prefixes cover a circle
//! approximating the viewport. The bucket-range computation follows the
//! classic geofire scheme: pick a bit precision from the query radius,
//! geohash the circle's center and its eight ring points at that precision,
//! and widen each hash to the range its unused low bits span.
//!
//! The client owns the session-scoped caches: known territories (first-seen
//! wins; authoritative updates arrive only through capture commits) and the
//! already-loaded bucket memo. Both live for one login session.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use futures_util::{stream, StreamExt};

use crate::db::FirestoreDb;
use crate::error::{GameError, Result};
use crate::geometry;
use crate::models::capture::CapturePlan;
use crate::models::ledger::Actor;
use crate::models::territory::{Coordinate, Territory, Viewport};

const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const BITS_PER_CHAR: usize = 5;
const MAX_BITS_PRECISION: usize = 22 * BITS_PER_CHAR;

// WGS84 equatorial radius and squared eccentricity
const EARTH_EQ_RADIUS_M: f64 = 6_378_137.0;
const EARTH_E2: f64 = 0.006_694_478_197_99;
const EARTH_MERIDIONAL_CIRCUMFERENCE_M: f64 = 40_007_860.0;
const METERS_PER_DEGREE_LATITUDE: f64 = 110_574.0;
const EPSILON: f64 = 1e-12;

/// How many bucket range queries may run concurrently.
const MAX_CONCURRENT_BUCKET_QUERIES: usize = 8;

/// An inclusive geohash string range covering one index bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeohashRange {
    pub start: String,
    pub end: String,
}

impl GeohashRange {
    fn key(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

/// Approximate query radius for a viewport, derived from its latitude span.
pub fn viewport_radius_m(viewport: &Viewport) -> f64 {
    viewport.latitude_delta / 2.0 * METERS_PER_DEGREE_LATITUDE
}

/// Compute the deduplicated geohash ranges covering a circle.
pub fn query_bounds_for_circle(center: &Coordinate, radius_m: f64) -> Vec<GeohashRange> {
    let query_bits = bounding_box_bits(center, radius_m).max(1);
    let precision = query_bits.div_ceil(BITS_PER_CHAR);

    let mut ranges = Vec::new();
    for point in bounding_box_coordinates(center, radius_m) {
        let hash = match geohash::encode(
            geo::Coord {
                x: point.longitude,
                y: point.latitude,
            },
            precision,
        ) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(lat = point.latitude, lng = point.longitude, error = %e, "Skipping unencodable query point");
                continue;
            }
        };
        let range = range_for_hash(&hash, query_bits);
        if !ranges.contains(&range) {
            ranges.push(range);
        }
    }
    ranges
}

/// Number of geohash bits needed so one cell is at least `radius_m * 2`
/// across everywhere inside the circle's latitude span.
fn bounding_box_bits(center: &Coordinate, radius_m: f64) -> usize {
    let lat_delta_deg = radius_m / METERS_PER_DEGREE_LATITUDE;
    let lat_north = (center.latitude + lat_delta_deg).min(90.0);
    let lat_south = (center.latitude - lat_delta_deg).max(-90.0);

    let bits_lat = latitude_bits_for_resolution(radius_m).floor() as isize * 2;
    let bits_lng_north = longitude_bits_for_resolution(radius_m, lat_north).floor() as isize * 2 - 1;
    let bits_lng_south = longitude_bits_for_resolution(radius_m, lat_south).floor() as isize * 2 - 1;

    bits_lat
        .min(bits_lng_north)
        .min(bits_lng_south)
        .min(MAX_BITS_PRECISION as isize)
        .max(1) as usize
}

fn latitude_bits_for_resolution(resolution_m: f64) -> f64 {
    (EARTH_MERIDIONAL_CIRCUMFERENCE_M / 2.0 / resolution_m)
        .log2()
        .min(MAX_BITS_PRECISION as f64)
}

fn longitude_bits_for_resolution(resolution_m: f64, latitude: f64) -> f64 {
    let degs = meters_to_longitude_degrees(resolution_m, latitude);
    if degs.abs() > 1e-6 {
        (360.0 / degs).log2().max(1.0)
    } else {
        1.0
    }
}

/// Longitude degrees spanned by a distance at a given latitude (WGS84).
fn meters_to_longitude_degrees(distance_m: f64, latitude: f64) -> f64 {
    let radians = latitude.to_radians();
    let num = radians.cos() * EARTH_EQ_RADIUS_M * std::f64::consts::PI / 180.0;
    let denom = 1.0 / (1.0 - EARTH_E2 * radians.sin() * radians.sin()).sqrt();
    let delta_deg = num * denom;
    if delta_deg < EPSILON {
        if distance_m > 0.0 {
            360.0
        } else {
            0.0
        }
    } else {
        (distance_m / delta_deg).min(360.0)
    }
}

/// The circle's center plus the eight compass points on its bounding box.
fn bounding_box_coordinates(center: &Coordinate, radius_m: f64) -> Vec<Coordinate> {
    let lat_degrees = radius_m / METERS_PER_DEGREE_LATITUDE;
    let lat_north = (center.latitude + lat_degrees).min(90.0);
    let lat_south = (center.latitude - lat_degrees).max(-90.0);
    let lng_degs = meters_to_longitude_degrees(radius_m, lat_north)
        .max(meters_to_longitude_degrees(radius_m, lat_south));

    let west = wrap_longitude(center.longitude - lng_degs);
    let east = wrap_longitude(center.longitude + lng_degs);

    vec![
        Coordinate::new(center.latitude, center.longitude),
        Coordinate::new(center.latitude, west),
        Coordinate::new(center.latitude, east),
        Coordinate::new(lat_north, center.longitude),
        Coordinate::new(lat_north, west),
        Coordinate::new(lat_north, east),
        Coordinate::new(lat_south, center.longitude),
        Coordinate::new(lat_south, west),
        Coordinate::new(lat_south, east),
    ]
}

fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        longitude
    } else if longitude < -180.0 {
        longitude + 360.0
    } else {
        longitude - 360.0
    }
}

/// Widen a geohash to the inclusive string range its unused low bits span.
///
/// `~` sorts after every base32 geohash character, so `prefix~` is an upper
/// bound for everything underneath `prefix`.
fn range_for_hash(hash: &str, bits: usize) -> GeohashRange {
    let precision = bits.div_ceil(BITS_PER_CHAR);
    if hash.len() < precision {
        return GeohashRange {
            start: hash.to_string(),
            end: format!("{}~", hash),
        };
    }

    let hash = &hash[..precision];
    let base = &hash[..hash.len() - 1];
    let last_char = hash.as_bytes()[hash.len() - 1];
    let last_value = BASE32.iter().position(|&b| b == last_char).unwrap_or(0);

    let significant_bits = bits - base.len() * BITS_PER_CHAR;
    let unused_bits = BITS_PER_CHAR - significant_bits;
    let start_value = (last_value >> unused_bits) << unused_bits;
    let end_value = start_value + (1 << unused_bits);

    let start = format!("{}{}", base, BASE32[start_value] as char);
    let end = if end_value > 31 {
        format!("{}~", base)
    } else {
        format!("{}{}", base, BASE32[end_value] as char)
    };
    GeohashRange { start, end }
}

/// Session-scoped spatial cache and fetch coordinator.
pub struct SpatialIndexClient {
    /// Known territories by id. First-seen wins on merge.
    territories: DashMap<String, Territory>,
    /// Bucket ranges already fetched this session. Never expires.
    loaded_ranges: DashMap<String, ()>,
    /// Single-flight guard: overlapping viewport loads are dropped.
    in_flight: AtomicBool,
    /// Above this many cached territories, consumers filter to the viewport.
    visible_filter_threshold: usize,
}

impl SpatialIndexClient {
    pub fn new(visible_filter_threshold: usize) -> Self {
        Self {
            territories: DashMap::new(),
            loaded_ranges: DashMap::new(),
            in_flight: AtomicBool::new(false),
            visible_filter_threshold,
        }
    }

    /// Fetch the territory buckets covering `viewport` that have not been
    /// loaded yet, merging results into the cache.
    ///
    /// Returns the number of territories newly added. A call that overlaps
    /// an in-flight load is dropped (returns 0), not queued.
    pub async fn load_for_viewport(&self, db: &FirestoreDb, viewport: &Viewport) -> Result<usize> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Viewport load already in flight, dropping");
            return Ok(0);
        }
        let result = self.load_for_viewport_inner(db, viewport).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn load_for_viewport_inner(
        &self,
        db: &FirestoreDb,
        viewport: &Viewport,
    ) -> Result<usize> {
        let radius_m = viewport_radius_m(viewport);
        let ranges: Vec<GeohashRange> = query_bounds_for_circle(&viewport.center, radius_m)
            .into_iter()
            .filter(|r| !self.loaded_ranges.contains_key(&r.key()))
            .collect();

        if ranges.is_empty() {
            return Ok(0);
        }

        // Mark up front; failed buckets are un-marked below so a later
        // viewport pass retries them.
        for range in &ranges {
            self.loaded_ranges.insert(range.key(), ());
        }

        let results: Vec<(GeohashRange, Result<Vec<Territory>>)> = stream::iter(ranges)
            .map(|range| async move {
                let fetched = db.territories_in_range(&range.start, &range.end).await;
                (range, fetched)
            })
            .buffer_unordered(MAX_CONCURRENT_BUCKET_QUERIES)
            .collect()
            .await;

        let mut added = 0;
        let mut failed = 0;
        let mut last_error = None;
        for (range, fetched) in results {
            match fetched {
                Ok(territories) => added += self.merge(territories),
                Err(e) => {
                    tracing::warn!(start = %range.start, end = %range.end, error = %e, "Bucket query failed, will retry");
                    self.loaded_ranges.remove(&range.key());
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        tracing::debug!(added, failed, total = self.territories.len(), "Viewport load finished");

        // Partial success still commits the successful buckets' data.
        match last_error {
            Some(e) if added == 0 => Err(e),
            _ => Ok(added),
        }
    }

    /// Merge fetched territories into the cache. Existing ids are never
    /// overwritten: authoritative updates only arrive through capture
    /// commits, not re-fetch. Returns how many were new.
    pub(crate) fn merge(&self, fetched: Vec<Territory>) -> usize {
        let mut added = 0;
        for territory in fetched {
            if !self.territories.contains_key(&territory.id) {
                self.territories.insert(territory.id.clone(), territory);
                added += 1;
            }
        }
        added
    }

    /// Snapshot of every territory not owned by `user_id`, for capture
    /// resolution at run end.
    pub fn rivals_snapshot(&self, user_id: &str) -> Vec<Territory> {
        self.territories
            .iter()
            .filter(|entry| entry.owner_id != user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Territories to draw for a viewport. Below the filter threshold all
    /// cached territories are considered visible; above it they are
    /// filtered by a cheap bounding-box test.
    pub fn visible_territories(&self, viewport: &Viewport) -> Vec<Territory> {
        if self.territories.len() <= self.visible_filter_threshold {
            return self.territories.iter().map(|e| e.value().clone()).collect();
        }
        self.territories
            .iter()
            .filter(|entry| geometry::any_point_in_viewport(&entry.coords, viewport))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Patch the cache after a successful capture commit: insert the new
    /// territory and apply the ownership transfers. Never called before the
    /// commit succeeds, so the map never shows a false-positive capture.
    pub fn apply_capture(&self, actor: &Actor, plan: &CapturePlan, capture_bonus: u32) {
        let claimed_at = chrono::Utc::now().to_rfc3339();
        self.territories.insert(
            plan.territory_id.clone(),
            Territory {
                id: plan.territory_id.clone(),
                owner_id: actor.id.clone(),
                owner_name: actor.name.clone(),
                creator_id: actor.id.clone(),
                coords: plan.coords.clone(),
                score: plan.base_score,
                claimed_at: claimed_at.clone(),
                geohash: plan.geohash.clone(),
                shield_until: None,
            },
        );
        for rival in &plan.captured {
            if let Some(mut cached) = self.territories.get_mut(&rival.territory.id) {
                cached.owner_id = actor.id.clone();
                cached.owner_name = actor.name.clone();
                cached.score += capture_bonus;
                cached.claimed_at = claimed_at.clone();
            }
        }
    }

    /// Number of known territories.
    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }

    /// Drop all session state (logout / session end).
    pub fn clear(&self) {
        self.territories.clear();
        self.loaded_ranges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    fn territory(id: &str, owner: &str, lat: f64, lng: f64) -> Territory {
        Territory {
            id: id.to_string(),
            owner_id: owner.to_string(),
            owner_name: owner.to_string(),
            creator_id: owner.to_string(),
            coords: vec![c(lat, lng)],
            score: 10,
            claimed_at: "2026-01-01T00:00:00Z".to_string(),
            geohash: geohash::encode(geo::Coord { x: lng, y: lat }, 9).unwrap(),
            shield_until: None,
        }
    }

    #[test]
    fn test_query_bounds_cover_the_center() {
        let center = c(48.1351, 11.5820);
        let ranges = query_bounds_for_circle(&center, 1000.0);
        assert!(!ranges.is_empty());
        assert!(ranges.len() <= 9);

        let center_hash = geohash::encode(geo::Coord { x: 11.5820, y: 48.1351 }, 9).unwrap();
        assert!(
            ranges
                .iter()
                .any(|r| center_hash.as_str() >= r.start.as_str()
                    && center_hash.as_str() <= r.end.as_str()),
            "no range covers the center hash {}",
            center_hash
        );
    }

    #[test]
    fn test_query_bounds_deterministic_and_deduplicated() {
        let center = c(48.0, 11.0);
        let a = query_bounds_for_circle(&center, 500.0);
        let b = query_bounds_for_circle(&center, 500.0);
        assert_eq!(a, b);

        let mut seen = std::collections::HashSet::new();
        for range in &a {
            assert!(seen.insert(range.clone()), "duplicate range {:?}", range);
        }
    }

    #[test]
    fn test_larger_radius_uses_shorter_prefixes() {
        let center = c(48.0, 11.0);
        let small = query_bounds_for_circle(&center, 200.0);
        let large = query_bounds_for_circle(&center, 50_000.0);
        assert!(large[0].start.len() <= small[0].start.len());
    }

    #[test]
    fn test_merge_first_seen_wins() {
        let client = SpatialIndexClient::new(50);

        let original = territory("t1", "alice", 48.0, 11.0);
        assert_eq!(client.merge(vec![original]), 1);

        let mut refetched = territory("t1", "bob", 48.0, 11.0);
        refetched.score = 99;
        assert_eq!(client.merge(vec![refetched]), 0);

        let snapshot = client.rivals_snapshot("nobody");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].owner_id, "alice");
        assert_eq!(snapshot[0].score, 10);
    }

    #[test]
    fn test_rivals_snapshot_excludes_own() {
        let client = SpatialIndexClient::new(50);
        client.merge(vec![
            territory("t1", "me", 48.0, 11.0),
            territory("t2", "rival", 48.0, 11.0),
        ]);

        let rivals = client.rivals_snapshot("me");
        assert_eq!(rivals.len(), 1);
        assert_eq!(rivals[0].id, "t2");
    }

    #[test]
    fn test_visible_filter_kicks_in_above_threshold() {
        let client = SpatialIndexClient::new(2);
        client.merge(vec![
            territory("near-1", "a", 48.0, 11.0),
            territory("near-2", "b", 48.001, 11.0),
            territory("far", "c", 50.0, 20.0),
        ]);

        let viewport = Viewport {
            center: c(48.0, 11.0),
            latitude_delta: 0.05,
            longitude_delta: 0.05,
        };
        let visible = client.visible_territories(&viewport);
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|t| t.id.starts_with("near")));
    }

    #[test]
    fn test_clear_resets_session_state() {
        let client = SpatialIndexClient::new(50);
        client.merge(vec![territory("t1", "a", 48.0, 11.0)]);
        assert!(!client.is_empty());

        client.clear();
        assert!(client.is_empty());
    }
}
