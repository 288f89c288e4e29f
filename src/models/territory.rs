// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Territory model and the small geo value types shared across the core.
//!
//! Persisted documents use camelCase field names to stay wire-compatible
//! with the mobile client's Firestore collections.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A single GPS sample. Ordered sequences of these carry temporal order:
/// insertion order is callback-arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A claimed area: the buffered "sausage" polygon around a finished route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct Territory {
    /// Document ID, assigned at creation, immutable.
    pub id: String,
    /// Current holder. Changes on capture.
    pub owner_id: String,
    /// Display name of the current holder.
    pub owner_name: String,
    /// Original creator, immutable once set. Used for all-time attribution
    /// as opposed to current-owner competitive attribution.
    pub creator_id: String,
    /// Closed buffered polygon ring (first point ~ last point, >= 4 points).
    pub coords: Vec<Coordinate>,
    /// Cumulative point value. Grows by the capture bonus each time the
    /// territory changes hands.
    #[serde(rename = "gaspScore")]
    pub score: u32,
    /// Timestamp of the most recent ownership change (RFC 3339).
    pub claimed_at: String,
    /// Spatial index key derived from the route's starting coordinate.
    /// Immutable once set.
    pub geohash: String,
    /// While in the future, the territory is immune to capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield_until: Option<String>,
}

impl Territory {
    /// Whether the territory's shield is active at `now`.
    ///
    /// An unparseable shield timestamp counts as unshielded.
    pub fn is_shielded(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match &self.shield_until {
            Some(raw) => match chrono::DateTime::parse_from_rfc3339(raw) {
                Ok(until) => until.with_timezone(&chrono::Utc) > now,
                Err(_) => {
                    tracing::warn!(territory = %self.id, shield = %raw, "Unparseable shieldUntil, treating as unshielded");
                    false
                }
            },
            None => false,
        }
    }
}

/// Circular exclusion zone around a saved "home" location. Route segments
/// inside it are never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct PrivacyZone {
    pub center: Coordinate,
    /// Zone radius in meters.
    pub radius_m: f64,
    pub enabled: bool,
}

/// Map viewport: center plus half-delta spans, matching the mobile map
/// component's region model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub center: Coordinate,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}
