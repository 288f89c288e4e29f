// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Capture resolution: turn a finished raw route into the atomic write that
//! claims a territory, transfers captured rivals, and credits the ledger.
//!
//! Resolution is pure (`resolve_route`); `CaptureProcessor::finish_run`
//! wires it to the store, the spatial cache, and the offline queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::GameConfig;
use crate::db::FirestoreDb;
use crate::error::{GameError, Result, RouteRejection};
use crate::geometry;
use crate::models::capture::{CapturePlan, CapturedRival, OfflineCaptureRecord, RunOutcome};
use crate::models::ledger::{Actor, UserLedger};
use crate::models::quest::{self, RunStats};
use crate::models::territory::{Coordinate, Territory};
use crate::services::offline::OfflineQueue;
use crate::services::spatial::SpatialIndexClient;

/// Resolve a finished raw route against the rival snapshot.
///
/// `rivals` is the client-side snapshot taken when the run ended; it must
/// already exclude the actor's own territories. Shielded rivals are removed
/// from the candidate list before scoring, so they count toward neither
/// captures nor quest conquest stats.
pub fn resolve_route(
    config: &GameConfig,
    actor: &Actor,
    route: &[Coordinate],
    duration_secs: u64,
    ledger: &UserLedger,
    rivals: &[Territory],
    now: DateTime<Utc>,
) -> std::result::Result<CapturePlan, RouteRejection> {
    // 1. Distance gate, on the raw route
    let distance_km = geometry::route_distance_km(route);
    if distance_km < config.min_route_km {
        return Err(RouteRejection::TooShort(distance_km));
    }

    // 2. Privacy-zone trim
    let trimmed = geometry::trim_to_privacy_zone(route, ledger.privacy_zone.as_ref());
    if trimmed.len() < 2 {
        return Err(RouteRejection::InsidePrivacyZone);
    }

    // 3.-4. Simplify, then buffer into the stored polygon
    let simplified = geometry::simplify_route(&trimmed, config.simplify_tolerance_deg);
    let polygon = geometry::buffer_route(&simplified, config.territory_width_km);
    if polygon.len() < 4 {
        return Err(RouteRejection::DegenerateBuffer);
    }

    // 5. Capture test: the original trimmed route (not the simplified or
    //    buffered one) against each unshielded rival's stored polygon.
    //    No limit on how many fall in one run.
    let captured: Vec<CapturedRival> = rivals
        .iter()
        .filter(|rival| !rival.is_shielded(now))
        .filter(|rival| {
            geometry::route_intersects(&trimmed, &rival.coords, config.capture_buffer_m)
        })
        .map(|rival| CapturedRival {
            territory: rival.clone(),
        })
        .collect();

    // 6. Base score; the potion doubles it exactly once per run
    let mut base_score = (distance_km * config.score_per_km as f64).floor() as u32;
    let potion_consumed = ledger.has_active_potion();
    if potion_consumed {
        base_score *= 2;
    }

    // 9. Quest progress; claiming a quest adds its reward to the same commit
    let stats = RunStats {
        distance_km,
        duration_min: duration_secs as f64 / 60.0,
        score: base_score,
        conquered: 1 + captured.len() as u32,
    };
    let mut quests_after = quest::advance(&ledger.daily_quests, &stats);
    let mut quest_reward = 0;
    for (before, after) in ledger.daily_quests.iter().zip(quests_after.iter_mut()) {
        if !before.is_claimed && after.is_complete() {
            after.is_claimed = true;
            quest_reward += after.reward;
        }
    }

    // 11. Index key from the first coordinate of the raw finished route
    let start = &route[0];
    let hash = geohash::encode(
        geo::Coord {
            x: start.longitude,
            y: start.latitude,
        },
        config.geohash_precision,
    )
    .unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to geohash route start");
        String::new()
    });

    Ok(CapturePlan {
        territory_id: format!("{}-{}", actor.id, now.timestamp_millis()),
        coords: polygon,
        geohash: hash,
        base_score,
        potion_consumed,
        captured,
        distance_km,
        duration_secs,
        quests_after,
        quest_reward,
    })
}

/// End-of-run workflow: resolve, commit atomically, patch the local cache,
/// and fall back to the offline queue when the commit fails.
pub struct CaptureProcessor {
    config: GameConfig,
    db: FirestoreDb,
    spatial: Arc<SpatialIndexClient>,
    offline: Arc<OfflineQueue>,
}

impl CaptureProcessor {
    pub fn new(
        config: GameConfig,
        db: FirestoreDb,
        spatial: Arc<SpatialIndexClient>,
        offline: Arc<OfflineQueue>,
    ) -> Self {
        Self {
            config,
            db,
            spatial,
            offline,
        }
    }

    /// Process a finished run.
    ///
    /// The rival snapshot is taken here, at run end; captures that land
    /// elsewhere between snapshot and commit are not re-checked.
    pub async fn finish_run(
        &self,
        actor: &Actor,
        ledger: &UserLedger,
        route: &[Coordinate],
        duration_secs: u64,
    ) -> Result<RunOutcome> {
        let now = Utc::now();
        let rivals = self.spatial.rivals_snapshot(&actor.id);

        let plan = match resolve_route(
            &self.config,
            actor,
            route,
            duration_secs,
            ledger,
            &rivals,
            now,
        ) {
            Ok(plan) => plan,
            Err(rejection) => {
                tracing::info!(user = %actor.id, reason = %rejection, "Run discarded");
                return Ok(RunOutcome::Rejected(rejection));
            }
        };

        match self
            .db
            .commit_capture_atomic(actor, &plan, self.config.capture_bonus)
            .await
        {
            Ok(()) => {
                // Local patch only after the commit succeeded: the map must
                // never show a capture the store rejected.
                self.spatial
                    .apply_capture(actor, &plan, self.config.capture_bonus);
                Ok(RunOutcome::Committed(plan))
            }
            Err(commit_err) => {
                tracing::warn!(user = %actor.id, error = %commit_err, "Commit failed, saving capture offline");
                let record = OfflineCaptureRecord::from_plan(
                    &plan,
                    &actor.id,
                    &actor.name,
                    &now.to_rfc3339(),
                );
                match self.offline.enqueue(record.clone()) {
                    Ok(()) => Ok(RunOutcome::SavedOffline(record)),
                    Err(queue_err) => {
                        tracing::error!(user = %actor.id, error = %queue_err, "Offline enqueue failed, capture lost");
                        Err(GameError::CaptureLost(format!(
                            "commit failed ({}), offline save failed ({})",
                            commit_err, queue_err
                        )))
                    }
                }
            }
        }
    }
}
