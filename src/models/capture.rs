// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Capture transaction types: the resolved plan for a finished run and the
//! durable offline record used when the live commit fails.

use serde::{Deserialize, Serialize};

use crate::error::RouteRejection;
use crate::models::quest::Quest;
use crate::models::territory::{Coordinate, Territory};

/// Everything the atomic capture commit needs, computed up front by the
/// resolver from the rival-territory snapshot taken when the run ended.
#[derive(Debug, Clone)]
pub struct CapturePlan {
    /// ID for the new territory document.
    pub territory_id: String,
    /// Closed buffered polygon to store as the territory shape.
    pub coords: Vec<Coordinate>,
    /// Index key derived from the first coordinate of the raw route.
    pub geohash: String,
    /// Base score: floor(km * rate), doubled if a potion was armed.
    pub base_score: u32,
    /// Whether the double-score potion was consumed by this run.
    pub potion_consumed: bool,
    /// Rival territories captured by this run, from the client-side
    /// snapshot. Shielded rivals never appear here.
    pub captured: Vec<CapturedRival>,
    pub distance_km: f64,
    pub duration_secs: u64,
    /// Quest list after advancing progress with this run's stats.
    pub quests_after: Vec<Quest>,
    /// Sum of rewards for quests that crossed their target this run.
    pub quest_reward: u32,
}

impl CapturePlan {
    /// Total score delta applied to the actor's ledger:
    /// base + capture bonuses + quest rewards.
    pub fn ledger_score_delta(&self, capture_bonus: u32) -> u32 {
        self.base_score + capture_bonus * self.captured.len() as u32 + self.quest_reward
    }
}

/// Snapshot of a rival territory at resolve time, enough to write the
/// ownership transfer without re-reading it.
#[derive(Debug, Clone)]
pub struct CapturedRival {
    pub territory: Territory,
}

/// A durable queued copy of a would-be capture commit. Exists from the
/// moment a live commit fails until successful replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineCaptureRecord {
    /// Locally generated id.
    pub id: String,
    /// ID the new territory will be written under at replay.
    pub territory_id: String,
    pub user_id: String,
    pub user_name: String,
    pub coords: Vec<Coordinate>,
    /// Base score at record time (potion already applied).
    pub score: u32,
    /// Whether the armed potion was consumed computing `score`. Replay
    /// clears it from the ledger exactly as the live commit would have.
    #[serde(default)]
    pub potion_consumed: bool,
    pub distance_km: f64,
    pub duration_secs: u64,
    pub geohash: String,
    /// Rival territory ids decided captured at record time. Replay writes
    /// these as unconditionally captured.
    pub gasped_territory_ids: Vec<String>,
    /// When the record was queued (RFC 3339).
    pub queued_at: String,
}

impl OfflineCaptureRecord {
    /// Build the durable record from a plan that failed to commit. The
    /// computed score/coords/geohash/captured-list are carried unmodified.
    pub fn from_plan(plan: &CapturePlan, user_id: &str, user_name: &str, queued_at: &str) -> Self {
        Self {
            id: format!("oc-{}", plan.territory_id),
            territory_id: plan.territory_id.clone(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            coords: plan.coords.clone(),
            score: plan.base_score,
            potion_consumed: plan.potion_consumed,
            distance_km: plan.distance_km,
            duration_secs: plan.duration_secs,
            geohash: plan.geohash.clone(),
            gasped_territory_ids: plan
                .captured
                .iter()
                .map(|c| c.territory.id.clone())
                .collect(),
            queued_at: queued_at.to_string(),
        }
    }
}

/// Outcome of finishing a run, for the UI layer.
#[derive(Debug)]
pub enum RunOutcome {
    /// The capture committed; the plan describes what was applied.
    Committed(CapturePlan),
    /// The commit failed but the capture is safely queued for replay.
    SavedOffline(OfflineCaptureRecord),
    /// The run was discarded without being scored.
    Rejected(RouteRejection),
}
