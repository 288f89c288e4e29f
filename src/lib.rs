// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Gasp-Tracker: route-to-territory core for a territory conquest game.
//!
//! This crate is the geometry/capture/sync engine behind the mobile client:
//! GPS traces become privacy-filtered buffered polygons, routes crossing
//! rival territories capture them, and every run commits as one atomic
//! write against the shared scoring ledger — or is queued durably when the
//! network is away.
//!
//! There is no UI or server here; the surrounding app drives the core
//! through [`GameSession`], [`services::RouteTracker`] and the map's
//! viewport events.

pub mod config;
pub mod db;
pub mod error;
pub mod geometry;
pub mod models;
pub mod services;
pub mod storage;

use std::sync::Arc;

use config::GameConfig;
use db::FirestoreDb;
use error::Result;
use models::capture::RunOutcome;
use models::ledger::{Actor, UserLedger};
use models::territory::{Coordinate, Viewport};
use services::{CaptureProcessor, OfflineQueue, SpatialIndexClient};
use storage::QueueStore;

/// Per-login session coordinator.
///
/// Owns the process-scoped mutable caches (known territories, loaded
/// geohash buckets) and the offline queue with an explicit lifecycle:
/// created on session start, cleared by [`GameSession::end`]. Nothing here
/// is an ambient global.
pub struct GameSession {
    pub config: GameConfig,
    pub db: FirestoreDb,
    pub spatial: Arc<SpatialIndexClient>,
    pub offline: Arc<OfflineQueue>,
    capture: CaptureProcessor,
}

impl GameSession {
    pub fn new(config: GameConfig, db: FirestoreDb) -> Self {
        let spatial = Arc::new(SpatialIndexClient::new(config.visible_filter_threshold));
        let offline = Arc::new(OfflineQueue::new(
            QueueStore::new(&config.data_dir),
            config.capture_bonus,
        ));
        let capture = CaptureProcessor::new(
            config.clone(),
            db.clone(),
            Arc::clone(&spatial),
            Arc::clone(&offline),
        );
        Self {
            config,
            db,
            spatial,
            offline,
            capture,
        }
    }

    /// Opportunistic session-start replay of any queued offline captures.
    pub async fn start(&self) -> Result<usize> {
        self.offline.replay(&self.db).await
    }

    /// Map pan/zoom: load territory buckets covering the viewport.
    pub async fn on_viewport_changed(&self, viewport: &Viewport) -> Result<usize> {
        self.spatial.load_for_viewport(&self.db, viewport).await
    }

    /// Run finished: resolve and commit the capture.
    pub async fn finish_run(
        &self,
        actor: &Actor,
        ledger: &UserLedger,
        route: &[Coordinate],
        duration_secs: u64,
    ) -> Result<RunOutcome> {
        self.capture
            .finish_run(actor, ledger, route, duration_secs)
            .await
    }

    /// Connectivity callback from the platform's network monitor.
    pub async fn on_connectivity_changed(&self, online: bool) -> Result<usize> {
        self.offline.on_connectivity_changed(online, &self.db).await
    }

    /// Session end (logout): drop the session-scoped caches. The offline
    /// queue is durable on purpose and survives.
    pub fn end(&self) {
        self.spatial.clear();
        tracing::info!("Session ended, spatial caches cleared");
    }
}
