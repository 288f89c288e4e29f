// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - the game's business logic layer.

pub mod capture;
pub mod offline;
pub mod spatial;
pub mod tracker;

pub use capture::{resolve_route, CaptureProcessor};
pub use offline::OfflineQueue;
pub use spatial::SpatialIndexClient;
pub use tracker::{FinishedRoute, LocationPermission, RouteTracker, TrackerState};
