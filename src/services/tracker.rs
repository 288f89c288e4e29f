// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GPS route tracker: the live sampling lifecycle for one run.
//!
//! Fixes are pushed in by the platform's location callbacks; the tracker
//! owns the in-memory coordinate log, the elapsed-time bookkeeping, and the
//! persisted background session that lets an active run survive both app
//! suspension and a full process restart.

use chrono::{DateTime, Duration, Utc};

use crate::error::{GameError, Result};
use crate::models::territory::Coordinate;
use crate::storage::{PersistedSession, SessionStore};

/// Foreground location permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationPermission {
    Granted,
    Denied,
}

/// Tracker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Tracking,
}

/// A finished tracking session: the chosen coordinate log and total
/// duration.
#[derive(Debug, Clone)]
pub struct FinishedRoute {
    pub coords: Vec<Coordinate>,
    pub duration: Duration,
}

pub struct RouteTracker {
    state: TrackerState,
    coords: Vec<Coordinate>,
    started_at: Option<DateTime<Utc>>,
    current_location: Option<Coordinate>,
    /// Whether the OS-level background sampling session started. Best
    /// effort: when false, tracking continues foreground-only.
    background_active: bool,
    session: SessionStore,
}

impl RouteTracker {
    pub fn new(session: SessionStore) -> Self {
        Self {
            state: TrackerState::Idle,
            coords: Vec::new(),
            started_at: None,
            current_location: None,
            background_active: false,
            session,
        }
    }

    /// Cold-start recovery: if a background session was persisted while a
    /// run was active, resume directly into `Tracking` with its data.
    pub fn recover(session: SessionStore) -> Self {
        match session.load() {
            Some(persisted) => {
                tracing::info!(
                    points = persisted.coords.len(),
                    started_at = %persisted.started_at,
                    "Resuming tracking session after restart"
                );
                let current_location = persisted.coords.last().copied();
                Self {
                    state: TrackerState::Tracking,
                    coords: persisted.coords,
                    started_at: Some(persisted.started_at),
                    current_location,
                    background_active: true,
                    session,
                }
            }
            None => Self::new(session),
        }
    }

    /// Begin a tracking session.
    ///
    /// `permission` is the caller's foreground permission check result;
    /// denial fails without mutating tracking state. `background_started`
    /// reports whether the OS-level background sampling session could be
    /// started; failure there is non-fatal and only recorded in the
    /// [`RouteTracker::background_active`] flag.
    pub fn start(
        &mut self,
        permission: LocationPermission,
        background_started: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if permission == LocationPermission::Denied {
            return Err(GameError::PermissionDenied);
        }

        // Stale data from an earlier crashed run must not leak into this one
        self.session.clear();
        self.coords.clear();
        self.started_at = Some(now);
        self.background_active = background_started;
        self.state = TrackerState::Tracking;

        if background_started {
            self.session.save(&PersistedSession {
                coords: Vec::new(),
                started_at: now,
            })?;
        } else {
            tracing::warn!("Background sampling unavailable, tracking foreground-only");
        }

        tracing::info!(background = background_started, "Tracking started");
        Ok(())
    }

    /// Append a foreground GPS fix.
    ///
    /// A fix that was in flight when the tracker stopped arrives here after
    /// the state changed; it is discarded, not appended.
    pub fn record_fix(&mut self, fix: Coordinate) {
        if self.state != TrackerState::Tracking {
            tracing::debug!("Dropping GPS fix received while idle");
            return;
        }
        self.current_location = Some(fix);
        self.coords.push(fix);
    }

    /// Append a background GPS fix to the persisted log. Errors are logged
    /// and skipped: a lost background fix must not crash tracking.
    pub fn record_background_fix(&mut self, fix: Coordinate) {
        if !self.background_active {
            return;
        }
        if let Err(e) = self.session.append_fix(fix) {
            tracing::warn!(error = %e, "Failed to persist background fix");
        }
    }

    /// Elapsed tracking time, recomputed from the captured start timestamp
    /// so catch-up after a suspended timer is exact.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.started_at {
            Some(started_at) => now - started_at,
            None => Duration::zero(),
        }
    }

    /// Halt sampling and return the finished route.
    ///
    /// When background sampling was active, the persisted background log is
    /// preferred over the in-memory log whenever it is longer: more samples
    /// implies more complete data. No timestamp merge is attempted.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<FinishedRoute> {
        if self.state != TrackerState::Tracking {
            return None;
        }

        let mut coords = std::mem::take(&mut self.coords);
        if self.background_active {
            if let Some(persisted) = self.session.load() {
                if persisted.coords.len() > coords.len() {
                    tracing::info!(
                        foreground = coords.len(),
                        background = persisted.coords.len(),
                        "Using longer background log"
                    );
                    coords = persisted.coords;
                }
            }
        }

        let duration = self.elapsed(now);
        self.session.clear();
        self.state = TrackerState::Idle;
        self.started_at = None;
        self.background_active = false;

        tracing::info!(points = coords.len(), secs = duration.num_seconds(), "Tracking stopped");
        Some(FinishedRoute { coords, duration })
    }

    /// Clear in-memory coordinates, duration, and the persisted background
    /// log. Does not stop an active OS-level session; callers must `stop()`
    /// first if one is running.
    pub fn reset(&mut self) {
        self.coords.clear();
        self.started_at = None;
        self.current_location = None;
        self.session.clear();
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackerState::Tracking
    }

    pub fn background_active(&self) -> bool {
        self.background_active
    }

    pub fn current_location(&self) -> Option<Coordinate> {
        self.current_location
    }

    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }
}
