// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.
//!
//! Only I/O-boundary operations (store, device storage, permissions) signal
//! failure through these types. Geometry and spatial-index functions degrade
//! on malformed input instead of failing, so callers can rely on
//! length/emptiness checks rather than error handling.

use crate::storage::StorageError;

/// Top-level error type for the game core.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Location permission was denied; a run cannot start without it.
    /// Not retryable without re-requesting permission.
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Device storage error: {0}")]
    Storage(#[from] StorageError),

    /// Both the live commit and the offline enqueue failed. The run's
    /// capture is unrecoverable and the user must be told so.
    #[error("Capture could not be saved: {0}")]
    CaptureLost(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Soft validation failures: the run is discarded without being scored,
/// with a specific reason the UI can surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteRejection {
    #[error("Route too short: {0:.3} km is below the minimum")]
    TooShort(f64),

    #[error("Route never leaves the privacy zone")]
    InsidePrivacyZone,

    #[error("Route produced an empty territory polygon")]
    DegenerateBuffer,
}

/// Result type alias for fallible core operations.
pub type Result<T> = std::result::Result<T, GameError>;
