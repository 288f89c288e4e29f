// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the game core.

pub mod capture;
pub mod ledger;
pub mod quest;
pub mod territory;

pub use capture::{CapturePlan, CapturedRival, OfflineCaptureRecord, RunOutcome};
pub use ledger::{Actor, Inventory, UserLedger};
pub use quest::{Quest, QuestKind, RunStats};
pub use territory::{Coordinate, PrivacyZone, Territory, Viewport};
