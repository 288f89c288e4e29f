// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User ledger model: scoring totals, inventory, and daily quests.

use serde::{Deserialize, Serialize};

use crate::models::quest::Quest;
use crate::models::territory::PrivacyZone;

/// The acting user's identity, as needed for ownership transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub name: String,
}

/// Per-user scoring ledger document.
///
/// Owned by the backend's `users` collection; the core only ever applies
/// deltas to it inside the atomic capture commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLedger {
    /// Lifetime distance run (km)
    #[serde(default)]
    pub total_distance: f64,
    /// Lifetime committed routes
    #[serde(default)]
    pub total_routes: u32,
    /// Lifetime score
    #[serde(default)]
    pub total_score: u32,
    /// Score within the current leaderboard week; mirrors every total_score
    /// delta and is reset elsewhere (leaderboard job, out of scope)
    #[serde(default)]
    pub weekly_score: u32,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_zone: Option<PrivacyZone>,
    #[serde(default)]
    pub daily_quests: Vec<Quest>,
    /// Local calendar date ("YYYY-MM-DD") the daily quests were generated on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quest_date: Option<String>,
}

/// Consumable inventory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    /// Shield tokens available to protect territories
    #[serde(default)]
    pub shields: u32,
    /// Single-use score-multiplier token; cleared the run it is consumed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_potion: Option<String>,
}

impl UserLedger {
    /// Whether a double-score potion is armed for the next run.
    pub fn has_active_potion(&self) -> bool {
        self.inventory.active_potion.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_defaults_from_empty_document() {
        // Firestore documents created by older client versions may lack
        // most fields entirely.
        let ledger: UserLedger = serde_json::from_str("{}").unwrap();
        assert_eq!(ledger.total_routes, 0);
        assert_eq!(ledger.inventory.shields, 0);
        assert!(!ledger.has_active_potion());
        assert!(ledger.daily_quests.is_empty());
    }

    #[test]
    fn test_ledger_camel_case_wire_format() {
        let mut ledger = UserLedger::default();
        ledger.total_distance = 4.2;
        ledger.inventory.active_potion = Some("double-score".to_string());

        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.contains("\"totalDistance\":4.2"));
        assert!(json.contains("\"activePotion\""));
    }
}
