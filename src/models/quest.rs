//! Daily quests and the quest progress engine.
//!
//! Quests are regenerated once per local calendar day and advanced each time
//! a route is committed. `advance` is a pure state-update function; reward
//! granting happens in the capture commit, at the moment progress is first
//! observed crossing the target.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Quest category, a closed set. The stat that feeds each variant:
/// distance run (km), run time (minutes), base score earned, territories
/// conquered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub enum QuestKind {
    Distance,
    Time,
    Score,
    Conquer,
}

/// A single daily quest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct Quest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestKind,
    pub target: f64,
    /// Monotonically increasing, clamped at `target`.
    pub progress: f64,
    /// Score granted when the quest completes.
    pub reward: u32,
    /// Flips irreversibly true the commit that first reaches `target`.
    pub is_claimed: bool,
}

impl Quest {
    /// Whether this quest's progress has reached its target.
    pub fn is_complete(&self) -> bool {
        self.progress >= self.target
    }
}

/// Statistics from one committed run, as fed to the quest engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub distance_km: f64,
    pub duration_min: f64,
    /// Base score earned (excluding quest rewards).
    pub score: u32,
    /// Conquest count: 1 for the new territory plus each captured rival.
    pub conquered: u32,
}

/// Advance quest progress with one run's statistics.
///
/// Claimed quests are untouched. Progress never decreases and never exceeds
/// the target, even when the underlying achievement overshot it. Rewards are
/// NOT granted here; the caller detects the progress-crossed-target edge.
pub fn advance(quests: &[Quest], stats: &RunStats) -> Vec<Quest> {
    quests
        .iter()
        .map(|quest| {
            if quest.is_claimed {
                return quest.clone();
            }
            let gained = match quest.kind {
                QuestKind::Distance => stats.distance_km,
                QuestKind::Time => stats.duration_min,
                QuestKind::Score => stats.score as f64,
                QuestKind::Conquer => stats.conquered as f64,
            };
            let mut next = quest.clone();
            next.progress = (quest.progress + gained).min(quest.target);
            next
        })
        .collect()
}

/// Fixed quest templates: (kind, target, reward).
const DAILY_TEMPLATES: &[(QuestKind, f64, u32)] = &[
    (QuestKind::Distance, 3.0, 30),
    (QuestKind::Time, 30.0, 20),
    (QuestKind::Score, 50.0, 25),
    (QuestKind::Conquer, 2.0, 40),
    (QuestKind::Distance, 5.0, 50),
    (QuestKind::Time, 60.0, 45),
    (QuestKind::Score, 100.0, 60),
    (QuestKind::Conquer, 1.0, 15),
];

/// Number of quests handed out per day.
const QUESTS_PER_DAY: usize = 3;

/// Generate the daily quest set for a local calendar date ("YYYY-MM-DD").
///
/// Deterministic: the same date always yields the same quests, so a client
/// regenerating after a crash agrees with itself. Rotates through the
/// template table by date hash.
pub fn generate_daily(date_key: &str) -> Vec<Quest> {
    let seed = date_key
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));

    (0..QUESTS_PER_DAY)
        .map(|i| {
            let (kind, target, reward) = DAILY_TEMPLATES[(seed + i * 3) % DAILY_TEMPLATES.len()];
            Quest {
                id: format!("{}-{}", date_key, i),
                kind,
                target,
                progress: 0.0,
                reward,
                is_claimed: false,
            }
        })
        .collect()
}

/// Return fresh daily quests when `last_quest_date` is not `today`,
/// otherwise keep the current set.
pub fn refresh_for_day(last_quest_date: Option<&str>, today: &str) -> Option<Vec<Quest>> {
    if last_quest_date == Some(today) {
        return None;
    }
    Some(generate_daily(today))
}
