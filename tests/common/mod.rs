// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use gasp_tracker::db::FirestoreDb;
use gasp_tracker::models::ledger::Actor;
use gasp_tracker::models::territory::{Coordinate, Territory};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Generate a unique user ID for test isolation.
#[allow(dead_code)]
pub fn unique_user_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

#[allow(dead_code)]
pub fn test_actor(user_id: &str) -> Actor {
    Actor {
        id: user_id.to_string(),
        name: "Test Runner".to_string(),
    }
}

/// A small square territory around (lat, lng), closed ring.
#[allow(dead_code)]
pub fn square_territory(id: &str, owner_id: &str, lat: f64, lng: f64) -> Territory {
    let d = 2e-4;
    Territory {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        owner_name: format!("Owner of {}", id),
        creator_id: owner_id.to_string(),
        coords: vec![
            Coordinate::new(lat - d, lng - d),
            Coordinate::new(lat - d, lng + d),
            Coordinate::new(lat + d, lng + d),
            Coordinate::new(lat + d, lng - d),
            Coordinate::new(lat - d, lng - d),
        ],
        score: 10,
        claimed_at: chrono::Utc::now().to_rfc3339(),
        geohash: "u0zh7w8p1".to_string(),
        shield_until: None,
    }
}
