// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Territories (claimed polygons, geohash range queries)
//! - User ledgers (scoring totals, inventory, daily quests)
//! - The atomic capture commit (territory create + rival transfers +
//!   ledger update, all-or-nothing)

use crate::db::collections;
use crate::error::GameError;
use crate::models::capture::{CapturePlan, OfflineCaptureRecord};
use crate::models::ledger::{Actor, UserLedger};
use crate::models::territory::Territory;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, GameError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| GameError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, GameError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            GameError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client (offline mode).
    ///
    /// All database operations will return an error if called; the capture
    /// path uses this to exercise the offline durability layer.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Whether the backing store is reachable. Used as the connectivity
    /// probe gating offline replay.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, GameError> {
        self.client
            .as_ref()
            .ok_or_else(|| GameError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Territory Operations ────────────────────────────────────

    /// Get a territory by ID.
    pub async fn get_territory(&self, territory_id: &str) -> Result<Option<Territory>, GameError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TERRITORIES)
            .obj()
            .one(territory_id)
            .await
            .map_err(|e| GameError::Database(e.to_string()))
    }

    /// Create or update a territory document.
    pub async fn upsert_territory(&self, territory: &Territory) -> Result<(), GameError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TERRITORIES)
            .document_id(&territory.id)
            .object(territory)
            .execute()
            .await
            .map_err(|e| GameError::Database(e.to_string()))?;
        Ok(())
    }

    /// Query territories whose geohash falls in an inclusive string range.
    ///
    /// This is the bucket query behind the spatial index: a two-sided
    /// inequality on the indexed `geohash` field.
    pub async fn territories_in_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<Territory>, GameError> {
        let start = start.to_string();
        let end = end.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TERRITORIES)
            .filter(move |q| {
                q.for_all([
                    q.field("geohash").greater_than_or_equal(start.clone()),
                    q.field("geohash").less_than_or_equal(end.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| GameError::Database(e.to_string()))
    }

    // ─── Ledger Operations ───────────────────────────────────────

    /// Get a user's ledger document.
    pub async fn get_ledger(&self, user_id: &str) -> Result<Option<UserLedger>, GameError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| GameError::Database(e.to_string()))
    }

    /// Create or update a user's ledger document.
    pub async fn set_ledger(&self, user_id: &str, ledger: &UserLedger) -> Result<(), GameError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(ledger)
            .execute()
            .await
            .map_err(|e| GameError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Atomic Capture Commit ───────────────────────────────────

    /// Atomically commit a resolved capture: create the new territory,
    /// transfer every captured rival, and apply the ledger deltas.
    ///
    /// Uses a Firestore transaction so all writes succeed or fail together.
    /// The ledger is read inside the transaction, registering it for
    /// conflict detection: if another actor's commit lands concurrently,
    /// Firestore retries with fresh data, so the ledger deltas compose like
    /// increments instead of losing updates.
    ///
    /// Rival territories are written from the plan's snapshot; current
    /// ownership is NOT re-validated server-side (known consistency gap,
    /// accepted: capture was decided against the client snapshot).
    pub async fn commit_capture_atomic(
        &self,
        actor: &Actor,
        plan: &CapturePlan,
        capture_bonus: u32,
    ) -> Result<(), GameError> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| GameError::Database(format!("Failed to begin transaction: {}", e)))?;

        // 1. Read the ledger within the transaction (conflict registration)
        let current: Option<UserLedger> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&actor.id)
            .await
            .map_err(|e| GameError::Database(format!("Failed to read ledger: {}", e)))?;

        let mut ledger = current.unwrap_or_default();

        // 2. Apply the ledger deltas in memory
        ledger.total_distance += plan.distance_km;
        ledger.total_routes += 1;
        let score_delta = plan.ledger_score_delta(capture_bonus);
        ledger.total_score += score_delta;
        ledger.weekly_score += score_delta;
        if plan.potion_consumed {
            ledger.inventory.active_potion = None;
        }
        ledger.daily_quests = plan.quests_after.clone();

        // 3. Add the new territory to the transaction
        let territory = Territory {
            id: plan.territory_id.clone(),
            owner_id: actor.id.clone(),
            owner_name: actor.name.clone(),
            creator_id: actor.id.clone(),
            coords: plan.coords.clone(),
            score: plan.base_score,
            claimed_at: now.clone(),
            geohash: plan.geohash.clone(),
            shield_until: None,
        };
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::TERRITORIES)
            .document_id(&territory.id)
            .object(&territory)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                GameError::Database(format!("Failed to add territory to transaction: {}", e))
            })?;

        // 4. Add every rival ownership transfer
        for rival in &plan.captured {
            let mut transferred = rival.territory.clone();
            transferred.owner_id = actor.id.clone();
            transferred.owner_name = actor.name.clone();
            transferred.score += capture_bonus;
            transferred.claimed_at = now.clone();

            self.get_client()?
                .fluent()
                .update()
                .in_col(collections::TERRITORIES)
                .document_id(&transferred.id)
                .object(&transferred)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    GameError::Database(format!("Failed to add rival transfer: {}", e))
                })?;
        }

        // 5. Add the ledger write
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&actor.id)
            .object(&ledger)
            .add_to_transaction(&mut transaction)
            .map_err(|e| GameError::Database(format!("Failed to add ledger write: {}", e)))?;

        // 6. Commit atomically
        transaction
            .commit()
            .await
            .map_err(|e| GameError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            user = %actor.id,
            territory = %plan.territory_id,
            captured = plan.captured.len(),
            score = score_delta,
            "Capture committed atomically"
        );

        Ok(())
    }

    /// Replay one queued offline capture with the same all-or-nothing
    /// semantics as the live commit.
    ///
    /// Ownership transfer is NOT re-evaluated: intersection was decided at
    /// record time, so rivals are read in the transaction only to get their
    /// current document and are transferred unconditionally. A potion
    /// consumed computing the record's score is cleared here; quest progress
    /// is not part of the durable record and is left untouched.
    pub async fn commit_offline_record(
        &self,
        record: &OfflineCaptureRecord,
        capture_bonus: u32,
    ) -> Result<(), GameError> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| GameError::Database(format!("Failed to begin transaction: {}", e)))?;

        let current: Option<UserLedger> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&record.user_id)
            .await
            .map_err(|e| GameError::Database(format!("Failed to read ledger: {}", e)))?;

        // Rivals may have been deleted since the record was queued; those
        // transfers are skipped, not failed.
        let mut transferred_count: u32 = 0;
        for rival_id in &record.gasped_territory_ids {
            let rival: Option<Territory> = self
                .get_client()?
                .fluent()
                .select()
                .by_id_in(collections::TERRITORIES)
                .obj()
                .one(rival_id)
                .await
                .map_err(|e| GameError::Database(format!("Failed to read rival: {}", e)))?;

            let mut rival = match rival {
                Some(r) => r,
                None => {
                    tracing::warn!(territory = %rival_id, "Rival missing at replay, skipping transfer");
                    continue;
                }
            };
            rival.owner_id = record.user_id.clone();
            rival.owner_name = record.user_name.clone();
            rival.score += capture_bonus;
            rival.claimed_at = now.clone();

            self.get_client()?
                .fluent()
                .update()
                .in_col(collections::TERRITORIES)
                .document_id(rival_id)
                .object(&rival)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    GameError::Database(format!("Failed to add rival transfer: {}", e))
                })?;
            transferred_count += 1;
        }

        let mut ledger = current.unwrap_or_default();
        let score_delta = record.score + capture_bonus * transferred_count;
        ledger.total_distance += record.distance_km;
        ledger.total_routes += 1;
        ledger.total_score += score_delta;
        ledger.weekly_score += score_delta;
        if record.potion_consumed {
            ledger.inventory.active_potion = None;
        }

        let territory = Territory {
            id: record.territory_id.clone(),
            owner_id: record.user_id.clone(),
            owner_name: record.user_name.clone(),
            creator_id: record.user_id.clone(),
            coords: record.coords.clone(),
            score: record.score,
            claimed_at: now.clone(),
            geohash: record.geohash.clone(),
            shield_until: None,
        };
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::TERRITORIES)
            .document_id(&territory.id)
            .object(&territory)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                GameError::Database(format!("Failed to add territory to transaction: {}", e))
            })?;

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&record.user_id)
            .object(&ledger)
            .add_to_transaction(&mut transaction)
            .map_err(|e| GameError::Database(format!("Failed to add ledger write: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| GameError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            user = %record.user_id,
            record = %record.id,
            transferred = transferred_count,
            "Offline capture replayed"
        );

        Ok(())
    }
}
