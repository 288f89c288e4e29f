// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Offline durability layer: a durable queue of capture commits that could
//! not reach the store, replayed when connectivity returns.
//!
//! Queue order carries no meaning; every record is independent. Replay is
//! single-flight so no record can be committed twice concurrently.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::capture::OfflineCaptureRecord;
use crate::storage::QueueStore;

pub struct OfflineQueue {
    store: QueueStore,
    replaying: AtomicBool,
    capture_bonus: u32,
}

impl OfflineQueue {
    pub fn new(store: QueueStore, capture_bonus: u32) -> Self {
        Self {
            store,
            replaying: AtomicBool::new(false),
            capture_bonus,
        }
    }

    /// Durably append a failed capture. The record already carries its
    /// locally generated id.
    pub fn enqueue(&self, record: OfflineCaptureRecord) -> Result<()> {
        let mut records = self.store.load();
        tracing::info!(record = %record.id, queued = records.len() + 1, "Capture saved offline");
        records.push(record);
        self.store.save(&records)?;
        Ok(())
    }

    /// Number of records waiting for replay.
    pub fn len(&self) -> usize {
        self.store.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempt to commit every queued record.
    ///
    /// A no-op (returning 0) when the queue is empty, a replay is already
    /// running, or the store is unreachable. Records that fail to commit
    /// stay queued for a later pass; the persisted list is rewritten to the
    /// remainder. Returns the number successfully replayed.
    pub async fn replay(&self, db: &FirestoreDb) -> Result<usize> {
        let records = self.store.load();
        if records.is_empty() || !db.is_connected() {
            return Ok(0);
        }
        if self.replaying.swap(true, Ordering::SeqCst) {
            tracing::debug!("Replay already in flight");
            return Ok(0);
        }

        let mut replayed_ids = HashSet::new();
        for record in records {
            match db.commit_offline_record(&record, self.capture_bonus).await {
                Ok(()) => {
                    replayed_ids.insert(record.id);
                }
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "Replay failed, keeping record");
                }
            }
        }

        let result = self.drain_replayed(&replayed_ids);
        self.replaying.store(false, Ordering::SeqCst);
        result?;

        if !replayed_ids.is_empty() {
            tracing::info!(replayed = replayed_ids.len(), remaining = self.len(), "Offline replay finished");
        }
        Ok(replayed_ids.len())
    }

    /// Remove exactly the replayed records from the persisted queue.
    ///
    /// Works from a fresh load rather than the snapshot replay iterated
    /// over: a capture enqueued while a commit was in flight must survive
    /// the rewrite.
    fn drain_replayed(&self, replayed_ids: &HashSet<String>) -> Result<()> {
        let remaining: Vec<OfflineCaptureRecord> = self
            .store
            .load()
            .into_iter()
            .filter(|record| !replayed_ids.contains(&record.id))
            .collect();
        self.store.save(&remaining)?;
        Ok(())
    }

    /// Replay trigger policy: fire whenever connectivity transitions to
    /// available and the queue is non-empty (also called opportunistically
    /// at session start).
    pub async fn on_connectivity_changed(&self, online: bool, db: &FirestoreDb) -> Result<usize> {
        if !online || self.is_empty() {
            return Ok(0);
        }
        self.replay(db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::territory::Coordinate;

    fn record(id: &str) -> OfflineCaptureRecord {
        OfflineCaptureRecord {
            id: id.to_string(),
            territory_id: format!("t-{}", id),
            user_id: "runner-1".to_string(),
            user_name: "Runner One".to_string(),
            coords: vec![Coordinate::new(48.0, 11.0), Coordinate::new(48.001, 11.0)],
            score: 10,
            potion_consumed: false,
            distance_km: 1.0,
            duration_secs: 600,
            geohash: "u0zh7w8p1".to_string(),
            gasped_territory_ids: vec![],
            queued_at: "2026-08-29T10:00:00Z".to_string(),
        }
    }

    fn queue() -> (OfflineQueue, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let q = OfflineQueue::new(QueueStore::new(dir.path()), 5);
        (q, dir)
    }

    #[tokio::test]
    async fn test_replay_of_empty_queue_is_noop() {
        let (q, _dir) = queue();
        // Connected or not, an empty queue replays nothing
        let replayed = q.replay(&FirestoreDb::new_mock()).await.unwrap();
        assert_eq!(replayed, 0);
    }

    #[tokio::test]
    async fn test_replay_skipped_without_connectivity() {
        let (q, _dir) = queue();
        q.enqueue(record("a")).unwrap();

        let replayed = q.replay(&FirestoreDb::new_mock()).await.unwrap();

        assert_eq!(replayed, 0);
        assert_eq!(q.len(), 1); // record still queued
    }

    #[test]
    fn test_enqueue_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let q = OfflineQueue::new(QueueStore::new(dir.path()), 5);
            q.enqueue(record("a")).unwrap();
            q.enqueue(record("b")).unwrap();
        }

        // Fresh instance over the same directory sees both records
        let q = OfflineQueue::new(QueueStore::new(dir.path()), 5);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_drain_keeps_records_enqueued_during_replay() {
        let (q, _dir) = queue();
        q.enqueue(record("a")).unwrap();
        q.enqueue(record("b")).unwrap();

        // "c" lands while the commit for "a" is still in flight
        q.enqueue(record("c")).unwrap();

        let mut replayed = HashSet::new();
        replayed.insert("a".to_string());
        q.drain_replayed(&replayed).unwrap();

        let ids: Vec<String> = q.store.load().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_connectivity_trigger_requires_online() {
        let (q, _dir) = queue();
        q.enqueue(record("a")).unwrap();

        let replayed = q
            .on_connectivity_changed(false, &FirestoreDb::new_mock())
            .await
            .unwrap();
        assert_eq!(replayed, 0);
    }
}
