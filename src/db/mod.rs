//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// Claimed territories, indexed by the `geohash` field.
    pub const TERRITORIES: &str = "territories";
    /// User ledgers (scoring totals, inventory, quests), keyed by user id.
    pub const USERS: &str = "users";
}
