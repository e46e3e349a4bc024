//! Persisted cache of submitted emails with time-based expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::ports::{Clock, KeyValueStore};
use crate::error::Result;

/// Storage key the record set is kept under by default.
pub const DEFAULT_STORAGE_KEY: &str = "emails";

/// A submitted identifier and the moment it stops suppressing resubmission.
///
/// Serialized as `{"name": ..., "liveToDate": <epoch millis>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// The submitted email address
    #[serde(rename = "name")]
    pub identifier: String,
    /// When the record goes stale
    #[serde(rename = "liveToDate", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// Whether the record is still live at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// The full set of submission records, mirrored into a key-value store.
///
/// The set is read once at construction and written back whole after every
/// mutation. Stale records are never purged on their own; they are replaced
/// when the same identifier is submitted again.
pub struct SubmissionCache {
    records: Vec<SubmissionRecord>,
    store: Arc<dyn KeyValueStore>,
    key: String,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl SubmissionCache {
    /// Load the record set stored under `key`.
    ///
    /// A missing value initializes the store with an empty set. Unreadable or
    /// malformed data is discarded and replaced with an empty set.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        ttl: chrono::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut cache = Self {
            records: Vec::new(),
            store,
            key: key.into(),
            ttl,
            clock,
        };

        match cache.store.get(&cache.key) {
            Ok(Some(raw)) => match decode(&raw) {
                Ok(records) => {
                    debug!(key = %cache.key, records = records.len(), "Loaded submission records");
                    cache.records = records;
                }
                Err(e) => {
                    warn!(key = %cache.key, error = %e, "Stored submission records are corrupt, resetting");
                    cache.persist();
                }
            },
            Ok(None) => cache.persist(),
            Err(e) => {
                warn!(key = %cache.key, error = %e, "Failed to read submission records, starting empty");
                cache.persist();
            }
        }

        cache
    }

    /// Whether any record exists for `id`, live or not.
    pub fn has_record(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Whether a record exists for `id` and has not expired yet.
    pub fn is_live(&self, id: &str) -> bool {
        let now = self.clock.now();
        self.find(id).is_some_and(|record| record.is_live_at(now))
    }

    /// Record a successful submission of `id`.
    ///
    /// Appends a fresh record if none exists, replaces a stale one, and does
    /// nothing while the existing record is live. Returns whether the set
    /// changed.
    pub fn record_submission(&mut self, id: &str) -> bool {
        let id = id.trim();
        let now = self.clock.now();
        match self.find(id).map(|record| record.is_live_at(now)) {
            Some(true) => return false,
            Some(false) => self.records.retain(|record| record.identifier != id),
            None => {}
        }

        let expires_at = now.checked_add_signed(self.ttl).unwrap_or_else(|| {
            warn!(email = %id, ttl = %self.ttl, "Record expiry out of range, clamping");
            DateTime::<Utc>::MAX_UTC
        });
        let record = SubmissionRecord {
            identifier: id.to_string(),
            expires_at,
        };
        debug!(email = %id, expires_at = %record.expires_at, "Recording submission");
        self.records.push(record);
        self.persist();
        true
    }

    /// Get all records, in insertion order.
    pub fn records(&self) -> &[SubmissionRecord] {
        &self.records
    }

    /// Get the record for `id`.
    pub fn get(&self, id: &str) -> Option<&SubmissionRecord> {
        self.find(id)
    }

    /// Get the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get the liveness window given to new records.
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    fn find(&self, id: &str) -> Option<&SubmissionRecord> {
        let id = id.trim();
        self.records.iter().find(|record| record.identifier == id)
    }

    fn persist(&self) {
        let result = encode(&self.records).and_then(|raw| self.store.set(&self.key, &raw));
        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Failed to persist submission records");
        }
    }
}

/// Serialize a record set.
pub fn encode(records: &[SubmissionRecord]) -> Result<String> {
    Ok(serde_json::to_string(records)?)
}

/// Deserialize a record set.
pub fn decode(raw: &str) -> Result<Vec<SubmissionRecord>> {
    Ok(serde_json::from_str(raw)?)
}
