//! Durable per-device daily request counters.
//!
//! One SQLite row per device: `(device_id, request_count, last_request_date)`.
//! The check-and-increment is a single conditional upsert, so the three
//! outcomes (first request, same-day request, new-day reset) and the
//! over-limit refusal are decided atomically by the database.
//!
//! # Example
//!
//! ```rust
//! use chatgate::quota::QuotaStore;
//! use chrono::NaiveDate;
//!
//! let store = QuotaStore::open_in_memory(10).unwrap();
//! let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
//! assert!(store.check_and_increment("abc", today).unwrap());
//! assert_eq!(store.usage("abc").unwrap().unwrap().request_count, 1);
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ChatError, Result};

/// Requests a device may make per UTC day unless configured otherwise.
pub const DEFAULT_DAILY_LIMIT: u32 = 10;

/// How long a writer waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of one device's counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceUsage {
    pub device_id: String,
    /// Requests counted on `last_request_date`.
    pub request_count: u32,
    pub last_request_date: NaiveDate,
}

/// SQLite-backed quota table.
pub struct QuotaStore {
    conn: Mutex<Connection>,
    daily_limit: u32,
}

impl QuotaStore {
    /// Open (or create) the quota database at `path`.
    ///
    /// Creates the parent directory and the `device_quota` table if missing.
    pub fn open(path: &Path, daily_limit: u32) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            ChatError::Storage(format!(
                "failed to open quota store at {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), daily_limit, "Opened quota store");
        Self::with_connection(conn, daily_limit)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory(daily_limit: u32) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, daily_limit)
    }

    /// Default database location: `~/.chatgate/quota.db`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chatgate")
            .join("quota.db")
    }

    fn with_connection(conn: Connection, daily_limit: u32) -> Result<Self> {
        // `chatgate quota reset` may hold the file lock while the server writes.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS device_quota (
                device_id         TEXT PRIMARY KEY,
                request_count     INTEGER NOT NULL,
                last_request_date TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            daily_limit,
        })
    }

    /// The configured per-device daily limit.
    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Count one request for `device_id` on `today`, unless the limit is hit.
    ///
    /// Returns `true` when the request is allowed (and counted), `false` when
    /// the device already made `daily_limit` requests today. A refused request
    /// leaves the row untouched.
    pub fn check_and_increment(&self, device_id: &str, today: NaiveDate) -> Result<bool> {
        let conn = self.lock();
        // DO UPDATE ... WHERE false leaves the row alone and reports 0 changes.
        let changed = conn.execute(
            "
            INSERT INTO device_quota (device_id, request_count, last_request_date)
            VALUES (?1, 1, ?2)
            ON CONFLICT(device_id) DO UPDATE SET
                request_count = CASE
                    WHEN device_quota.last_request_date = excluded.last_request_date
                        THEN device_quota.request_count + 1
                    ELSE 1
                END,
                last_request_date = excluded.last_request_date
            WHERE device_quota.last_request_date <> excluded.last_request_date
               OR device_quota.request_count < ?3
            ",
            params![device_id, today, self.daily_limit],
        )?;
        let allowed = changed > 0;
        debug!(device_id, %today, allowed, "Quota check");
        Ok(allowed)
    }

    /// Current counter for one device, if it ever made a request.
    pub fn usage(&self, device_id: &str) -> Result<Option<DeviceUsage>> {
        let conn = self.lock();
        let usage = conn
            .query_row(
                "SELECT device_id, request_count, last_request_date
                 FROM device_quota WHERE device_id = ?1",
                params![device_id],
                row_to_usage,
            )
            .optional()?;
        Ok(usage)
    }

    /// All counters, ordered by device id.
    pub fn snapshot(&self) -> Result<Vec<DeviceUsage>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT device_id, request_count, last_request_date
             FROM device_quota ORDER BY device_id",
        )?;
        let rows = stmt
            .query_map([], row_to_usage)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Forget one device. Returns whether a row was removed.
    pub fn reset_device(&self, device_id: &str) -> Result<bool> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM device_quota WHERE device_id = ?1",
            params![device_id],
        )?;
        Ok(removed > 0)
    }

    /// Forget every device. Returns the number of rows removed.
    pub fn reset_all(&self) -> Result<usize> {
        let conn = self.lock();
        Ok(conn.execute("DELETE FROM device_quota", [])?)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the guard cannot leave SQLite half-written.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for QuotaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaStore")
            .field("daily_limit", &self.daily_limit)
            .finish()
    }
}

fn row_to_usage(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceUsage> {
    Ok(DeviceUsage {
        device_id: row.get(0)?,
        request_count: row.get(1)?,
        last_request_date: row.get(2)?,
    })
}
