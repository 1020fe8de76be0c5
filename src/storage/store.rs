//! Durable route store backed by a single SQLite file

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, info};

use super::route::{Route, Routes};
use super::BUCKET_NAME;
use crate::{AcacheError, Result};

const BUCKET_EXISTS: &str = "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";
const CREATE_BUCKET: &str = "CREATE TABLE acache (key TEXT PRIMARY KEY NOT NULL, value BLOB NOT NULL)";
const DROP_BUCKET: &str = "DROP TABLE acache";
const PUT_ROUTE: &str = "INSERT INTO acache (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";
const SELECT_ROUTES: &str = "SELECT key, value FROM acache ORDER BY key";

/// Transactional key-value store of routes
///
/// Every read runs in one deferred transaction and every write in one
/// immediate transaction, so SQLite's file lock gives single-writer,
/// multi-reader semantics across processes.
pub struct RouteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl RouteStore {
    /// Open or create the store file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or opened
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        debug!("Opened route store: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory store
    ///
    /// # Errors
    ///
    /// Returns error if SQLite cannot allocate the database
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        })
    }

    /// Backing file, `None` for in-memory stores
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the bucket
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the bucket is already present
    pub fn init_bucket(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if bucket_exists(&tx)? {
            return Err(AcacheError::AlreadyExists(BUCKET_NAME.to_string()));
        }

        tx.execute_batch(CREATE_BUCKET)?;
        tx.commit()?;

        info!("Created bucket '{}'", BUCKET_NAME);
        Ok(())
    }

    /// Create the bucket unless it already exists
    ///
    /// Returns `true` if the bucket was created by this call.
    ///
    /// # Errors
    ///
    /// Returns error for any failure other than `AlreadyExists`
    pub fn ensure_bucket(&self) -> Result<bool> {
        match self.init_bucket() {
            Ok(()) => Ok(true),
            Err(AcacheError::AlreadyExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Write `route` under its key, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns `NoBucket` if the bucket has not been created, or
    /// `InvalidRoute` if the key or alias is empty
    pub fn put(&self, route: &Route) -> Result<()> {
        route.validate()?;
        let value = route.to_bytes()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !bucket_exists(&tx)? {
            return Err(AcacheError::NoBucket(BUCKET_NAME.to_string()));
        }

        tx.execute(PUT_ROUTE, params![route.id, value])?;
        tx.commit()?;

        debug!("Stored route '{}' under key {}", route.alias, route.id);
        Ok(())
    }

    /// Load every route in key order
    ///
    /// # Errors
    ///
    /// Returns `NoBucket` if the bucket is missing, or `Decode` if any entry
    /// is corrupt; no partial snapshot is returned
    pub fn get_all(&self) -> Result<Routes> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        if !bucket_exists(&tx)? {
            return Err(AcacheError::NoBucket(BUCKET_NAME.to_string()));
        }

        let rows = {
            let mut stmt = tx.prepare(SELECT_ROUTES)?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;
            let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            collected
        };
        tx.commit()?;

        let routes = rows
            .iter()
            .map(|(key, value)| Route::from_bytes(key, value))
            .collect::<Result<Vec<_>>>()?;

        Ok(Routes::new(routes))
    }

    /// True if a stored route was captured from exactly `url`
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be loaded
    pub fn contains_url(&self, url: &str) -> Result<bool> {
        Ok(self.get_all()?.contains_url(url))
    }

    /// Delete the bucket and every route in it
    ///
    /// The bucket is not recreated; run `init_bucket` before the next `put`.
    ///
    /// # Errors
    ///
    /// Returns `NoBucket` if there is nothing to delete
    pub fn clear(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !bucket_exists(&tx)? {
            return Err(AcacheError::NoBucket(BUCKET_NAME.to_string()));
        }

        tx.execute_batch(DROP_BUCKET)?;
        tx.commit()?;

        info!("Deleted bucket '{}'", BUCKET_NAME);
        Ok(())
    }

    /// Close the store, flushing SQLite state
    ///
    /// # Errors
    ///
    /// Returns error if SQLite fails to close cleanly
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| AcacheError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| AcacheError::Storage(e))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AcacheError::LockPoisoned)
    }
}

fn bucket_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(BUCKET_EXISTS, [BUCKET_NAME], |row| row.get(0))?;
    Ok(count > 0)
}
