//! SQLite adapter: Implementation of Exporter backed by a database table.
//!
//! The database alternative to the HTTP collector. Each record is inserted
//! once into `records`, keyed by its unique identifier, so a duplicate
//! submission of the same record is refused rather than stored twice.
//!
//! The flat export payload is kept verbatim next to the indexed columns.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::domain::{RiskTier, ScoringRecord};
use crate::ports::{DeliveryError, Exporter};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// A record as read back from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub unique_identifier: String,
    pub mrn: u64,
    pub timestamp: String,
    pub pred_proba: f64,
    pub risk_tier: RiskTier,
    pub payload: serde_json::Value,
}

/// SQLite export target.
pub struct SqliteExporter {
    conn: Mutex<Connection>,
}

impl SqliteExporter {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let exporter = Self {
            conn: Mutex::new(conn),
        };
        exporter.init_schema()?;
        Ok(exporter)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let exporter = Self {
            conn: Mutex::new(conn),
        };
        exporter.init_schema()?;
        Ok(exporter)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS records (
                unique_identifier TEXT PRIMARY KEY,
                mrn INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                pred_proba REAL NOT NULL,
                risk_tier TEXT NOT NULL,
                payload TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_mrn
                ON records(mrn);
            ",
        )?;

        Ok(())
    }

    /// Insert one record.
    ///
    /// # Errors
    /// Returns error if the record cannot be serialized or inserted.
    pub fn insert(&self, record: &ScoringRecord) -> Result<(), StorageError> {
        let payload = record
            .to_payload()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

        conn.execute(
            r"
            INSERT INTO records (
                unique_identifier, mrn, timestamp, pred_proba, risk_tier, payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                record.unique_identifier(),
                record.mrn() as i64,
                record.timestamp(),
                record.pred_proba(),
                record.risk_tier().as_str(),
                payload.to_string(),
            ],
        )?;

        tracing::debug!("Stored record {}", record.unique_identifier());
        Ok(())
    }

    /// Look up a record by its unique identifier.
    ///
    /// # Errors
    /// Returns error if the query fails or a stored row is malformed.
    pub fn find(&self, unique_identifier: &str) -> Result<Option<StoredRecord>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

        let row = conn
            .query_row(
                r"
                SELECT unique_identifier, mrn, timestamp, pred_proba, risk_tier, payload
                FROM records
                WHERE unique_identifier = ?1
                ",
                params![unique_identifier],
                Self::read_row,
            )
            .optional()?;

        row.map(Self::decode).transpose()
    }

    /// Most recent records, newest first.
    ///
    /// # Errors
    /// Returns error if the query fails or a stored row is malformed.
    pub fn load_recent(&self, limit: usize) -> Result<Vec<StoredRecord>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

        let mut stmt = conn.prepare(
            r"
            SELECT unique_identifier, mrn, timestamp, pred_proba, risk_tier, payload
            FROM records
            ORDER BY timestamp DESC
            LIMIT ?1
            ",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::decode).collect()
    }

    /// Total number of stored records.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[allow(clippy::type_complexity)]
    fn read_row(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(String, i64, String, f64, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn decode(
        (unique_identifier, mrn, timestamp, pred_proba, tier, payload): (
            String,
            i64,
            String,
            f64,
            String,
            String,
        ),
    ) -> Result<StoredRecord, StorageError> {
        let risk_tier = RiskTier::parse(&tier)
            .ok_or_else(|| StorageError::Serialization(format!("unknown risk tier {tier:?}")))?;
        let payload = serde_json::from_str(&payload)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(StoredRecord {
            unique_identifier,
            mrn: mrn as u64,
            timestamp,
            pred_proba,
            risk_tier,
            payload,
        })
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl Exporter for SqliteExporter {
    fn target(&self) -> &str {
        "sqlite"
    }

    fn deliver(&self, record: &ScoringRecord) -> Result<(), DeliveryError> {
        match self.insert(record) {
            Ok(()) => Ok(()),
            Err(StorageError::Database(e)) if is_constraint_violation(&e) => Err(
                DeliveryError::Rejected(format!("duplicate record {}", record.unique_identifier())),
            ),
            Err(e) => Err(DeliveryError::Storage(e.to_string())),
        }
    }
}
