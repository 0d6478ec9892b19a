//! # Kistick Warehouse
//!
//! DuckDB-based storage for collected price snapshots.
//!
//! ## Overview
//!
//! This crate owns the embedded database behind the collector: company
//! master data, one row per price snapshot, and an audit trail of
//! collection runs.
//!
//! ### Features
//!
//! - 🔒 **Secure SQL**: Parameterized queries prevent SQL injection
//! - 📝 **Exact text**: Quantity columns store the upstream decimal text
//!   unchanged, no float round-trip
//! - 🔄 **Idempotent schema**: Versioned migrations, safe to re-apply
//! - 📦 **Run-scoped transactions**: One commit per collection round
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kistick_warehouse::{SnapshotRecord, StoreConfig, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut warehouse = Warehouse::open(StoreConfig::new("kistick.duckdb"))?;
//!     warehouse.ensure_schema()?;
//!
//!     warehouse.begin_run("run-001")?;
//!     let company_id = warehouse.resolve_or_create_company("005930", "삼성전자")?;
//!     warehouse.insert_snapshot(&SnapshotRecord {
//!         company_id,
//!         observed_at: "2024-01-01 09:30:00".to_string(),
//!         current_price: "71000".to_string(),
//!         open_price: "70500".to_string(),
//!         high_price: "71500".to_string(),
//!         low_price: "70300".to_string(),
//!         cumulative_volume: "1234567".to_string(),
//!         previous_close: "70900".to_string(),
//!     })?;
//!     warehouse.end_run(1, 0)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `companies` | Ticker to company id master data |
//! | `stocks` | One row per price snapshot |
//! | `collection_runs` | Audit trail, one row per committed run |
//! | `schema_migrations` | Applied migration versions |

pub mod migrations;

use std::fs;
use std::path::PathBuf;

use ::duckdb::Connection;
use ::duckdb::ToSql;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A company row vanished between insert and lookup.
    #[error("company row for ticker {ticker} could not be resolved")]
    CompanyResolution { ticker: String },

    /// `end_run` was called without a matching `begin_run`.
    #[error("no collection run is active")]
    RunNotStarted,
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

/// One snapshot row ready for insertion.
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    /// Resolved company row id.
    pub company_id: i64,
    /// Observation timestamp as `YYYY-MM-DD HH:MM:SS` text.
    pub observed_at: String,
    /// Quantity fields carry the exact upstream decimal text.
    pub current_price: String,
    pub open_price: String,
    pub high_price: String,
    pub low_price: String,
    pub cumulative_volume: String,
    pub previous_close: String,
}

/// One stored snapshot as read back from the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredSnapshot {
    pub ticker: String,
    pub observed_at: String,
    pub current_price: String,
    pub open_price: String,
    pub high_price: String,
    pub low_price: String,
    pub cumulative_volume: String,
    pub previous_close: String,
}

/// One committed collection run from the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub collected: i64,
    pub failed: i64,
}

#[derive(Debug)]
struct ActiveRun {
    run_id: String,
    started_at: String,
}

/// The snapshot warehouse.
///
/// Owns a single connection for its whole lifetime, matching the
/// collector's resource model: open once, run, release on drop. An open
/// run's writes become visible only after [`Warehouse::end_run`]; a
/// warehouse dropped mid-run discards the uncommitted work.
pub struct Warehouse {
    connection: Connection,
    active_run: Option<ActiveRun>,
}

impl Warehouse {
    /// Open (creating the parent directory and database file if needed).
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let connection = Connection::open(&config.db_path)?;

        Ok(Self {
            connection,
            active_run: None,
        })
    }

    /// Apply pending migrations. Idempotent.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        migrations::apply_migrations(&self.connection)?;
        Ok(())
    }

    /// Open the run's transaction. All writes until [`Warehouse::end_run`]
    /// commit or roll back together.
    pub fn begin_run(&mut self, run_id: &str) -> Result<(), StoreError> {
        self.connection.execute_batch("BEGIN TRANSACTION")?;

        // Rendered without a zone offset so the audit insert can cast it
        // straight back to TIMESTAMP.
        let started_at: String = self.connection.query_row(
            "SELECT strftime(CURRENT_TIMESTAMP, '%Y-%m-%d %H:%M:%S')",
            [],
            |row| row.get(0),
        )?;

        self.active_run = Some(ActiveRun {
            run_id: run_id.to_owned(),
            started_at,
        });

        Ok(())
    }

    /// Write the audit row and commit the run.
    pub fn end_run(&mut self, collected: u64, failed: u64) -> Result<(), StoreError> {
        let Some(run) = self.active_run.take() else {
            return Err(StoreError::RunNotStarted);
        };

        let result = (|| -> Result<(), StoreError> {
            let params: [&dyn ToSql; 4] = [&run.run_id, &run.started_at, &collected, &failed];
            self.connection.execute(
                "INSERT INTO collection_runs \
                 (run_id, started_at, finished_at, collected, failed) \
                 VALUES (?, TRY_CAST(? AS TIMESTAMP), CURRENT_TIMESTAMP, ?, ?)",
                params.as_slice(),
            )?;
            Ok(())
        })();

        finalize_transaction(&self.connection, result)
    }

    /// Look up a ticker's company id, creating the row on first sighting.
    /// Returns the same id on every subsequent call.
    pub fn resolve_or_create_company(&self, ticker: &str, name: &str) -> Result<i64, StoreError> {
        if let Some(id) = self.company_id(ticker)? {
            return Ok(id);
        }

        let params: [&dyn ToSql; 2] = [&ticker, &name];
        self.connection.execute(
            "INSERT OR IGNORE INTO companies (ticker, name) VALUES (?, ?)",
            params.as_slice(),
        )?;

        match self.company_id(ticker)? {
            Some(id) => Ok(id),
            None => Err(StoreError::CompanyResolution {
                ticker: ticker.to_owned(),
            }),
        }
    }

    /// The company id for `ticker`, if the row exists.
    pub fn company_id(&self, ticker: &str) -> Result<Option<i64>, StoreError> {
        let params: [&dyn ToSql; 1] = [&ticker];
        match self.connection.query_row(
            "SELECT id FROM companies WHERE ticker = ?",
            params.as_slice(),
            |row| row.get(0),
        ) {
            Ok(id) => Ok(Some(id)),
            Err(::duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Insert one snapshot row. A repeat observation for the same
    /// company and timestamp replaces the earlier row.
    pub fn insert_snapshot(&self, record: &SnapshotRecord) -> Result<(), StoreError> {
        let params: [&dyn ToSql; 8] = [
            &record.company_id,
            &record.observed_at,
            &record.current_price,
            &record.open_price,
            &record.high_price,
            &record.low_price,
            &record.cumulative_volume,
            &record.previous_close,
        ];
        self.connection.execute(
            "INSERT OR REPLACE INTO stocks \
             (company_id, observed_at, current_price, open_price, high_price, \
              low_price, cumulative_volume, previous_close, inserted_at) \
             VALUES (?, TRY_CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;

        Ok(())
    }

    /// Most recent snapshots for one ticker, newest first.
    pub fn snapshots_for(
        &self,
        ticker: &str,
        limit: usize,
    ) -> Result<Vec<StoredSnapshot>, StoreError> {
        let mut statement = self.connection.prepare(
            "SELECT c.ticker, CAST(s.observed_at AS VARCHAR), s.current_price, \
                    s.open_price, s.high_price, s.low_price, s.cumulative_volume, \
                    s.previous_close \
             FROM stocks s \
             JOIN companies c ON c.id = s.company_id \
             WHERE c.ticker = ? \
             ORDER BY s.observed_at DESC \
             LIMIT ?",
        )?;

        let limit = limit as i64;
        let params: [&dyn ToSql; 2] = [&ticker, &limit];
        let rows = statement.query_map(params.as_slice(), |row| {
            Ok(StoredSnapshot {
                ticker: row.get(0)?,
                observed_at: row.get(1)?,
                current_price: row.get(2)?,
                open_price: row.get(3)?,
                high_price: row.get(4)?,
                low_price: row.get(5)?,
                cumulative_volume: row.get(6)?,
                previous_close: row.get(7)?,
            })
        })?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }

        Ok(snapshots)
    }

    /// Most recent committed runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let mut statement = self.connection.prepare(
            "SELECT run_id, CAST(started_at AS VARCHAR), CAST(finished_at AS VARCHAR), \
                    collected, failed \
             FROM collection_runs \
             ORDER BY finished_at DESC \
             LIMIT ?",
        )?;

        let limit = limit as i64;
        let params: [&dyn ToSql; 1] = [&limit];
        let rows = statement.query_map(params.as_slice(), |row| {
            Ok(RunRecord {
                run_id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                collected: row.get(3)?,
                failed: row.get(4)?,
            })
        })?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }

        Ok(runs)
    }

    /// Total stored snapshot rows.
    pub fn snapshot_count(&self) -> Result<i64, StoreError> {
        let count = self
            .connection
            .query_row("SELECT COUNT(*) FROM stocks", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(company_id: i64, observed_at: &str, price: &str) -> SnapshotRecord {
        SnapshotRecord {
            company_id,
            observed_at: observed_at.to_owned(),
            current_price: price.to_owned(),
            open_price: "70500".to_owned(),
            high_price: "71500".to_owned(),
            low_price: "70300".to_owned(),
            cumulative_volume: "1234567".to_owned(),
            previous_close: "70900".to_owned(),
        }
    }

    #[test]
    fn full_run_round_trips_exact_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut warehouse =
            Warehouse::open(StoreConfig::new(dir.path().join("w.duckdb"))).expect("open");
        warehouse.ensure_schema().expect("schema");

        warehouse.begin_run("run-1").expect("begin");
        let id = warehouse
            .resolve_or_create_company("005930", "삼성전자")
            .expect("resolve");
        warehouse
            .insert_snapshot(&record(id, "2024-01-01 09:30:00", "71000"))
            .expect("insert");
        warehouse.end_run(1, 0).expect("end");

        let rows = warehouse.snapshots_for("005930", 10).expect("read back");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticker, "005930");
        assert_eq!(rows[0].current_price, "71000");
        assert_eq!(rows[0].cumulative_volume, "1234567");
        assert!(rows[0].observed_at.starts_with("2024-01-01 09:30:00"));
    }

    #[test]
    fn company_resolution_is_stable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let warehouse =
            Warehouse::open(StoreConfig::new(dir.path().join("w.duckdb"))).expect("open");
        warehouse.ensure_schema().expect("schema");

        let first = warehouse
            .resolve_or_create_company("005930", "삼성전자")
            .expect("create");
        let second = warehouse
            .resolve_or_create_company("005930", "삼성전자")
            .expect("look up");
        let other = warehouse
            .resolve_or_create_company("000660", "SK하이닉스")
            .expect("create another");

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn repeat_observation_replaces_the_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut warehouse =
            Warehouse::open(StoreConfig::new(dir.path().join("w.duckdb"))).expect("open");
        warehouse.ensure_schema().expect("schema");

        warehouse.begin_run("run-1").expect("begin");
        let id = warehouse
            .resolve_or_create_company("005930", "삼성전자")
            .expect("resolve");
        warehouse
            .insert_snapshot(&record(id, "2024-01-01 09:30:00", "71000"))
            .expect("insert");
        warehouse
            .insert_snapshot(&record(id, "2024-01-01 09:30:00", "71100"))
            .expect("replace");
        warehouse.end_run(1, 0).expect("end");

        let rows = warehouse.snapshots_for("005930", 10).expect("read back");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].current_price, "71100");
    }

    #[test]
    fn uncommitted_run_is_discarded_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("w.duckdb");

        {
            let mut warehouse = Warehouse::open(StoreConfig::new(&path)).expect("open");
            warehouse.ensure_schema().expect("schema");
            warehouse.begin_run("run-1").expect("begin");
            let id = warehouse
                .resolve_or_create_company("005930", "삼성전자")
                .expect("resolve");
            warehouse
                .insert_snapshot(&record(id, "2024-01-01 09:30:00", "71000"))
                .expect("insert");
            // dropped without end_run
        }

        let warehouse = Warehouse::open(StoreConfig::new(&path)).expect("reopen");
        assert_eq!(warehouse.snapshot_count().expect("count"), 0);
        assert_eq!(warehouse.company_id("005930").expect("look up"), None);
    }

    #[test]
    fn committed_run_lands_in_the_audit_trail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut warehouse =
            Warehouse::open(StoreConfig::new(dir.path().join("w.duckdb"))).expect("open");
        warehouse.ensure_schema().expect("schema");

        warehouse.begin_run("run-1").expect("begin");
        warehouse.end_run(18, 2).expect("end");

        let runs = warehouse.recent_runs(5).expect("read back");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "run-1");
        assert_eq!(runs[0].collected, 18);
        assert_eq!(runs[0].failed, 2);
        assert!(runs[0].started_at.is_some());
    }

    #[test]
    fn end_run_without_begin_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut warehouse =
            Warehouse::open(StoreConfig::new(dir.path().join("w.duckdb"))).expect("open");
        warehouse.ensure_schema().expect("schema");

        let err = warehouse.end_run(0, 0).expect_err("must fail");
        assert!(matches!(err, StoreError::RunNotStarted));
    }
}
