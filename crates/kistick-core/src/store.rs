//! Persistence seam for the collection loop.
//!
//! The loop talks to one [`SnapshotStore`] regardless of mode: the real
//! DuckDB warehouse or the log-only [`DryRunStore`]. Dry-run is a
//! strategy chosen once at startup, not a flag checked inside the loop.

use kistick_warehouse::{SnapshotRecord, StoreError, Warehouse};
use tracing::debug;

use crate::collector::RunReport;
use crate::domain::{PriceSnapshot, Ticker};

/// Durable identifier for a company row.
pub type CompanyId = i64;

/// Identifier handed out by [`DryRunStore`] in place of a real row id.
pub const DRY_RUN_COMPANY_ID: CompanyId = 0;

/// Gateway the collection loop persists through.
///
/// `ensure_schema` and `resolve_or_create_company` are idempotent. One
/// run's inserts form a single unit of work bracketed by `begin_run` and
/// `end_run`; a store dropped without `end_run` discards the run.
pub trait SnapshotStore: Send {
    fn ensure_schema(&mut self) -> Result<(), StoreError>;

    fn begin_run(&mut self, run_id: &str) -> Result<(), StoreError>;

    fn resolve_or_create_company(
        &mut self,
        ticker: &Ticker,
        display_name: &str,
    ) -> Result<CompanyId, StoreError>;

    fn insert_snapshot(
        &mut self,
        company_id: CompanyId,
        snapshot: &PriceSnapshot,
    ) -> Result<(), StoreError>;

    fn end_run(&mut self, report: &RunReport) -> Result<(), StoreError>;
}

/// Log-only strategy for dry-run mode. Nothing touches a database; the
/// per-ticker summary lines are the only output of a run.
#[derive(Debug, Default)]
pub struct DryRunStore;

impl DryRunStore {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotStore for DryRunStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        debug!("dry run, skipping schema setup");
        Ok(())
    }

    fn begin_run(&mut self, run_id: &str) -> Result<(), StoreError> {
        debug!(run_id, "dry run, nothing will be persisted");
        Ok(())
    }

    fn resolve_or_create_company(
        &mut self,
        _ticker: &Ticker,
        _display_name: &str,
    ) -> Result<CompanyId, StoreError> {
        Ok(DRY_RUN_COMPANY_ID)
    }

    fn insert_snapshot(
        &mut self,
        _company_id: CompanyId,
        snapshot: &PriceSnapshot,
    ) -> Result<(), StoreError> {
        debug!(ticker = %snapshot.ticker, "dry run, snapshot not persisted");
        Ok(())
    }

    fn end_run(&mut self, _report: &RunReport) -> Result<(), StoreError> {
        Ok(())
    }
}

impl SnapshotStore for Warehouse {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        Warehouse::ensure_schema(self)
    }

    fn begin_run(&mut self, run_id: &str) -> Result<(), StoreError> {
        Warehouse::begin_run(self, run_id)
    }

    fn resolve_or_create_company(
        &mut self,
        ticker: &Ticker,
        display_name: &str,
    ) -> Result<CompanyId, StoreError> {
        Warehouse::resolve_or_create_company(self, ticker.as_str(), display_name)
    }

    fn insert_snapshot(
        &mut self,
        company_id: CompanyId,
        snapshot: &PriceSnapshot,
    ) -> Result<(), StoreError> {
        let record = SnapshotRecord {
            company_id,
            observed_at: snapshot.observed_at_text(),
            current_price: snapshot.current_price.clone(),
            open_price: snapshot.open_price.clone(),
            high_price: snapshot.high_price.clone(),
            low_price: snapshot.low_price.clone(),
            cumulative_volume: snapshot.cumulative_volume.clone(),
            previous_close: snapshot.previous_close.clone(),
        };

        Warehouse::insert_snapshot(self, &record)
    }

    fn end_run(&mut self, report: &RunReport) -> Result<(), StoreError> {
        Warehouse::end_run(self, report.collected as u64, report.failed as u64)
    }
}
