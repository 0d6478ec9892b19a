//! CLI argument definitions for kistick.
//!
//! This module contains the command-line interface structure using Clap.
//! The CLI covers three workflows: running collection rounds against the
//! KIS Open API, inspecting the configured watchlist, and reading stored
//! snapshots back out of the warehouse.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `collect` | Run a collection round over the watchlist (repeatable with `--watch`) |
//! | `tickers` | Print the configured watchlist |
//! | `history` | Print recent stored snapshots for one ticker |
//!
//! # Environment
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `KIS_APP_KEY` / `KIS_APP_SECRET` | required | KIS Open API credentials |
//! | `KIS_ENV` | `real` | `real`, `sandbox`, or `vts` |
//! | `DRY_RUN` | `false` | `true` logs snapshots without persisting |
//! | `KISTICK_HOME` | `~/.kistick` | Token cache and database directory |
//!
//! # Examples
//!
//! ```bash
//! # One collection round, persisted to the warehouse
//! kistick collect
//!
//! # Keep collecting every 60 seconds
//! kistick collect --watch
//!
//! # Three log-only rounds against the sandbox host
//! KIS_ENV=vts kistick collect --dry-run --watch --max-rounds 3
//!
//! # Ten most recent stored rows for Samsung Electronics
//! kistick history 005930 --limit 10
//! ```

use clap::{Args, Parser, Subcommand};

/// 📡 kistick - KIS market snapshot collector
///
/// Polls the Korea Investment & Securities Open API for current-price
/// snapshots of a fixed KOSPI watchlist and stores them in a local
/// DuckDB warehouse.
#[derive(Debug, Parser)]
#[command(
    name = "kistick",
    author,
    version,
    about = "KIS market snapshot collector",
    long_about = "kistick polls the Korea Investment & Securities Open API for current-price \
snapshots of a fixed KOSPI watchlist. Features include:\n\
\n\
  • Cached OAuth token reuse with rate-limit-aware reissuance\n\
  • Per-ticker fault isolation (one bad ticker never stops a round)\n\
  • Exact-text price storage in a local DuckDB warehouse\n\
  • Dry-run mode that logs snapshots without persisting\n\
\n\
Use 'kistick <command> --help' for command-specific help."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// 📈 Run a collection round over the configured watchlist.
    ///
    /// Acquires an access token, fetches one current-price snapshot per
    /// watchlist ticker, and commits the batch in a single transaction.
    /// Individual ticker failures are logged and counted without
    /// aborting the round.
    ///
    /// # Examples
    ///
    ///   kistick collect
    ///   kistick collect --dry-run
    ///   kistick collect --watch --interval-secs 30
    Collect(CollectArgs),

    /// 📋 Print the configured watchlist in collection order.
    ///
    /// # Examples
    ///
    ///   kistick tickers
    Tickers,

    /// 🗄️ Print recent stored snapshots for one ticker.
    ///
    /// Reads from the local warehouse only; no network access and no
    /// credentials required.
    ///
    /// # Examples
    ///
    ///   kistick history 005930
    ///   kistick history 000660 --limit 5 --json
    History(HistoryArgs),
}

/// Arguments for the `collect` command.
#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Log snapshots without touching the database.
    ///
    /// Equivalent to setting DRY_RUN=true in the environment.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Keep collecting on a fixed interval instead of exiting after one
    /// round.
    #[arg(long, default_value_t = false)]
    pub watch: bool,

    /// Seconds to wait between rounds in watch mode (default: 60).
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Stop after this many rounds (watch mode only; default: unbounded).
    #[arg(long)]
    pub max_rounds: Option<u64>,
}

/// Arguments for the `history` command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Six-digit KRX ticker (e.g. 005930).
    pub ticker: String,

    /// Maximum number of rows to print, newest first.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Emit rows as pretty-printed JSON instead of plain text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
