//! # Kistick Core
//!
//! Collection engine for KIS Open API current-price snapshots.
//!
//! ## Overview
//!
//! This crate implements the interesting part of the collector, which is
//! small but easy to get wrong:
//!
//! - **Token lifecycle** with a durable cache, unconditional reuse on
//!   normal acquisition, and a reissue cooldown that keeps forced
//!   refreshes clear of the API's rate limit on token issuance
//! - **One-shot retry protocol** when a quote request fails in a way
//!   that looks like token invalidity
//! - **Per-ticker fault isolation** so one bad ticker never aborts a
//!   round
//! - **String-preserving normalization** of quote payloads into
//!   [`PriceSnapshot`] records
//! - **Persistence strategy seam** so dry-run and the DuckDB warehouse
//!   share one loop
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`collector`] | The collection loop and its run report |
//! | [`config`] | Startup configuration and the default watchlist |
//! | [`domain`] | Ticker, snapshot, and timestamp value types |
//! | [`error`] | Validation and round-level error types |
//! | [`http_client`] | HTTP abstraction with a `reqwest` implementation |
//! | [`pacing`] | Fixed-interval request spacing |
//! | [`quote`] | Quote endpoint client and payload normalization |
//! | [`store`] | Persistence trait, dry-run strategy, warehouse adapter |
//! | [`token`] | Token cache, store trait, and provider |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use kistick_core::{
//!     Collector, CollectorConfig, FileTokenStore, PriceFetcher, ReqwestHttpClient,
//!     StoreConfig, TokenProvider, Warehouse,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(CollectorConfig::from_env()?);
//!     let http = Arc::new(ReqwestHttpClient::default());
//!     let store = Arc::new(FileTokenStore::new(&config.token_cache_path));
//!
//!     let tokens = TokenProvider::new(
//!         http.clone(),
//!         store,
//!         config.base_url(),
//!         config.credentials.clone(),
//!     );
//!     let fetcher = PriceFetcher::new(http, config.base_url(), config.credentials.clone());
//!     let warehouse = Warehouse::open(StoreConfig::new(&config.db_path))?;
//!
//!     let mut collector = Collector::new(config, tokens, fetcher, Box::new(warehouse));
//!     let report = collector.run_once().await?;
//!     println!("collected {} snapshots", report.collected);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! - Credentials are read from the environment once at startup
//! - `Debug` output redacts the app key, app secret, and bearer tokens
//! - Issuance diagnostics log the endpoint URL and the secret's length,
//!   never its value

pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod pacing;
pub mod quote;
pub mod store;
pub mod token;

// Re-export commonly used types at crate root for convenience

// Collection loop
pub use collector::{Collector, RunReport};

// Configuration
pub use config::{
    default_db_path, default_watchlist, resolve_home_dir, ApiCredentials, CollectorConfig,
    ConfigError, Environment, WatchEntry, DEFAULT_LOOP_INTERVAL, DEFAULT_PACING, PRICE_TR_ID,
};

// Domain models
pub use domain::{PriceSnapshot, Ticker, UtcDateTime};

// Error types
pub use error::{CollectError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Pacing
pub use pacing::RequestPacer;

// Quote fetch
pub use quote::{PriceFetcher, QuoteError};

// Persistence seam
pub use store::{CompanyId, DryRunStore, SnapshotStore, DRY_RUN_COMPANY_ID};

// Token lifecycle
pub use token::{
    CachedToken, FileTokenStore, TokenError, TokenProvider, TokenStore, REISSUE_COOLDOWN,
};

// Warehouse (re-exported from kistick-warehouse)
pub use kistick_warehouse::{
    RunRecord, SnapshotRecord, StoreConfig, StoreError, StoredSnapshot, Warehouse,
};
