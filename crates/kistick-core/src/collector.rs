//! The collection loop: one round over the watchlist with per-ticker
//! fault isolation and a one-shot forced token refresh when the API
//! rejects the bearer token mid-round.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{CollectorConfig, WatchEntry};
use crate::domain::PriceSnapshot;
use crate::error::CollectError;
use crate::pacing::RequestPacer;
use crate::quote::PriceFetcher;
use crate::store::SnapshotStore;
use crate::token::TokenProvider;

/// Outcome of one collection round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: String,
    pub collected: usize,
    pub failed: usize,
}

/// Drives one round at a time: token, then every watchlist ticker in
/// order, then commit. Strictly sequential; the pacer spaces the quote
/// requests.
pub struct Collector {
    config: Arc<CollectorConfig>,
    tokens: TokenProvider,
    fetcher: PriceFetcher,
    store: Box<dyn SnapshotStore>,
    pacer: RequestPacer,
}

impl Collector {
    pub fn new(
        config: Arc<CollectorConfig>,
        tokens: TokenProvider,
        fetcher: PriceFetcher,
        store: Box<dyn SnapshotStore>,
    ) -> Self {
        let pacer = RequestPacer::new(config.pacing);

        Self {
            config,
            tokens,
            fetcher,
            store,
            pacer,
        }
    }

    /// Collect one snapshot per watchlist entry.
    ///
    /// Failing to acquire a token before the first fetch aborts the
    /// round, since no ticker could succeed without one. Every later
    /// failure is isolated to its ticker: logged, counted, and skipped.
    /// The round's inserts commit together in `end_run`.
    pub async fn run_once(&mut self) -> Result<RunReport, CollectError> {
        let mut token = match self.tokens.get_token(false).await {
            Ok(token) => token,
            Err(error) => {
                error!(%error, "token acquisition failed, aborting collection round");
                return Err(error.into());
            }
        };

        let run_id = Uuid::new_v4().to_string();
        let config = Arc::clone(&self.config);

        self.store.begin_run(&run_id)?;
        info!(run_id = %run_id, tickers = config.watchlist.len(), "collection round started");

        let mut collected = 0usize;
        let mut failed = 0usize;

        for entry in &config.watchlist {
            self.pacer.pause().await;

            match self.collect_entry(&mut token, entry).await {
                Ok(snapshot) => {
                    info!(
                        ticker = %entry.ticker,
                        name = %entry.display_name,
                        "{}",
                        snapshot.summary()
                    );
                    collected += 1;
                }
                Err(error) => {
                    error!(
                        ticker = %entry.ticker,
                        name = %entry.display_name,
                        %error,
                        "ticker collection failed"
                    );
                    failed += 1;
                }
            }
        }

        let report = RunReport {
            run_id,
            collected,
            failed,
        };
        self.store.end_run(&report)?;
        info!(collected, failed, "collection round finished");

        Ok(report)
    }

    /// Fetch and persist one ticker.
    ///
    /// A rejection that looks like token invalidity earns one forced
    /// refresh and one retried fetch. The refresh may well return the
    /// cached token unchanged when it is inside the reissue cooldown;
    /// that is deliberate, the retry then decides whether the first
    /// failure was transient.
    async fn collect_entry(
        &mut self,
        token: &mut String,
        entry: &WatchEntry,
    ) -> Result<PriceSnapshot, CollectError> {
        let snapshot = match self.fetcher.fetch_snapshot(&entry.ticker, token).await {
            Ok(snapshot) => snapshot,
            Err(error) if error.is_token_rejection() => {
                warn!(
                    ticker = %entry.ticker,
                    %error,
                    "quote rejected, token looks invalid, forcing a refresh"
                );
                *token = self.tokens.get_token(true).await?;
                self.fetcher.fetch_snapshot(&entry.ticker, token).await?
            }
            Err(error) => return Err(error.into()),
        };

        let company_id = self
            .store
            .resolve_or_create_company(&entry.ticker, &entry.display_name)?;
        self.store.insert_snapshot(company_id, &snapshot)?;

        Ok(snapshot)
    }
}
