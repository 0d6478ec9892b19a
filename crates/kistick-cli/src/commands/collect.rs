use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use kistick_core::{
    Collector, CollectorConfig, DryRunStore, FileTokenStore, PriceFetcher, ReqwestHttpClient,
    SnapshotStore, TokenProvider,
};
use kistick_warehouse::{StoreConfig, Warehouse};

use crate::cli::CollectArgs;
use crate::error::CliError;

pub async fn run(args: &CollectArgs) -> Result<(), CliError> {
    let mut config = CollectorConfig::from_env()?;
    if args.dry_run {
        config.dry_run = true;
    }
    if let Some(secs) = args.interval_secs {
        config.loop_interval = Duration::from_secs(secs);
    }
    let config = Arc::new(config);

    let http: Arc<ReqwestHttpClient> = Arc::new(ReqwestHttpClient::default());
    let tokens = TokenProvider::new(
        http.clone(),
        Arc::new(FileTokenStore::new(&config.token_cache_path)),
        config.base_url(),
        config.credentials.clone(),
    );
    let fetcher = PriceFetcher::new(http, config.base_url(), config.credentials.clone());

    let mut store: Box<dyn SnapshotStore> = if config.dry_run {
        info!("dry run enabled, snapshots will be logged but not persisted");
        Box::new(DryRunStore::new())
    } else {
        Box::new(Warehouse::open(StoreConfig::new(&config.db_path))?)
    };
    store.ensure_schema()?;

    let mut collector = Collector::new(Arc::clone(&config), tokens, fetcher, store);

    if !args.watch {
        collector.run_once().await?;
        return Ok(());
    }

    info!(
        interval_secs = config.loop_interval.as_secs(),
        max_rounds = args.max_rounds,
        "watch mode enabled"
    );

    let mut round: u64 = 0;
    loop {
        round += 1;
        if let Err(round_error) = collector.run_once().await {
            // The next round gets a fresh chance; a transient token or
            // commit failure should not take the watcher down.
            error!(round, error = %round_error, "collection round aborted");
        }

        if args.max_rounds.is_some_and(|max| round >= max) {
            info!(rounds = round, "reached the round limit, stopping");
            return Ok(());
        }

        sleep(config.loop_interval).await;
    }
}
