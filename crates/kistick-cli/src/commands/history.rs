use kistick_core::{default_db_path, ConfigError, Ticker};
use kistick_warehouse::{StoreConfig, Warehouse};

use crate::cli::HistoryArgs;
use crate::error::CliError;

pub fn run(args: &HistoryArgs) -> Result<(), CliError> {
    let ticker = Ticker::parse(&args.ticker).map_err(ConfigError::from)?;

    let warehouse = Warehouse::open(StoreConfig::new(default_db_path()))?;
    warehouse.ensure_schema()?;
    let rows = warehouse.snapshots_for(ticker.as_str(), args.limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("no stored snapshots for {ticker}");
        return Ok(());
    }

    for row in &rows {
        println!(
            "{}  {}  price={} open={} high={} low={} volume={} prev_close={}",
            row.ticker,
            row.observed_at,
            row.current_price,
            row.open_price,
            row.high_price,
            row.low_price,
            row.cumulative_volume,
            row.previous_close
        );
    }

    Ok(())
}
