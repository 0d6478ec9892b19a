use kistick_core::default_watchlist;

use crate::error::CliError;

pub fn run() -> Result<(), CliError> {
    for entry in default_watchlist()? {
        println!("{}  {}", entry.ticker, entry.display_name);
    }
    Ok(())
}
