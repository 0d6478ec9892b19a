mod collect;
mod history;
mod tickers;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Collect(args) => collect::run(args).await,
        Command::Tickers => tickers::run(),
        Command::History(args) => history::run(args),
    }
}
