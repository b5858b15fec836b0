use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use crew_match::error::AppError;

use crate::server;

#[derive(Parser, Debug)]
#[command(
    name = "Crew Match Service",
    about = "Run the crew registration and voyage matching service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one proactive matching batch and print the summary
    MatchBatch(MatchBatchArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct MatchBatchArgs {
    /// Override the configured number of parallel leg workers
    #[arg(long)]
    pub(crate) workers: Option<usize>,
    /// Run the batch as of this RFC 3339 timestamp instead of now
    #[arg(long, value_name = "TIMESTAMP")]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::MatchBatch(args) => server::run_match_batch(args).await,
    }
}
