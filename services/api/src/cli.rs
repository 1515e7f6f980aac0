use crate::convert::{run_convert, ConvertArgs};
use crate::ingest;
use crate::server;
use clap::{Args, Parser, Subcommand};
use estate_listings::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Estate Listings",
    about = "Serve real-estate listings and ingest CSV property feeds",
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
    /// Watch the staging directory and ingest CSV feeds into the store
    Ingest(IngestArgs),
    /// Print the normalized listings of a CSV feed without touching the store
    Convert(ConvertArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Use a seeded in-memory store instead of PostgreSQL
    #[arg(long)]
    pub(crate) memory_store: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct IngestArgs {
    /// Process the inbox once and exit instead of polling
    #[arg(long)]
    pub(crate) once: bool,
    /// Override the configured staging directory
    #[arg(long)]
    pub(crate) staging_dir: Option<PathBuf>,
    /// Override the configured poll interval in seconds
    #[arg(long)]
    pub(crate) interval_secs: Option<u64>,
    /// Use a seeded in-memory store instead of PostgreSQL
    #[arg(long)]
    pub(crate) memory_store: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Ingest(args) => ingest::run(args).await,
        Command::Convert(args) => run_convert(args),
    }
}
