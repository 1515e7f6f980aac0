mod cli;
mod convert;
mod infra;
mod ingest;
mod routes;
mod server;

use estate_listings::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
