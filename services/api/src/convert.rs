use clap::Args;
use estate_listings::config::AppConfig;
use estate_listings::error::AppError;
use estate_listings::ingest::normalize_feed;
use serde_json::json;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ConvertArgs {
    /// CSV feed to normalize
    pub(crate) path: PathBuf,
}

/// Maps a feed with the configured rates and prints the drafts as JSON.
pub(crate) fn run_convert(args: ConvertArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let reader = BufReader::new(File::open(&args.path)?);
    let feed = normalize_feed(reader, &config.ingest.rates)?;

    let rendered = serde_json::to_string_pretty(&json!({
        "file": args.path.display().to_string(),
        "listings": feed.drafts,
        "skipped": feed.skipped,
    }))
    .map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
