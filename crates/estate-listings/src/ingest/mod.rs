//! CSV feed ingestion: inbox polling, row mapping, per-file batch commits, and file routing.
//!
//! Each file is one attempt. An attempt resolves its reference anchors, maps every row, and
//! commits the resulting listings as a single batch before the file leaves the inbox. Expected
//! data problems ([`IngestError`]) route the file to `errored` and polling continues; anything
//! else ([`IngestFatal`]) stops the poller and leaves the file where it is.

pub mod anchors;
pub mod batch;
pub mod convert;
pub mod mapping;
pub mod parser;
pub mod poller;
pub mod router;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::config::{AnchorNames, IngestConfig};
use crate::listings::ListingDraft;
use crate::store::{ListingStore, StoreError};

use anchors::{resolve_anchors, ResolveError};
use batch::{BatchReceipt, CommitError, ListingBatch};
use convert::{ConversionError, ConversionRates};
use mapping::RowOutcome;

pub use poller::{CycleSummary, DirectoryPoller};
pub use router::FileRouter;

/// Lifecycle of a source file. `Processed` and `Errored` are terminal for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Processed,
    Errored,
}

/// Reason a single row could not be mapped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("missing column '{0}'")]
    MissingColumn(&'static str),
    #[error("column '{column}' holds non-numeric value '{value}'")]
    InvalidNumber { column: &'static str, value: String },
    #[error("column '{column}' cannot be converted: {source}")]
    Conversion {
        column: &'static str,
        source: ConversionError,
    },
}

/// Expected, file-level failures. The file is routed to `errored` and polling continues.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("missing required database entries: {}", .missing.join(", "))]
    MissingAnchorData { missing: Vec<String> },
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: RowError },
    #[error("file is not valid CSV: {0}")]
    ParseFailure(String),
    #[error("store rejected the batch: {0}")]
    ConstraintViolation(String),
}

/// Failures outside the expected taxonomy; they terminate the poller.
#[derive(Debug, thiserror::Error)]
pub enum IngestFatal {
    #[error("cannot read inbox {}: {source}", .path.display())]
    Inbox {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot prepare directory {}: {source}", .path.display())]
    Layout {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot move {} into {}: {source}", .from.display(), .to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(StoreError),
}

/// Result of one processing attempt, carrying the file's new location.
#[derive(Debug)]
pub enum FileOutcome {
    Processed {
        file: PathBuf,
        inserted: u64,
        skipped: usize,
    },
    Errored {
        file: PathBuf,
        error: IngestError,
    },
}

impl FileOutcome {
    pub fn state(&self) -> FileState {
        match self {
            FileOutcome::Processed { .. } => FileState::Processed,
            FileOutcome::Errored { .. } => FileState::Errored,
        }
    }

    pub fn file(&self) -> &Path {
        match self {
            FileOutcome::Processed { file, .. } | FileOutcome::Errored { file, .. } => file,
        }
    }
}

/// Drafts mapped from one feed, before anchors are attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFeed {
    pub drafts: Vec<ListingDraft>,
    pub skipped: usize,
}

/// Parses and maps a whole feed. The first malformed row fails the feed.
pub fn normalize_feed<R: Read>(
    reader: R,
    rates: &ConversionRates,
) -> Result<NormalizedFeed, IngestError> {
    let table = parser::read_table(reader)?;
    let mut feed = NormalizedFeed::default();

    for row in table.rows() {
        match mapping::map_row(&table, row, rates)? {
            RowOutcome::Listing(draft) => feed.drafts.push(draft),
            RowOutcome::Skipped => feed.skipped += 1,
        }
    }

    Ok(feed)
}

enum AttemptError {
    File(IngestError),
    Fatal(IngestFatal),
}

impl From<IngestError> for AttemptError {
    fn from(value: IngestError) -> Self {
        Self::File(value)
    }
}

impl From<IngestFatal> for AttemptError {
    fn from(value: IngestFatal) -> Self {
        Self::Fatal(value)
    }
}

impl From<ResolveError> for AttemptError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Missing { missing } => {
                Self::File(IngestError::MissingAnchorData { missing })
            }
            ResolveError::Store(err) => Self::Fatal(IngestFatal::Store(err)),
        }
    }
}

impl From<CommitError> for AttemptError {
    fn from(value: CommitError) -> Self {
        match value {
            CommitError::Rejected(reason) => Self::File(IngestError::ConstraintViolation(reason)),
            CommitError::Store(err) => Self::Fatal(IngestFatal::Store(err)),
        }
    }
}

/// Per-file pipeline: anchors, mapping, batch commit, then routing.
pub struct IngestPipeline<S: ?Sized> {
    store: Arc<S>,
    rates: ConversionRates,
    anchors: AnchorNames,
    router: FileRouter,
}

impl<S> IngestPipeline<S>
where
    S: ListingStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        rates: ConversionRates,
        anchors: AnchorNames,
        router: FileRouter,
    ) -> Self {
        Self {
            store,
            rates,
            anchors,
            router,
        }
    }

    pub fn from_config(store: Arc<S>, config: &IngestConfig) -> Self {
        let router = FileRouter::new(&config.processed_dir, &config.errored_dir);
        Self::new(store, config.rates, config.anchors.clone(), router)
    }

    pub fn router(&self) -> &FileRouter {
        &self.router
    }

    /// Runs one attempt on `path` and routes the file by its outcome.
    pub async fn process_file(&self, path: &Path) -> Result<FileOutcome, IngestFatal> {
        let name = path.display().to_string();
        debug!(file = %name, state = ?self.router.state_of(path), "attempt started");

        match self.attempt(path).await {
            Ok(receipt) => {
                let file = self.router.route(path, true).await?;
                counter!("ingest_files_total", "outcome" => "processed").increment(1);
                counter!("ingest_rows_inserted_total").increment(receipt.inserted);
                counter!("ingest_rows_skipped_total").increment(receipt.skipped as u64);
                info!(
                    file = %name,
                    inserted = receipt.inserted,
                    skipped = receipt.skipped,
                    "processed"
                );
                Ok(FileOutcome::Processed {
                    file,
                    inserted: receipt.inserted,
                    skipped: receipt.skipped,
                })
            }
            Err(AttemptError::File(err)) => {
                let file = self.router.route(path, false).await?;
                counter!("ingest_files_total", "outcome" => "errored").increment(1);
                match &err {
                    // Absent seed data is an operator problem, not a feed problem.
                    IngestError::MissingAnchorData { .. } => {
                        error!(file = %name, error = %err, "error processing file")
                    }
                    _ => warn!(file = %name, error = %err, "error processing file"),
                }
                Ok(FileOutcome::Errored { file, error: err })
            }
            Err(AttemptError::Fatal(fatal)) => Err(fatal),
        }
    }

    async fn attempt(&self, path: &Path) -> Result<BatchReceipt, AttemptError> {
        let anchors = resolve_anchors(self.store.as_ref(), &self.anchors).await?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| IngestFatal::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        let feed = normalize_feed(bytes.as_slice(), &self.rates)?;

        let mut batch = ListingBatch::open(anchors);
        for draft in feed.drafts {
            batch.add(draft);
        }
        batch.skip(feed.skipped);

        Ok(batch.commit(self.store.as_ref()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_feed_counts_skipped_rows() {
        let csv = "status,price,bed,bath,acre_lot,house_size\n\
                   for_sale,500000,3,2,0.5,1000\n\
                   for_rent,1800,2,1,,700\n\
                   sold,,4,3,1.0,2500\n";

        let feed = normalize_feed(csv.as_bytes(), &ConversionRates::default()).expect("feed");

        assert_eq!(feed.drafts.len(), 1);
        assert_eq!(feed.skipped, 2);
        assert_eq!(feed.drafts[0].price, Some(460_000));
    }

    #[test]
    fn normalize_feed_reports_first_malformed_line() {
        let csv = "status,price,bed,bath,acre_lot,house_size\n\
                   for_sale,1,1,1,,\n\
                   for_sale,1,1,lots,,\n\
                   for_sale,x,1,1,,\n";

        match normalize_feed(csv.as_bytes(), &ConversionRates::default()) {
            Err(IngestError::MalformedRow { line, reason }) => {
                assert_eq!(line, 3);
                assert_eq!(
                    reason,
                    RowError::InvalidNumber {
                        column: "bath",
                        value: "lots".to_string(),
                    }
                );
            }
            other => panic!("expected malformed row, got {other:?}"),
        }
    }
}
