use std::path::{Path, PathBuf};
use std::time::Duration;

use metrics::gauge;
use tokio::sync::watch;
use tracing::info;

use super::{FileOutcome, IngestFatal, IngestPipeline};
use crate::store::ListingStore;

const CSV_SUFFIX: &str = ".csv";

/// Per-cycle tally of routed files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub processed: usize,
    pub errored: usize,
}

impl CycleSummary {
    pub fn total(&self) -> usize {
        self.processed + self.errored
    }
}

/// Scans the inbox on a fixed interval and feeds each CSV file through the pipeline, one at a
/// time and in file-name order.
pub struct DirectoryPoller<S: ?Sized> {
    pipeline: IngestPipeline<S>,
    staging_dir: PathBuf,
    interval: Duration,
}

impl<S> DirectoryPoller<S>
where
    S: ListingStore + ?Sized,
{
    pub fn new(pipeline: IngestPipeline<S>, staging_dir: PathBuf, interval: Duration) -> Self {
        Self {
            pipeline,
            staging_dir,
            interval,
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Eligible inbox entries: regular files whose name ends in `.csv` (case-sensitive).
    pub async fn pending_files(&self) -> Result<Vec<PathBuf>, IngestFatal> {
        let inbox = |source| IngestFatal::Inbox {
            path: self.staging_dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.staging_dir)
            .await
            .map_err(inbox)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(inbox)? {
            let is_csv = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(CSV_SUFFIX));
            if !is_csv {
                continue;
            }
            if entry.file_type().await.map_err(inbox)?.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// One pass over the inbox.
    pub async fn run_cycle(&self) -> Result<CycleSummary, IngestFatal> {
        let mut summary = CycleSummary::default();

        for path in self.pending_files().await? {
            match self.pipeline.process_file(&path).await? {
                FileOutcome::Processed { .. } => summary.processed += 1,
                FileOutcome::Errored { .. } => summary.errored += 1,
            }
        }

        gauge!("ingest_last_cycle_files").set(summary.total() as f64);
        if summary.total() > 0 {
            info!(
                processed = summary.processed,
                errored = summary.errored,
                "ingestion cycle complete"
            );
        }
        Ok(summary)
    }

    /// Polls until `shutdown` turns true. Shutdown is observed between cycles and during the
    /// sleep, so every file picked up by the current cycle still reaches its routing step.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), IngestFatal> {
        info!(
            inbox = %self.staging_dir.display(),
            interval_secs = self.interval.as_secs(),
            "directory poller started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.run_cycle().await?;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!("directory poller stopped");
        Ok(())
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender gone: no shutdown can arrive any more.
            std::future::pending::<()>().await;
        }
    }
}
