use tracing::debug;

use crate::listings::{AnchorSet, ListingDraft, NormalizedListing};
use crate::store::{ListingStore, StoreError};

/// Listings accumulated for one source file, committed together or not at all.
///
/// Nothing reaches the store until [`ListingBatch::commit`]; dropping a batch discards it.
#[derive(Debug)]
pub struct ListingBatch {
    anchors: AnchorSet,
    pending: Vec<NormalizedListing>,
    skipped: usize,
}

/// Counts reported after a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReceipt {
    pub inserted: u64,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("store rejected the batch: {0}")]
    Rejected(String),
    #[error(transparent)]
    Store(StoreError),
}

impl ListingBatch {
    pub fn open(anchors: AnchorSet) -> Self {
        Self {
            anchors,
            pending: Vec::new(),
            skipped: 0,
        }
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    pub fn add(&mut self, draft: ListingDraft) {
        self.pending.push(draft.attach(&self.anchors));
    }

    /// Records rows excluded by the status filter.
    pub fn skip(&mut self, rows: usize) {
        self.skipped += rows;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// An empty batch still commits: a file with no eligible rows is a successful attempt.
    pub async fn commit<S>(self, store: &S) -> Result<BatchReceipt, CommitError>
    where
        S: ListingStore + ?Sized,
    {
        let skipped = self.skipped;
        match store.insert_batch(&self.pending).await {
            Ok(inserted) => {
                debug!(inserted, skipped, "listing batch committed");
                Ok(BatchReceipt { inserted, skipped })
            }
            Err(StoreError::Constraint(reason)) => Err(CommitError::Rejected(reason)),
            Err(other) => Err(CommitError::Store(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnchorNames;
    use crate::ingest::anchors::resolve_anchors;
    use crate::store::InMemoryListingStore;

    async fn open_batch(store: &InMemoryListingStore) -> ListingBatch {
        let anchors = resolve_anchors(store, &AnchorNames::default())
            .await
            .expect("anchors");
        ListingBatch::open(anchors)
    }

    #[tokio::test]
    async fn commit_attaches_anchor_ids() {
        let store = InMemoryListingStore::seeded();
        let mut batch = open_batch(&store).await;
        let city_part = batch.anchors().city_part.id;
        batch.add(ListingDraft {
            price: Some(1),
            ..ListingDraft::default()
        });
        batch.skip(1);

        let receipt = batch.commit(&store).await.expect("commit");
        assert_eq!(
            receipt,
            BatchReceipt {
                inserted: 1,
                skipped: 1
            }
        );
        assert_eq!(store.listings()[0].city_part_id, city_part);
    }

    #[tokio::test]
    async fn empty_batch_commits() {
        let store = InMemoryListingStore::seeded();
        let batch = open_batch(&store).await;
        assert!(batch.is_empty());
        let receipt = batch.commit(&store).await.expect("commit");
        assert_eq!(receipt.inserted, 0);
        assert_eq!(store.insert_attempts(), 1);
    }

    #[tokio::test]
    async fn constraint_violation_persists_nothing() {
        let store = InMemoryListingStore::seeded();
        let mut batch = open_batch(&store).await;
        batch.add(ListingDraft::default());
        batch.add(ListingDraft::default());
        assert_eq!(batch.len(), 2);

        let city_part = batch.anchors().city_part.id;
        store.remove_city_part(city_part);

        let error = batch.commit(&store).await.expect_err("dangling city part");
        assert!(matches!(error, CommitError::Rejected(_)));
        assert!(store.listings().is_empty());
    }

    #[tokio::test]
    async fn outage_is_reported_separately() {
        let store = InMemoryListingStore::seeded();
        let batch = open_batch(&store).await;
        store.set_unavailable(true);
        assert!(matches!(
            batch.commit(&store).await,
            Err(CommitError::Store(StoreError::Unavailable(_)))
        ));
    }
}
