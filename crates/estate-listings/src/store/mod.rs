//! Storage seam shared by the ingestion job and the HTTP read surface.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::listings::{AnchorRow, ListingQuery, ListingRecord, NormalizedListing};

pub use memory::InMemoryListingStore;
pub use postgres::PgListingStore;

/// Relational store holding reference rows and `building` listings.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn estate_type_by_name(&self, name: &str) -> Result<Option<AnchorRow>, StoreError>;

    async fn offer_by_name(&self, name: &str) -> Result<Option<AnchorRow>, StoreError>;

    /// The city part with the lowest id.
    async fn first_city_part(&self) -> Result<Option<AnchorRow>, StoreError>;

    /// Persists every listing in one transaction; either all rows land or none do.
    async fn insert_batch(&self, listings: &[NormalizedListing]) -> Result<u64, StoreError>;

    async fn count_listings(&self) -> Result<u64, StoreError>;

    async fn fetch_listing(&self, id: i32) -> Result<Option<ListingRecord>, StoreError>;

    async fn search_listings(&self, query: &ListingQuery)
        -> Result<Vec<ListingRecord>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store refused the write (foreign key, uniqueness, not-null, or range checks).
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
