//! Listing entities and the read-only HTTP surface over them.

pub mod domain;
pub mod router;

pub use domain::{
    AnchorId, AnchorRow, AnchorSet, ListingDraft, ListingQuery, ListingRecord, NormalizedListing,
};
pub use router::listing_router;
