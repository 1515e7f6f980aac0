use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{ListingStore, StoreError};
use crate::listings::{AnchorId, AnchorRow, ListingQuery, ListingRecord, NormalizedListing};

/// Process-local store enforcing the same foreign-key rules as the relational schema.
#[derive(Default)]
pub struct InMemoryListingStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    estate_types: Vec<AnchorRow>,
    offers: Vec<AnchorRow>,
    city_parts: Vec<AnchorRow>,
    buildings: BTreeMap<i32, NormalizedListing>,
    next_anchor_id: i32,
    next_building_id: i32,
    insert_attempts: usize,
    unavailable: bool,
}

impl Tables {
    fn next_anchor(&mut self, name: &str) -> AnchorRow {
        self.next_anchor_id += 1;
        AnchorRow {
            id: AnchorId(self.next_anchor_id),
            name: name.to_string(),
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn dangling_reference(&self, listing: &NormalizedListing) -> Option<String> {
        let exists = |rows: &[AnchorRow], id: AnchorId| rows.iter().any(|row| row.id == id);

        if !exists(&self.estate_types, listing.estate_type_id) {
            return Some(format!(
                "estate_type_id {} is not present in estate_type",
                listing.estate_type_id.0
            ));
        }
        if !exists(&self.offers, listing.offer_id) {
            return Some(format!(
                "offer_id {} is not present in offer",
                listing.offer_id.0
            ));
        }
        if !exists(&self.city_parts, listing.city_part_id) {
            return Some(format!(
                "city_part_id {} is not present in city_part",
                listing.city_part_id.0
            ));
        }
        None
    }
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the default ingestion anchors.
    pub fn seeded() -> Self {
        let store = Self::new();
        store.add_estate_type("kuća");
        store.add_offer("Prodaja");
        store.add_city_part("Centar");
        store
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_estate_type(&self, name: &str) -> AnchorId {
        let mut tables = self.lock();
        let row = tables.next_anchor(name);
        let id = row.id;
        tables.estate_types.push(row);
        id
    }

    pub fn add_offer(&self, name: &str) -> AnchorId {
        let mut tables = self.lock();
        let row = tables.next_anchor(name);
        let id = row.id;
        tables.offers.push(row);
        id
    }

    pub fn add_city_part(&self, name: &str) -> AnchorId {
        let mut tables = self.lock();
        let row = tables.next_anchor(name);
        let id = row.id;
        tables.city_parts.push(row);
        id
    }

    /// Removes a city part, leaving any listing that references it dangling on the next insert.
    pub fn remove_city_part(&self, id: AnchorId) {
        self.lock().city_parts.retain(|row| row.id != id);
    }

    /// Simulates losing the database connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Number of `insert_batch` calls, successful or not.
    pub fn insert_attempts(&self) -> usize {
        self.lock().insert_attempts
    }

    pub fn listings(&self) -> Vec<NormalizedListing> {
        self.lock().buildings.values().cloned().collect()
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn estate_type_by_name(&self, name: &str) -> Result<Option<AnchorRow>, StoreError> {
        let tables = self.lock();
        tables.check_available()?;
        Ok(tables
            .estate_types
            .iter()
            .filter(|row| row.name == name)
            .min_by_key(|row| row.id)
            .cloned())
    }

    async fn offer_by_name(&self, name: &str) -> Result<Option<AnchorRow>, StoreError> {
        let tables = self.lock();
        tables.check_available()?;
        Ok(tables
            .offers
            .iter()
            .filter(|row| row.name == name)
            .min_by_key(|row| row.id)
            .cloned())
    }

    async fn first_city_part(&self) -> Result<Option<AnchorRow>, StoreError> {
        let tables = self.lock();
        tables.check_available()?;
        Ok(tables.city_parts.iter().min_by_key(|row| row.id).cloned())
    }

    async fn insert_batch(&self, listings: &[NormalizedListing]) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        tables.insert_attempts += 1;
        tables.check_available()?;

        if let Some(reason) = listings
            .iter()
            .find_map(|listing| tables.dangling_reference(listing))
        {
            return Err(StoreError::Constraint(reason));
        }

        for listing in listings {
            tables.next_building_id += 1;
            let id = tables.next_building_id;
            tables.buildings.insert(id, listing.clone());
        }

        Ok(listings.len() as u64)
    }

    async fn count_listings(&self) -> Result<u64, StoreError> {
        let tables = self.lock();
        tables.check_available()?;
        Ok(tables.buildings.len() as u64)
    }

    async fn fetch_listing(&self, id: i32) -> Result<Option<ListingRecord>, StoreError> {
        let tables = self.lock();
        tables.check_available()?;
        Ok(tables.buildings.get(&id).map(|listing| ListingRecord {
            id,
            listing: listing.clone(),
        }))
    }

    async fn search_listings(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<ListingRecord>, StoreError> {
        let tables = self.lock();
        tables.check_available()?;
        Ok(tables
            .buildings
            .iter()
            .filter(|(_, listing)| query.matches(listing))
            .skip(query.offset as usize)
            .take(query.effective_limit() as usize)
            .map(|(id, listing)| ListingRecord {
                id: *id,
                listing: listing.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::{AnchorSet, ListingDraft};

    async fn anchors(store: &InMemoryListingStore) -> AnchorSet {
        AnchorSet {
            estate_type: store
                .estate_type_by_name("kuća")
                .await
                .expect("lookup")
                .expect("estate type"),
            offer: store
                .offer_by_name("Prodaja")
                .await
                .expect("lookup")
                .expect("offer"),
            city_part: store
                .first_city_part()
                .await
                .expect("lookup")
                .expect("city part"),
        }
    }

    #[tokio::test]
    async fn first_city_part_is_lowest_id() {
        let store = InMemoryListingStore::new();
        let first = store.add_city_part("Vračar");
        store.add_city_part("Zemun");
        let row = store
            .first_city_part()
            .await
            .expect("lookup")
            .expect("row");
        assert_eq!(row.id, first);
        assert_eq!(row.name, "Vračar");
    }

    #[tokio::test]
    async fn dangling_reference_rejects_whole_batch() {
        let store = InMemoryListingStore::seeded();
        let anchors = anchors(&store).await;
        let good = ListingDraft::default().attach(&anchors);
        let mut bad = good.clone();
        bad.city_part_id = AnchorId(999);

        let error = store
            .insert_batch(&[good, bad])
            .await
            .expect_err("dangling id rejected");
        assert!(matches!(error, StoreError::Constraint(_)));
        assert_eq!(store.count_listings().await.expect("count"), 0);
        assert_eq!(store.insert_attempts(), 1);
    }

    #[tokio::test]
    async fn search_respects_offset_and_limit() {
        let store = InMemoryListingStore::seeded();
        let anchors = anchors(&store).await;
        let batch: Vec<_> = (1..=5)
            .map(|step| {
                ListingDraft {
                    price: Some(step * 100),
                    ..ListingDraft::default()
                }
                .attach(&anchors)
            })
            .collect();
        store.insert_batch(&batch).await.expect("insert");

        let query = ListingQuery {
            min_price: Some(200),
            limit: 2,
            offset: 1,
            ..ListingQuery::default()
        };
        let prices: Vec<_> = store
            .search_listings(&query)
            .await
            .expect("search")
            .into_iter()
            .map(|record| record.listing.price)
            .collect();
        assert_eq!(prices, vec![Some(300), Some(400)]);
    }

    #[tokio::test]
    async fn unavailable_store_reports_outage() {
        let store = InMemoryListingStore::seeded();
        store.set_unavailable(true);
        assert!(matches!(
            store.first_city_part().await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
