use crate::config::AnchorNames;
use crate::listings::AnchorSet;
use crate::store::{ListingStore, StoreError};

/// Failure resolving the reference rows an ingestion attempt depends on.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("missing required database entries: {}", .missing.join(", "))]
    Missing { missing: Vec<String> },
    #[error(transparent)]
    Store(StoreError),
}

/// Resolves the estate type and offer by name plus the lowest-id city part.
///
/// All three lookups run even when an earlier one comes back empty so the error names every
/// absent seed row at once.
pub async fn resolve_anchors<S>(store: &S, names: &AnchorNames) -> Result<AnchorSet, ResolveError>
where
    S: ListingStore + ?Sized,
{
    let estate_type = store
        .estate_type_by_name(&names.estate_type)
        .await
        .map_err(ResolveError::Store)?;
    let offer = store
        .offer_by_name(&names.offer)
        .await
        .map_err(ResolveError::Store)?;
    let city_part = store.first_city_part().await.map_err(ResolveError::Store)?;

    match (estate_type, offer, city_part) {
        (Some(estate_type), Some(offer), Some(city_part)) => Ok(AnchorSet {
            estate_type,
            offer,
            city_part,
        }),
        (estate_type, offer, city_part) => {
            let mut missing = Vec::new();
            if estate_type.is_none() {
                missing.push(format!("estate type '{}'", names.estate_type));
            }
            if offer.is_none() {
                missing.push(format!("offer '{}'", names.offer));
            }
            if city_part.is_none() {
                missing.push("city part".to_string());
            }
            Err(ResolveError::Missing { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryListingStore;

    #[tokio::test]
    async fn resolves_seeded_anchors() {
        let store = InMemoryListingStore::seeded();
        let anchors = resolve_anchors(&store, &AnchorNames::default())
            .await
            .expect("anchors resolve");
        assert_eq!(anchors.estate_type.name, "kuća");
        assert_eq!(anchors.offer.name, "Prodaja");
        assert_eq!(anchors.city_part.name, "Centar");
    }

    #[tokio::test]
    async fn reports_every_missing_anchor() {
        let store = InMemoryListingStore::new();
        store.add_offer("Prodaja");
        let error = resolve_anchors(&store, &AnchorNames::default())
            .await
            .expect_err("estate type and city part missing");

        assert_eq!(
            error.to_string(),
            "missing required database entries: estate type 'kuća', city part"
        );
    }

    #[tokio::test]
    async fn name_lookup_is_exact() {
        let store = InMemoryListingStore::new();
        store.add_estate_type("Kuća");
        store.add_offer("Prodaja");
        store.add_city_part("Centar");
        assert!(matches!(
            resolve_anchors(&store, &AnchorNames::default()).await,
            Err(ResolveError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn store_outage_is_not_a_missing_anchor() {
        let store = InMemoryListingStore::seeded();
        store.set_unavailable(true);
        assert!(matches!(
            resolve_anchors(&store, &AnchorNames::default()).await,
            Err(ResolveError::Store(StoreError::Unavailable(_)))
        ));
    }
}
