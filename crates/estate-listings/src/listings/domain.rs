use serde::{Deserialize, Serialize};

/// Identifier of a seed row in one of the reference tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(pub i32);

/// One resolved reference row (`estate_type`, `offer`, or `city_part`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRow {
    pub id: AnchorId,
    pub name: String,
}

/// Foreign-key anchors shared by every listing ingested from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSet {
    pub estate_type: AnchorRow,
    pub offer: AnchorRow,
    pub city_part: AnchorRow,
}

/// A normalized listing that has not yet been attached to its reference rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListingDraft {
    pub square_footage: Option<f64>,
    pub price: Option<i32>,
    pub rooms: Option<f64>,
    pub bathrooms: Option<i32>,
    pub land_area: Option<f64>,
    pub registration: bool,
    pub parking: bool,
    pub construction_year: Option<i32>,
}

impl ListingDraft {
    pub fn attach(self, anchors: &AnchorSet) -> NormalizedListing {
        NormalizedListing {
            square_footage: self.square_footage,
            price: self.price,
            rooms: self.rooms,
            bathrooms: self.bathrooms,
            land_area: self.land_area,
            registration: self.registration,
            parking: self.parking,
            construction_year: self.construction_year,
            estate_type_id: anchors.estate_type.id,
            offer_id: anchors.offer.id,
            city_part_id: anchors.city_part.id,
        }
    }
}

/// A `building` row ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedListing {
    pub square_footage: Option<f64>,
    pub price: Option<i32>,
    pub rooms: Option<f64>,
    pub bathrooms: Option<i32>,
    pub land_area: Option<f64>,
    pub registration: bool,
    pub parking: bool,
    pub construction_year: Option<i32>,
    pub estate_type_id: AnchorId,
    pub offer_id: AnchorId,
    pub city_part_id: AnchorId,
}

/// A stored listing as returned by reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: i32,
    #[serde(flatten)]
    pub listing: NormalizedListing,
}

/// Search filter for the listings read surface.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub min_price: Option<i32>,
    #[serde(default)]
    pub max_price: Option<i32>,
    #[serde(default)]
    pub min_rooms: Option<f64>,
    #[serde(default)]
    pub city_part_id: Option<i32>,
    #[serde(default = "ListingQuery::default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl ListingQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    fn default_limit() -> u32 {
        Self::DEFAULT_LIMIT
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }

    pub fn matches(&self, listing: &NormalizedListing) -> bool {
        let price_floor = match self.min_price {
            Some(min) => listing.price.is_some_and(|price| price >= min),
            None => true,
        };
        let price_ceiling = match self.max_price {
            Some(max) => listing.price.is_some_and(|price| price <= max),
            None => true,
        };
        let rooms = match self.min_rooms {
            Some(min) => listing.rooms.is_some_and(|rooms| rooms >= min),
            None => true,
        };
        let city_part = match self.city_part_id {
            Some(id) => listing.city_part_id == AnchorId(id),
            None => true,
        };

        price_floor && price_ceiling && rooms && city_part
    }
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            min_price: None,
            max_price: None,
            min_rooms: None,
            city_part_id: None,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}
