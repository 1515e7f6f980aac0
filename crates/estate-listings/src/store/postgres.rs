use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use super::{ListingStore, StoreError};
use crate::config::DatabaseConfig;
use crate::listings::{AnchorId, AnchorRow, ListingQuery, ListingRecord, NormalizedListing};

// Keeps each multi-row INSERT under the 65535 bind parameter ceiling (11 binds per row).
const MAX_ROWS_PER_STATEMENT: usize = 5_000;

const LISTING_COLUMNS: &str = "id, square_footage, price, rooms, bathrooms, land_area, \
     registration, parking, construction_year, estate_type_id, offer_id, city_part_id";

type AnchorTuple = (i32, Option<String>);

type ListingTuple = (
    i32,
    Option<f64>,
    Option<i32>,
    Option<f64>,
    Option<i32>,
    Option<f64>,
    Option<bool>,
    Option<bool>,
    Option<i32>,
    i32,
    i32,
    i32,
);

/// PostgreSQL-backed store over the `building` schema.
#[derive(Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(classify)?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn anchor(&self, sql: &str, name: Option<&str>) -> Result<Option<AnchorRow>, StoreError> {
        let mut query = sqlx::query_as::<_, AnchorTuple>(sql);
        if let Some(name) = name {
            query = query.bind(name);
        }

        let row = query.fetch_optional(&self.pool).await.map_err(classify)?;
        Ok(row.map(|(id, name)| AnchorRow {
            id: AnchorId(id),
            name: name.unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn estate_type_by_name(&self, name: &str) -> Result<Option<AnchorRow>, StoreError> {
        self.anchor(
            "SELECT id, name FROM estate_type WHERE name = $1 ORDER BY id LIMIT 1",
            Some(name),
        )
        .await
    }

    async fn offer_by_name(&self, name: &str) -> Result<Option<AnchorRow>, StoreError> {
        self.anchor(
            "SELECT id, name FROM offer WHERE name = $1 ORDER BY id LIMIT 1",
            Some(name),
        )
        .await
    }

    async fn first_city_part(&self) -> Result<Option<AnchorRow>, StoreError> {
        self.anchor("SELECT id, name FROM city_part ORDER BY id LIMIT 1", None)
            .await
    }

    async fn insert_batch(&self, listings: &[NormalizedListing]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let mut inserted = 0;

        for chunk in listings.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO building (square_footage, price, rooms, bathrooms, land_area, \
                 registration, parking, construction_year, estate_type_id, offer_id, city_part_id) ",
            );
            builder.push_values(chunk, |mut row, listing| {
                row.push_bind(listing.square_footage)
                    .push_bind(listing.price)
                    .push_bind(listing.rooms)
                    .push_bind(listing.bathrooms)
                    .push_bind(listing.land_area)
                    .push_bind(listing.registration)
                    .push_bind(listing.parking)
                    .push_bind(listing.construction_year)
                    .push_bind(listing.estate_type_id.0)
                    .push_bind(listing.offer_id.0)
                    .push_bind(listing.city_part_id.0);
            });

            // Dropping `tx` on the error path rolls the whole batch back.
            let result = builder.build().execute(&mut *tx).await.map_err(classify)?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(classify)?;
        debug!(inserted, "building batch committed");
        Ok(inserted)
    }

    async fn count_listings(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM building")
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn fetch_listing(&self, id: i32) -> Result<Option<ListingRecord>, StoreError> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM building WHERE id = $1");
        let row = sqlx::query_as::<_, ListingTuple>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        Ok(row.map(record_from_tuple))
    }

    async fn search_listings(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<ListingRecord>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LISTING_COLUMNS} FROM building WHERE TRUE"));

        if let Some(min_price) = query.min_price {
            builder.push(" AND price >= ").push_bind(min_price);
        }
        if let Some(max_price) = query.max_price {
            builder.push(" AND price <= ").push_bind(max_price);
        }
        if let Some(min_rooms) = query.min_rooms {
            builder.push(" AND rooms >= ").push_bind(min_rooms);
        }
        if let Some(city_part_id) = query.city_part_id {
            builder.push(" AND city_part_id = ").push_bind(city_part_id);
        }

        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(i64::from(query.effective_limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));

        let rows = builder
            .build_query_as::<ListingTuple>()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(record_from_tuple).collect())
    }
}

fn record_from_tuple(row: ListingTuple) -> ListingRecord {
    let (
        id,
        square_footage,
        price,
        rooms,
        bathrooms,
        land_area,
        registration,
        parking,
        construction_year,
        estate_type_id,
        offer_id,
        city_part_id,
    ) = row;

    ListingRecord {
        id,
        listing: NormalizedListing {
            square_footage,
            price,
            rooms,
            bathrooms,
            land_area,
            registration: registration.unwrap_or(false),
            parking: parking.unwrap_or(false),
            construction_year,
            estate_type_id: AnchorId(estate_type_id),
            offer_id: AnchorId(offer_id),
            city_part_id: AnchorId(city_part_id),
        },
    }
}

/// Splits database refusals (SQLSTATE classes 22 and 23) from transport and pool failures.
fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let refused = !matches!(db_err.kind(), ErrorKind::Other)
                || db_err
                    .code()
                    .is_some_and(|code| code.starts_with("22") || code.starts_with("23"));
            if refused {
                StoreError::Constraint(db_err.message().to_string())
            } else {
                StoreError::Unavailable(err.to_string())
            }
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}
