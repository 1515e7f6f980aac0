use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::domain::ListingQuery;
use crate::store::{ListingStore, StoreError};

/// Read-only HTTP surface over stored listings.
pub fn listing_router<S>(store: Arc<S>) -> Router
where
    S: ListingStore + ?Sized + 'static,
{
    Router::new()
        .route("/", get(index_handler))
        .route("/api/v1/buildings/count", get(count_handler::<S>))
        .route("/api/v1/listings", get(search_handler::<S>))
        .route("/api/v1/listings/:listing_id", get(fetch_handler::<S>))
        .with_state(store)
}

pub(crate) async fn index_handler() -> &'static str {
    "Real Estate API"
}

pub(crate) async fn count_handler<S>(State(store): State<Arc<S>>) -> Response
where
    S: ListingStore + ?Sized + 'static,
{
    match store.count_listings().await {
        Ok(total) => (StatusCode::OK, Json(json!({ "total": total }))).into_response(),
        Err(err) => store_failure(err),
    }
}

pub(crate) async fn search_handler<S>(
    State(store): State<Arc<S>>,
    Query(query): Query<ListingQuery>,
) -> Response
where
    S: ListingStore + ?Sized + 'static,
{
    match store.search_listings(&query).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => store_failure(err),
    }
}

pub(crate) async fn fetch_handler<S>(
    State(store): State<Arc<S>>,
    listing_id: Result<Path<i32>, PathRejection>,
) -> Response
where
    S: ListingStore + ?Sized + 'static,
{
    let listing_id = match listing_id {
        Ok(Path(listing_id)) => listing_id,
        Err(rejection) => {
            let payload = json!({ "error": rejection.body_text() });
            return (rejection.status(), Json(payload)).into_response();
        }
    };

    match store.fetch_listing(listing_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": format!("listing {listing_id} not found"),
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => store_failure(err),
    }
}

fn store_failure(err: StoreError) -> Response {
    let status = match err {
        StoreError::Constraint(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
