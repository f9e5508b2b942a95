//! REST router for the item catalog.

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::CascadeError;
use crate::items::{Item, ItemStore, ListParams, SearchParams};

/// Build the `/items` routes over `store`.
pub fn router(store: ItemStore) -> Router {
    Router::new()
        .route("/items/", get(list_items).post(create_item))
        .route("/items/search/", get(search_items))
        .route(
            "/items/:item_id",
            get(read_item).put(update_item).delete(delete_item),
        )
        .with_state(store)
}

async fn list_items(
    State(store): State<ItemStore>,
    Query(params): Query<ListParams>,
) -> Json<Vec<Item>> {
    Json(store.list(&params).await)
}

async fn read_item(
    State(store): State<ItemStore>,
    ItemId(item_id): ItemId,
) -> Result<Json<Item>, ItemError> {
    Ok(Json(store.get(item_id).await?))
}

async fn create_item(State(store): State<ItemStore>, Json(item): Json<Item>) -> Json<Item> {
    Json(store.create(item).await)
}

async fn update_item(
    State(store): State<ItemStore>,
    ItemId(item_id): ItemId,
    Json(item): Json<Item>,
) -> Result<Json<Item>, ItemError> {
    Ok(Json(store.update(item_id, item).await?))
}

async fn delete_item(
    State(store): State<ItemStore>,
    ItemId(item_id): ItemId,
) -> Result<Json<serde_json::Value>, ItemError> {
    store.delete(item_id).await?;
    Ok(Json(json!({"message": "Item deleted successfully"})))
}

async fn search_items(
    State(store): State<ItemStore>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Item>>, ItemError> {
    let params = SearchParams::from_pairs(pairs)?;
    Ok(Json(store.search(&params).await))
}

/// `item_id` path segment. A non-integer id is a 422 with a `{"detail"}` body.
struct ItemId(i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ItemId {
    type Rejection = ItemError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(item_id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|e| ItemError(CascadeError::InvalidRequest(e.body_text())))?;
        Ok(ItemId(item_id))
    }
}

/// Maps item errors onto `{"detail": ...}` responses.
struct ItemError(CascadeError);

impl From<CascadeError> for ItemError {
    fn from(err: CascadeError) -> Self {
        ItemError(err)
    }
}

impl IntoResponse for ItemError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            CascadeError::ItemNotFound(_) => (StatusCode::NOT_FOUND, "Item not found".to_string()),
            CascadeError::InvalidRequest(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (status, Json(json!({"detail": detail}))).into_response()
    }
}
