//! JSON endpoints for managing categories.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    Error, LedgerStore,
    category::{Category, CategoryId, CategoryUpdate, NewCategory},
};

/// Create a category, responds with the stored category and 201 Created.
pub async fn create_category_endpoint(
    State(store): State<LedgerStore>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let Json(new_category) = payload?;
    tracing::info!("Creating category: {}", new_category.name);

    let category = store.create_category(new_category)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// List every category.
pub async fn get_categories_endpoint(
    State(store): State<LedgerStore>,
) -> Result<Json<Vec<Category>>, Error> {
    let categories = store.get_all_categories()?;
    tracing::debug!("Retrieved {} categories", categories.len());

    Ok(Json(categories))
}

/// Get a single category.
pub async fn get_category_endpoint(
    State(store): State<LedgerStore>,
    path: Result<Path<CategoryId>, PathRejection>,
) -> Result<Json<Category>, Error> {
    let Path(category_id) = path?;
    store.get_category(&category_id).map(Json)
}

/// Apply a partial update to a category.
pub async fn update_category_endpoint(
    State(store): State<LedgerStore>,
    path: Result<Path<CategoryId>, PathRejection>,
    payload: Result<Json<CategoryUpdate>, JsonRejection>,
) -> Result<Json<Category>, Error> {
    let Path(category_id) = path?;
    let Json(update) = payload?;
    tracing::info!("Updating category: {category_id}");

    store.update_category(&category_id, update).map(Json)
}

/// Delete a category that no transactions use.
pub async fn delete_category_endpoint(
    State(store): State<LedgerStore>,
    path: Result<Path<CategoryId>, PathRejection>,
) -> Result<Json<Value>, Error> {
    let Path(category_id) = path?;
    tracing::info!("Deleting category: {category_id}");
    store.delete_category(&category_id)?;

    Ok(Json(json!({ "message": "Category deleted successfully" })))
}
