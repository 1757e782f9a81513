use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use color_eyre::eyre::{eyre, Context};
use db::cooking::{InventoryItem, InventoryUpdate, NewInventoryItem};
use uuid::Uuid;

use crate::{
    http_server::{errors::WithStatus as _, ResponseResult},
    AppState,
};

#[axum_macros::debug_handler]
pub async fn list_inventory(State(state): State<AppState>) -> ResponseResult<impl IntoResponse> {
    let items = InventoryItem::list(state.db())
        .await
        .context("Failed to fetch inventory")?;

    Ok(Json(items))
}

#[axum_macros::debug_handler]
pub async fn inventory_by_category(
    State(state): State<AppState>,
) -> ResponseResult<impl IntoResponse> {
    let groups = InventoryItem::list_grouped(state.db())
        .await
        .context("Failed to fetch inventory")?;

    Ok(Json(groups))
}

#[axum_macros::debug_handler]
pub async fn create_inventory_item(
    State(state): State<AppState>,
    Json(item): Json<NewInventoryItem>,
) -> ResponseResult<impl IntoResponse> {
    let created = InventoryItem::create(state.db(), item).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[axum_macros::debug_handler]
pub async fn update_inventory_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<InventoryUpdate>,
) -> ResponseResult<impl IntoResponse> {
    let updated = InventoryItem::update(state.db(), id, changes)
        .await?
        .ok_or_else(|| eyre!("Inventory item {id} not found"))
        .with_status(StatusCode::NOT_FOUND)?;

    Ok(Json(updated))
}

#[axum_macros::debug_handler]
pub async fn delete_inventory_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ResponseResult<impl IntoResponse> {
    let deleted = InventoryItem::delete(state.db(), id)
        .await
        .context("Failed to delete inventory item")?;

    if !deleted {
        return Err(eyre!("Inventory item {id} not found")).with_status(StatusCode::NOT_FOUND);
    }

    Ok(StatusCode::NO_CONTENT)
}
