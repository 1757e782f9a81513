use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use color_eyre::eyre::{eyre, Context};
use db::cooking::{GroceryList, QuantityWarning};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    http_server::{errors::WithStatus as _, ResponseResult},
    AppState,
};

/// Any `items` the client sends along are ignored. The list is always rebuilt
/// from the recipes stored against the meal plan.
#[derive(Debug, Deserialize)]
pub struct RegenerateGroceryListRequest {
    meal_plan_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroceryListResponse {
    #[serde(flatten)]
    pub grocery_list: GroceryList,
    pub warnings: Vec<QuantityWarning>,
}

#[axum_macros::debug_handler]
pub async fn regenerate_grocery_list(
    State(state): State<AppState>,
    Json(request): Json<RegenerateGroceryListRequest>,
) -> ResponseResult<impl IntoResponse> {
    let (grocery_list, warnings) = GroceryList::regenerate_for_meal_plan(
        state.db(),
        request.meal_plan_id,
        &state.consolidator,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(GroceryListResponse {
            grocery_list,
            warnings,
        }),
    ))
}

#[axum_macros::debug_handler]
pub async fn get_grocery_list(
    State(state): State<AppState>,
    Path(meal_plan_id): Path<Uuid>,
) -> ResponseResult<impl IntoResponse> {
    let grocery_list = GroceryList::get_by_meal_plan(state.db(), meal_plan_id)
        .await
        .context("Failed to fetch grocery list")?
        .ok_or_else(|| eyre!("Grocery list for meal plan {meal_plan_id} not found"))
        .with_status(StatusCode::NOT_FOUND)?;

    Ok(Json(grocery_list))
}
