use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use color_eyre::eyre::{eyre, Context};
use db::cooking::{NewRecipe, Recipe};
use uuid::Uuid;

use crate::{
    http_server::{errors::WithStatus as _, ResponseResult},
    AppState,
};

#[axum_macros::debug_handler]
pub async fn list_recipes(State(state): State<AppState>) -> ResponseResult<impl IntoResponse> {
    let recipes = Recipe::list(state.db())
        .await
        .context("Failed to fetch recipes")?;

    Ok(Json(recipes))
}

#[axum_macros::debug_handler]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ResponseResult<impl IntoResponse> {
    let recipe = Recipe::get_by_id(state.db(), id)
        .await
        .context("Failed to fetch recipe")?
        .ok_or_else(|| eyre!("Recipe {id} not found"))
        .with_status(StatusCode::NOT_FOUND)?;

    Ok(Json(recipe))
}

#[axum_macros::debug_handler]
pub async fn create_recipe(
    State(state): State<AppState>,
    Json(new_recipe): Json<NewRecipe>,
) -> ResponseResult<impl IntoResponse> {
    let recipe = Recipe::create(state.db(), new_recipe).await?;

    Ok((StatusCode::CREATED, Json(recipe)))
}
