use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use color_eyre::eyre::{eyre, Context};
use db::cooking::{MealPlan, NewMealPlan, QuantityWarning};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    http_server::{errors::WithStatus as _, ResponseResult},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateMealPlanRequest {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    recipes: Vec<PlannedRecipe>,
}

/// Clients send whole recipe objects. Only the id is read, ingredients come
/// from storage.
#[derive(Debug, Deserialize)]
pub struct PlannedRecipe {
    #[serde(alias = "recipe_id")]
    id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMealPlanResponse {
    pub id: Uuid,
    pub grocery_list_id: Uuid,
    pub warnings: Vec<QuantityWarning>,
}

impl From<CreateMealPlanRequest> for NewMealPlan {
    fn from(request: CreateMealPlanRequest) -> Self {
        NewMealPlan {
            start_date: request.start_date,
            end_date: request.end_date,
            recipe_ids: request.recipes.into_iter().map(|r| r.id).collect(),
        }
    }
}

#[axum_macros::debug_handler]
pub async fn list_meal_plans(State(state): State<AppState>) -> ResponseResult<impl IntoResponse> {
    let meal_plans = MealPlan::list_with_recipes(state.db())
        .await
        .context("Failed to fetch meal plans")?;

    Ok(Json(meal_plans))
}

#[axum_macros::debug_handler]
pub async fn create_meal_plan(
    State(state): State<AppState>,
    Json(request): Json<CreateMealPlanRequest>,
) -> ResponseResult<impl IntoResponse> {
    let created =
        MealPlan::create_with_grocery_list(state.db(), request.into(), &state.consolidator)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateMealPlanResponse {
            id: created.meal_plan.meal_plan_id,
            grocery_list_id: created.grocery_list.grocery_list_id,
            warnings: created.warnings,
        }),
    ))
}

#[axum_macros::debug_handler]
pub async fn delete_meal_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ResponseResult<impl IntoResponse> {
    let deleted = MealPlan::delete(state.db(), id)
        .await
        .context("Failed to delete meal plan")?;

    if !deleted {
        return Err(eyre!("Meal plan {id} not found")).with_status(StatusCode::NOT_FOUND);
    }

    Ok(StatusCode::NO_CONTENT)
}
