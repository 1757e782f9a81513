use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use color_eyre::eyre::eyre;

use super::{api, errors::ServerError};
use crate::AppState;

pub(crate) fn make_router() -> Router<AppState> {
    Router::new()
        .route("/_", get(versions))
        .nest("/api", api_routes())
        .fallback(fallback)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/recipes",
            get(api::recipes::list_recipes).post(api::recipes::create_recipe),
        )
        .route("/recipes/{id}", get(api::recipes::get_recipe))
        .route(
            "/inventory",
            get(api::inventory::list_inventory).post(api::inventory::create_inventory_item),
        )
        .route(
            "/inventory/by-category",
            get(api::inventory::inventory_by_category),
        )
        .route(
            "/inventory/{id}",
            axum::routing::patch(api::inventory::update_inventory_item)
                .delete(api::inventory::delete_inventory_item),
        )
        .route(
            "/meal-plans",
            get(api::meal_plans::list_meal_plans).post(api::meal_plans::create_meal_plan),
        )
        .route(
            "/meal-plans/{id}",
            axum::routing::delete(api::meal_plans::delete_meal_plan),
        )
        .route(
            "/grocery-lists",
            post(api::grocery_lists::regenerate_grocery_list),
        )
        .route(
            "/grocery-lists/{meal_plan_id}",
            get(api::grocery_lists::get_grocery_list),
        )
}

async fn versions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.versions)
}

async fn fallback(uri: Uri) -> ServerError {
    ServerError::new(eyre!("No route for {}", uri.path()), StatusCode::NOT_FOUND)
}
