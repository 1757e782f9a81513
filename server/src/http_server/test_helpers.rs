use std::str::FromStr;

use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use bigdecimal::BigDecimal;
use db::cooking::KeyMode;
use serde::de::DeserializeOwned;
use sqlx::PgPool;

use crate::{state::AppConfig, AppState};

pub fn create_test_app(pool: PgPool) -> Router {
    create_test_app_with_key_mode(pool, KeyMode::Exact)
}

pub fn create_test_app_with_key_mode(pool: PgPool, grocery_key_mode: KeyMode) -> Router {
    let config = AppConfig {
        grocery_key_mode,
        ..AppConfig::default()
    };

    crate::http_server::routes::make_router().with_state(AppState::new(config, pool))
}

pub fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn response_body_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}
