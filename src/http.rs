//! Thin HTTP front door: `GET`/`PUT`/`POST`/`DELETE /id/{id}` plus
//! `GET /status`, built on axum the way `velesdb-server` builds its REST API
//! over `velesdb-core` — no invariants live here, only status-code mapping.

use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::error::StoreError;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

pub fn router(store: Arc<Store>) -> Router {
    Router::new()
        .route("/id/{id}", get(get_needle).put(put_needle).post(put_needle).delete(delete_needle))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

fn store_error_to_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::ReadOnly => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn get_needle(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> impl IntoResponse {
    let id = match id.parse::<u64>() {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, "id must be a base-10 u64".to_string()).into_response(),
    };

    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || store.read(id))
        .await
        .expect("blocking read task panicked");

    match result {
        Ok(Some(data)) => (StatusCode::OK, data).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "not found".to_string()).into_response(),
        Err(e) => (store_error_to_status(&e), e.to_string()).into_response(),
    }
}

async fn put_needle(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let id = match id.parse::<u64>() {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, "id must be a base-10 u64".to_string()).into_response(),
    };

    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || store.write(id, &body))
        .await
        .expect("blocking write task panicked");

    match result {
        Ok(_) => (StatusCode::OK, "OK".to_string()).into_response(),
        Err(e) => (store_error_to_status(&e), e.to_string()).into_response(),
    }
}

async fn delete_needle(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> impl IntoResponse {
    let id = match id.parse::<u64>() {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, "id must be a base-10 u64".to_string()).into_response(),
    };

    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || store.delete(id))
        .await
        .expect("blocking delete task panicked");

    match result {
        Ok(()) => (StatusCode::OK, "OK".to_string()).into_response(),
        Err(e) => (store_error_to_status(&e), e.to_string()).into_response(),
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.delegate().node_meta(4096) {
        Ok(bytes) => {
            let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
            Json(value).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
