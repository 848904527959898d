//! Model definition routes: publish, discovery, lookup.

use crate::handlers::models::{get as get_model, list, publish};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn model_routes(state: AppState) -> Router {
    Router::new()
        .route("/models", get(list).post(publish))
        .route("/models/:name", get(get_model))
        .with_state(state)
}
