//! Entity CRUD routes. Paths are parameterized, so models published at runtime are served
//! without rebuilding the router; handlers resolve the model per request.

use crate::handlers::entity::{create, delete as delete_handler, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/:model", get(list).post(create))
        .route(
            "/api/:model/:id",
            get(read).put(update).patch(update).delete(delete_handler),
        )
        .with_state(state)
}
