//! Model definition handlers: publish, discovery, single-model lookup.

use crate::config::{ModelDefinition, Role};
use crate::error::AppError;
use crate::extractors::Caller;
use crate::response::{success_many, success_one_ok, success_one_with_meta};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

/// POST /models: validate, persist, register. Admin only.
pub async fn publish(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    if caller.role != Role::Admin {
        return Err(AppError::Forbidden(format!("role {} may not publish models", caller.role)));
    }
    let definition = ModelDefinition::from_json(body)?;
    let entry = state.publisher.publish(&definition).await?;
    tracing::info!(model = %entry.name(), user = %caller.user_id, "published via api");
    let status = if entry.revision == 1 { StatusCode::CREATED } else { StatusCode::OK };
    Ok(success_one_with_meta(
        status,
        entry.definition.to_json(),
        serde_json::json!({ "revision": entry.revision }),
    ))
}

/// GET /models: every active definition, sorted by name.
pub async fn list(State(state): State<AppState>, _caller: Caller) -> impl IntoResponse {
    let mut defs = state.registry.list();
    defs.sort_by(|a, b| a.name.cmp(&b.name));
    success_many(defs.iter().map(|d| d.to_json()).collect())
}

/// GET /models/:name
pub async fn get(
    State(state): State<AppState>,
    _caller: Caller,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state
        .registry
        .lookup(&name)
        .ok_or_else(|| AppError::NotFound(format!("model {}", name)))?;
    Ok(success_one_ok(entry.definition.to_json()))
}
