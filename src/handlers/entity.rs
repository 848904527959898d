//! Entity CRUD handlers. Each request resolves the model's current registry entry and
//! dispatches to that entry's generated handler.

use crate::error::AppError;
use crate::extractors::Caller;
use crate::registry::RegistryEntry;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{Operation, OperationInput, OperationOutput};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// Looked up per request; the returned entry stays stable for this request even if the model is redefined meanwhile.
fn entry_for(state: &AppState, model: &str) -> Result<Arc<RegistryEntry>, AppError> {
    state
        .registry
        .lookup(model)
        .ok_or_else(|| AppError::NotFound(format!("model {}", model)))
}

async fn dispatch(
    state: &AppState,
    model: &str,
    operation: Operation,
    caller: &Caller,
    input: OperationInput,
) -> Result<Response, AppError> {
    let entry = entry_for(state, model)?;
    tracing::debug!(model, %operation, user = %caller.user_id, role = %caller.role, revision = entry.revision, "dispatch");
    let out = entry.handlers.dispatch(operation, caller.role, input).await?;
    Ok(match out {
        OperationOutput::Created(row) => success_one(row).into_response(),
        OperationOutput::Row(row) => success_one_ok(row).into_response(),
        OperationOutput::Rows(rows) => success_many(rows).into_response(),
        OperationOutput::Deleted => StatusCode::NO_CONTENT.into_response(),
    })
}

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Path(model): Path<String>,
) -> Result<Response, AppError> {
    dispatch(&state, &model, Operation::ListAll, &caller, OperationInput::none()).await
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Path(model): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    dispatch(&state, &model, Operation::Create, &caller, OperationInput::with_body(body)).await
}

pub async fn read(
    State(state): State<AppState>,
    caller: Caller,
    Path((model, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    dispatch(&state, &model, Operation::GetById, &caller, OperationInput::with_id(id)).await
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path((model, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    dispatch(&state, &model, Operation::Update, &caller, OperationInput::with_id_and_body(id, body)).await
}

pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path((model, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    dispatch(&state, &model, Operation::Delete, &caller, OperationInput::with_id(id)).await
}
