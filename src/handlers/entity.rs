//! Entity CRUD handlers: list, create, delete.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn entity<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("no entity at /api/v1/{}", path_segment)))
}

fn body_to_map(value: Value) -> Result<HashMap<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let entity = entity(&state, &path_segment)?;
    let rows = state.crud.list(entity).await?;
    Ok(Json(rows))
}

/// No validation: fields are stored as sent, missing ones as NULL.
pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let entity = entity(&state, &path_segment)?;
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let body = body_to_map(body)?;
    let record = state.crud.create(entity, &body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let entity = entity(&state, &path_segment)?;
    state.crud.delete(entity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("no such API route: {}", uri.path()))
}
