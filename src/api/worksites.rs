use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use obra_core::models::*;

use super::{ApiJson, ApiPath, ApiResult, AppState, AuthUser};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub estado: WorksiteStatus,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
    pub obra_eliminada: String,
}

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<Worksite>>> {
    Ok(Json(state.db.list_worksites(&auth.actor())?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<CreateWorksiteInput>,
) -> ApiResult<(StatusCode, Json<Worksite>)> {
    auth.require(&[Role::Admin])?;
    let worksite = state.db.create_worksite(input)?;
    Ok((StatusCode::CREATED, Json(worksite)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<WorksiteDetail>> {
    Ok(Json(state.db.get_worksite_detail(id, &auth.actor())?))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdateWorksiteInput>,
) -> ApiResult<Json<Worksite>> {
    auth.require(&[Role::Admin])?;
    Ok(Json(state.db.update_worksite(id, input)?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<DeletedResponse>> {
    auth.require(&[Role::Admin])?;
    let (worksite, files) = state.db.delete_worksite(id)?;
    for file in files {
        if let Err(e) = state.photos.remove(&file) {
            tracing::warn!(error = %e, "Could not remove photo {} of deleted worksite", file);
        }
    }
    Ok(Json(DeletedResponse {
        message: "Obra eliminada exitosamente",
        obra_eliminada: worksite.nombre,
    }))
}

pub async fn set_status(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Json<Worksite>> {
    Ok(Json(state.db.set_worksite_status(id, req.estado, &auth.actor())?))
}

pub async fn stats(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<WorksiteStats>> {
    auth.require(&[Role::Admin, Role::SiteSupervisor])?;
    Ok(Json(state.db.worksite_stats()?))
}

pub async fn by_worker(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(worker_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Worksite>>> {
    auth.require(&[Role::Admin, Role::SiteSupervisor])?;
    Ok(Json(state.db.list_worksites_for_worker(worker_id)?))
}
