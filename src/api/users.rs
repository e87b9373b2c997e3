use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use obra_core::models::*;
use obra_core::Error;

use super::{ApiError, ApiJson, ApiPath, ApiResult, AppState, AuthUser};

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<User>>> {
    auth.require(&[Role::Admin])?;
    Ok(Json(state.db.list_users()?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<CreateUserInput>,
) -> ApiResult<(StatusCode, Json<User>)> {
    auth.require(&[Role::Admin])?;
    Ok((StatusCode::CREATED, Json(state.db.create_user(input)?)))
}

pub async fn field_workers(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<UserSummary>>> {
    auth.require(&[Role::Admin, Role::SiteSupervisor])?;
    Ok(Json(state.db.list_active_by_role(Role::FieldWorker)?))
}

pub async fn supervisors(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<UserSummary>>> {
    auth.require(&[Role::Admin, Role::SiteSupervisor])?;
    Ok(Json(state.db.list_active_by_role(Role::SiteSupervisor)?))
}

pub async fn deactivate(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    auth.require(&[Role::Admin])?;
    if !state.db.deactivate_user(id)? {
        return Err(ApiError(Error::NotFound("usuario")));
    }
    Ok(Json(serde_json::json!({ "message": "Usuario desactivado exitosamente" })))
}
