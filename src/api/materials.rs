use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use obra_core::models::*;

use super::{ApiJson, ApiPath, ApiResult, AppState, AuthUser};

#[derive(Debug, Serialize)]
pub struct SubmittedResponse {
    pub message: &'static str,
    pub solicitudes: Vec<MaterialRequest>,
}

pub async fn catalog(State(state): State<AppState>, _auth: AuthUser) -> ApiResult<Json<Vec<Material>>> {
    Ok(Json(state.db.list_materials()?))
}

pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<SubmitMaterialsInput>,
) -> ApiResult<(StatusCode, Json<SubmittedResponse>)> {
    let solicitudes = state.db.submit_materials(input, &auth.actor())?;
    Ok((
        StatusCode::CREATED,
        Json(SubmittedResponse {
            message: "Materiales solicitados exitosamente",
            solicitudes,
        }),
    ))
}

pub async fn for_worksite(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(obra_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<MaterialRequest>>> {
    Ok(Json(state.db.list_material_requests(obra_id, &auth.actor())?))
}

pub async fn review(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ReviewRequestInput>,
) -> ApiResult<Json<MaterialRequest>> {
    Ok(Json(state.db.review_material_request(id, input, &auth.actor())?))
}
