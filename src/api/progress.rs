use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use obra_core::models::*;

use super::{ApiJson, ApiPath, ApiResult, AppState, AuthUser};

#[derive(Debug, Default, Deserialize)]
pub struct CompleteStepRequest {
    #[serde(default)]
    pub comentarios: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StepCompletedResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub completion: StepCompletion,
}

pub async fn get_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(obra_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<StepProgress>>> {
    Ok(Json(state.db.get_progress(obra_id, &auth.actor())?))
}

pub async fn complete_step(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath((obra_id, paso)): ApiPath<(i64, i64)>,
    body: Option<ApiJson<CompleteStepRequest>>,
) -> ApiResult<Json<StepCompletedResponse>> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    let completion = state
        .db
        .complete_step(obra_id, paso, req.comentarios, &auth.actor())?;
    Ok(Json(StepCompletedResponse {
        message: "Paso completado exitosamente",
        completion,
    }))
}

pub async fn validate_step(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath((obra_id, paso)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<StepAccess>> {
    Ok(Json(state.db.validate_step_access(obra_id, paso, &auth.actor())?))
}
