use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use obra_core::models::*;

use super::{ApiJson, ApiPath, ApiResult, AppState, AuthUser};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(obra_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.db.list_messages(obra_id, &auth.actor())?))
}

pub async fn post(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(obra_id): ApiPath<i64>,
    ApiJson(input): ApiJson<PostMessageInput>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = state.db.post_message(obra_id, &input.mensaje, &auth.actor())?;
    Ok((StatusCode::CREATED, Json(message)))
}
