use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::{Deserialize, Serialize};

use obra_core::models::{Actor, LoginSession, Role, User};
use obra_core::Error;

use super::{ApiError, ApiJson, ApiResult, AppState};

/// The caller, resolved from the `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user.id, self.user.rol)
    }

    /// Fails with 403 unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> ApiResult<Actor> {
        let actor = self.actor();
        if actor.has_any_role(roles) {
            Ok(actor)
        } else {
            Err(ApiError(Error::Forbidden))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError(Error::Unauthenticated))?;
        let user = state.db.authenticate(token)?;
        Ok(Self {
            user,
            token: token.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginSession>> {
    let session = state.db.login(req.username.trim(), &req.password)?;
    Ok(Json(session))
}

pub async fn verify(auth: AuthUser) -> Json<VerifyResponse> {
    Json(VerifyResponse { user: auth.user })
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<serde_json::Value>> {
    state.db.logout(&auth.token)?;
    Ok(Json(serde_json::json!({ "message": "Sesión cerrada" })))
}
