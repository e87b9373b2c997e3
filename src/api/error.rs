use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use obra_core::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned by every handler, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(Error::validation(msg))
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::PreconditionNotMet { .. }
            | Error::InsufficientPhotos { .. }
            | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) | Error::Io(_) | Error::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self.0 {
            Error::Database(_) | Error::Io(_) | Error::PasswordHash(_) => {
                tracing::error!(error = %self.0, "Request failed");
                "error interno del servidor".to_string()
            }
            Error::Unauthenticated => "credenciales inválidas o token requerido".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
