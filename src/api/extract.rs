//! Extractors whose rejections render as `{"error": message}` like every
//! other handler error.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Multipart, OptionalFromRequest, Path, Request};
use axum::http::request::Parts;
use axum::Json;

use super::ApiError;

/// JSON request body.
pub struct ApiJson<T>(pub T);

/// URL path parameters.
pub struct ApiPath<T>(pub T);

/// Multipart form body.
pub struct ApiMultipart(pub Multipart);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("cuerpo JSON inválido: {}", e.body_text())))?;
        Ok(Self(value))
    }
}

impl<S, T> OptionalFromRequest<S> for ApiJson<T>
where
    Json<T>: OptionalFromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let value = <Json<T> as OptionalFromRequest<S>>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("cuerpo JSON inválido: {}", e.body_text())))?;
        Ok(value.map(|Json(value)| Self(value)))
    }
}

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("parámetro de ruta inválido: {}", e.body_text())))?;
        Ok(Self(value))
    }
}

impl<S> FromRequest<S> for ApiMultipart
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = <Multipart as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(|e: MultipartRejection| ApiError::bad_request(e.body_text()))?;
        Ok(Self(multipart))
    }
}
