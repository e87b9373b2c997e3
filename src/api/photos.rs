use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use obra_core::models::*;

use super::{ApiError, ApiJson, ApiMultipart, ApiPath, ApiResult, AppState, AuthUser};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub filename: String,
    pub path: String,
}

#[derive(Debug, Default)]
struct PhotoForm {
    bytes: Option<Vec<u8>>,
    file_name: Option<String>,
    content_type: Option<String>,
    tipo: Option<String>,
    descripcion: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<PhotoForm> {
    let mut form = PhotoForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "foto" => {
                form.file_name = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                form.bytes = Some(bytes.to_vec());
            }
            "tipo" | "descripcion" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                if name == "tipo" {
                    form.tipo = Some(text);
                } else {
                    form.descripcion = Some(text).filter(|d| !d.trim().is_empty());
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Stores an image and returns its server-assigned filename.
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<Json<UploadResponse>> {
    let form = read_form(multipart).await?;
    let bytes = form
        .bytes
        .ok_or_else(|| ApiError::bad_request("no se subió ninguna foto"))?;
    let filename = state.photos.stage(
        &state.db,
        &bytes,
        form.file_name.as_deref(),
        form.content_type.as_deref(),
        &auth.actor(),
    )?;
    Ok(Json(UploadResponse {
        message: "Foto subida exitosamente",
        path: format!("/uploads/fotos/{filename}"),
        filename,
    }))
}

/// Records metadata for a file the caller stored with [`upload`].
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<CreatePhotoInput>,
) -> ApiResult<(StatusCode, Json<Photo>)> {
    let photo = state.photos.record(&state.db, input, &auth.actor())?;
    Ok((StatusCode::CREATED, Json(photo)))
}

/// Uploads a photo and records it in one request.
pub async fn upload_for_worksite(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(obra_id): ApiPath<i64>,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<(StatusCode, Json<Photo>)> {
    let form = read_form(multipart).await?;
    let bytes = form
        .bytes
        .ok_or_else(|| ApiError::bad_request("no se subió ninguna foto"))?;
    let tipo = form
        .tipo
        .as_deref()
        .and_then(PhotoCategory::from_str)
        .ok_or_else(|| ApiError::bad_request("tipo de foto inválido"))?;

    let input = CreatePhotoInput {
        obra_id,
        filename: String::new(),
        tipo,
        descripcion: form.descripcion,
    };
    let photo = state.photos.upload(
        &state.db,
        &bytes,
        form.file_name.as_deref(),
        form.content_type.as_deref(),
        input,
        &auth.actor(),
    )?;
    Ok((StatusCode::CREATED, Json(photo)))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(obra_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Photo>>> {
    Ok(Json(state.db.list_photos(obra_id, &auth.actor())?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let photo = state.db.delete_photo(id, &auth.actor())?;
    if let Err(e) = state.photos.remove(&photo.filename) {
        tracing::warn!(error = %e, "Could not remove photo file {}", photo.filename);
    }
    Ok(Json(serde_json::json!({ "message": "Foto eliminada exitosamente" })))
}
