//! REST API over the worksite stores and the progress gate.

mod auth;
mod chat;
mod error;
mod extract;
mod materials;
mod photos;
mod progress;
mod users;
mod worksites;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use obra_core::storage::MAX_PHOTO_BYTES;
use obra_core::{Database, PhotoStore};

pub use auth::AuthUser;
pub use error::{ApiError, ApiResult};
pub use extract::{ApiJson, ApiMultipart, ApiPath};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub photos: PhotoStore,
}

/// Multipart framing on top of the largest accepted photo.
const BODY_LIMIT: usize = MAX_PHOTO_BYTES + 64 * 1024;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn create_router(db: Database, photos: PhotoStore) -> Router {
    let uploads = ServeDir::new(photos.dir());
    let state = AppState { db, photos };

    Router::new()
        .route("/api/health", get(health))
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/auth/logout", post(auth::logout))
        // Worksites
        .route("/api/obras", get(worksites::list).post(worksites::create))
        .route("/api/obras/stats/resumen", get(worksites::stats))
        .route("/api/obras/albanil/{worker_id}", get(worksites::by_worker))
        .route(
            "/api/obras/{id}",
            get(worksites::get)
                .put(worksites::update)
                .delete(worksites::delete),
        )
        .route("/api/obras/{id}/estado", put(worksites::set_status))
        .route("/api/obras/{id}/fotos", post(photos::upload_for_worksite))
        // Progress gate
        .route("/api/progreso/obra/{id}", get(progress::get_progress))
        .route("/api/progreso/obra/{id}/paso/{paso}", post(progress::complete_step))
        .route(
            "/api/progreso/obra/{id}/validar-paso/{paso}",
            get(progress::validate_step),
        )
        // Photos
        .route("/api/upload-foto", post(photos::upload))
        .route("/api/fotos", post(photos::create))
        .route("/api/fotos/obra/{id}", get(photos::list))
        .route("/api/fotos/{id}", axum::routing::delete(photos::delete))
        // Materials
        .route("/api/materiales", get(materials::catalog))
        .route("/api/materiales/solicitar", post(materials::submit))
        .route("/api/materiales/obra/{id}", get(materials::for_worksite))
        .route("/api/materiales/solicitud/{id}", put(materials::review))
        // Chat
        .route("/api/chat/obra/{id}", get(chat::list).post(chat::post))
        // Users
        .route("/api/usuarios", get(users::list).post(users::create))
        .route("/api/usuarios/albaniles", get(users::field_workers))
        .route("/api/usuarios/jefes-obra", get(users::supervisors))
        .route("/api/usuarios/{id}/desactivar", put(users::deactivate))
        .nest_service("/uploads/fotos", uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .with_state(state)
}
