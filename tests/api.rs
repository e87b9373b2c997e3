use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use obra::api::create_router;
use obra::models::*;
use obra_core::{Database, PhotoStore};

struct TestApp {
    server: TestServer,
    db: Database,
    admin: String,
    worker: String,
    stranger: String,
    obra: i64,
    _dir: TempDir,
}

fn create_user(db: &Database, username: &str, rol: Role) -> User {
    db.create_user(CreateUserInput {
        username: username.into(),
        email: format!("{username}@obra.test"),
        password: "secreto".into(),
        nombre: username.into(),
        apellido: "Test".into(),
        rol,
    })
    .unwrap()
}

async fn login(server: &TestServer, username: &str, password: &str) -> String {
    let res = server
        .post("/api/auth/login")
        .json(&json!({ "username": username, "password": password }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    res.json::<Value>()["token"].as_str().unwrap().to_string()
}

async fn setup() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    db.seed_admin("admin123").unwrap();
    let worker = create_user(&db, "juan", Role::FieldWorker);
    create_user(&db, "pedro", Role::FieldWorker);
    let obra = db
        .create_worksite(CreateWorksiteInput {
            nombre: "Casa Norte".into(),
            ubicacion: "Calle 1".into(),
            latitud: None,
            longitud: None,
            descripcion: None,
            albanil_asignado: worker.id,
            jefe_obra: None,
        })
        .unwrap()
        .id;

    let photos = PhotoStore::open(dir.path().join("fotos")).unwrap();
    let server = TestServer::new(create_router(db.clone(), photos)).unwrap();
    let admin = login(&server, "admin", "admin123").await;
    let worker = login(&server, "juan", "secreto").await;
    let stranger = login(&server, "pedro", "secreto").await;

    TestApp {
        server,
        db,
        admin,
        worker,
        stranger,
        obra,
        _dir: dir,
    }
}

fn photo_form(tipo: &str) -> MultipartForm {
    MultipartForm::new().add_text("tipo", tipo.to_string()).add_part(
        "foto",
        Part::bytes(b"\xff\xd8\xff\xe0fake-jpeg".to_vec())
            .file_name("captura.jpg")
            .mime_type("image/jpeg"),
    )
}

async fn upload_photos(app: &TestApp, tipo: &str, n: usize) {
    for _ in 0..n {
        let res = app
            .server
            .post(&format!("/api/obras/{}/fotos", app.obra))
            .authorization_bearer(&app.worker)
            .multipart(photo_form(tipo))
            .await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
    }
}

async fn complete(app: &TestApp, token: &str, paso: i64) -> axum_test::TestResponse {
    app.server
        .post(&format!("/api/progreso/obra/{}/paso/{}", app.obra, paso))
        .authorization_bearer(token)
        .json(&json!({ "comentarios": null }))
        .await
}

async fn estado(app: &TestApp) -> String {
    let res = app
        .server
        .get(&format!("/api/obras/{}", app.obra))
        .authorization_bearer(&app.admin)
        .await;
    res.json::<Value>()["estado"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_needs_no_auth() {
    let app = setup().await;
    let res = app.server.get("/api/health").await;
    assert_eq!(res.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = setup().await;
    let res = app.server.get("/api/obras").await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert!(res.json::<Value>()["error"].is_string());

    let res = app.server.get("/api/obras").authorization_bearer("bogus").await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_and_verify() {
    let app = setup().await;
    let res = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "juan", "password": "mal" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);

    let res = app.server.get("/api/auth/verify").authorization_bearer(&app.worker).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["user"]["rol"], "albanil");

    let res = app.server.post("/api/auth/logout").authorization_bearer(&app.worker).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let res = app.server.get("/api/auth/verify").authorization_bearer(&app.worker).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn progress_is_initialized_and_scoped() {
    let app = setup().await;
    let res = app
        .server
        .get(&format!("/api/progreso/obra/{}", app.obra))
        .authorization_bearer(&app.worker)
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let rows = res.json::<Vec<StepProgress>>();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| !r.completado));

    let res = app
        .server
        .get(&format!("/api/progreso/obra/{}", app.obra))
        .authorization_bearer(&app.stranger)
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>()["error"], "no tienes acceso a esta obra");

    let res = complete(&app, &app.stranger, 1).await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn out_of_order_step_names_the_blocking_step() {
    let app = setup().await;
    let res = complete(&app, &app.worker, 2).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>()["error"],
        "debes completar el paso 1 antes de continuar"
    );

    let res = complete(&app, &app.admin, 7).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn photo_minimum_is_checked_by_the_server() {
    let app = setup().await;
    upload_photos(&app, "inicio", 1).await;
    let res = complete(&app, &app.worker, 1).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    upload_photos(&app, "inicio", 1).await;
    let res = complete(&app, &app.worker, 1).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let body = res.json::<Value>();
    assert_eq!(body["paso"], 1);
    assert_eq!(body["already_completed"], false);
    assert_eq!(estado(&app).await, "en_progreso");
}

#[tokio::test]
async fn completing_twice_is_a_no_op() {
    let app = setup().await;
    upload_photos(&app, "inicio", 2).await;
    assert_eq!(complete(&app, &app.worker, 1).await.status_code(), StatusCode::OK);
    let res = complete(&app, &app.worker, 1).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["already_completed"], true);
}

#[tokio::test]
async fn complete_step_accepts_an_empty_body() {
    let app = setup().await;
    upload_photos(&app, "inicio", 2).await;
    let res = app
        .server
        .post(&format!("/api/progreso/obra/{}/paso/1", app.obra))
        .authorization_bearer(&app.worker)
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_parameters_are_json_errors() {
    let app = setup().await;
    let res = app
        .server
        .post(&format!("/api/progreso/obra/{}/paso/abc", app.obra))
        .authorization_bearer(&app.worker)
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert!(res.json::<Value>()["error"].is_string());

    let res = app
        .server
        .get("/api/progreso/obra/xyz")
        .authorization_bearer(&app.worker)
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert!(res.json::<Value>()["error"].is_string());

    let res = app
        .server
        .post(&format!("/api/progreso/obra/{}/paso/1", app.obra))
        .authorization_bearer(&app.worker)
        .bytes("{not json".into())
        .content_type("application/json")
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert!(res.json::<Value>()["error"].is_string());

    let res = app
        .server
        .put(&format!("/api/obras/{}/estado", app.obra))
        .authorization_bearer(&app.admin)
        .json(&json!({ "estado": "terminada" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert!(res.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn validate_step_reports_the_blocker() {
    let app = setup().await;
    let res = app
        .server
        .get(&format!("/api/progreso/obra/{}/validar-paso/2", app.obra))
        .authorization_bearer(&app.worker)
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let body = res.json::<Value>();
    assert_eq!(body["puede_acceder"], false);
    assert_eq!(body["paso_bloqueante"], 1);

    let res = app
        .server
        .get(&format!("/api/progreso/obra/{}/validar-paso/1", app.obra))
        .authorization_bearer(&app.worker)
        .await;
    assert_eq!(res.json::<Value>()["puede_acceder"], true);
}

#[tokio::test]
async fn full_workflow_completes_the_worksite() {
    let app = setup().await;
    upload_photos(&app, "inicio", 2).await;
    upload_photos(&app, "final", 2).await;
    for paso in 1..=4 {
        assert_eq!(complete(&app, &app.worker, paso).await.status_code(), StatusCode::OK);
    }
    let rows = app
        .server
        .get(&format!("/api/progreso/obra/{}", app.obra))
        .authorization_bearer(&app.worker)
        .await
        .json::<Vec<StepProgress>>();
    assert!(rows.iter().all(|r| r.completado));
    assert_eq!(estado(&app).await, "completada");

    let stats = app
        .server
        .get("/api/obras/stats/resumen")
        .authorization_bearer(&app.admin)
        .await
        .json::<WorksiteStats>();
    assert_eq!(stats.completadas, 1);
}

#[tokio::test]
async fn status_override_is_limited() {
    let app = setup().await;
    let path = format!("/api/obras/{}/estado", app.obra);

    let res = app
        .server
        .put(&path)
        .authorization_bearer(&app.worker)
        .json(&json!({ "estado": "cancelada" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let res = app
        .server
        .put(&path)
        .authorization_bearer(&app.admin)
        .json(&json!({ "estado": "en_progreso" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::CONFLICT);

    let res = app
        .server
        .put(&path)
        .authorization_bearer(&app.admin)
        .json(&json!({ "estado": "cancelada" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["estado"], "cancelada");

    upload_photos(&app, "inicio", 2).await;
    assert_eq!(complete(&app, &app.worker, 1).await.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn two_step_upload_and_metadata() {
    let app = setup().await;
    let form = MultipartForm::new().add_part(
        "foto",
        Part::bytes(b"png".to_vec())
            .file_name("a.png")
            .mime_type("image/png"),
    );
    let res = app
        .server
        .post("/api/upload-foto")
        .authorization_bearer(&app.worker)
        .multipart(form)
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let filename = res.json::<Value>()["filename"].as_str().unwrap().to_string();
    assert!(filename.ends_with(".png"));

    let res = app
        .server
        .post("/api/fotos")
        .authorization_bearer(&app.worker)
        .json(&json!({ "obra_id": app.obra, "filename": filename, "tipo": "inicio", "descripcion": "Foto de inicio" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);

    let res = app
        .server
        .post("/api/fotos")
        .authorization_bearer(&app.worker)
        .json(&json!({ "obra_id": app.obra, "filename": "foto-nada.jpg", "tipo": "inicio" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let res = app
        .server
        .get(&format!("/api/obras/{}", app.obra))
        .authorization_bearer(&app.worker)
        .await;
    assert_eq!(res.json::<Value>()["fotos"].as_array().unwrap().len(), 1);
}

async fn stage_photo(app: &TestApp, token: &str) -> String {
    let form = MultipartForm::new().add_part(
        "foto",
        Part::bytes(b"\xff\xd8\xff\xe0jpeg".to_vec())
            .file_name("a.jpg")
            .mime_type("image/jpeg"),
    );
    let res = app
        .server
        .post("/api/upload-foto")
        .authorization_bearer(token)
        .multipart(form)
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    res.json::<Value>()["filename"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn one_upload_counts_once_toward_the_minimum() {
    let app = setup().await;
    let filename = stage_photo(&app, &app.worker).await;
    let body = json!({ "obra_id": app.obra, "filename": filename, "tipo": "inicio" });

    let res = app
        .server
        .post("/api/fotos")
        .authorization_bearer(&app.worker)
        .json(&body)
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    let res = app
        .server
        .post("/api/fotos")
        .authorization_bearer(&app.worker)
        .json(&body)
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let res = complete(&app, &app.worker, 1).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(estado(&app).await, "pendiente");
}

#[tokio::test]
async fn uploads_cannot_be_claimed_by_another_user() {
    let app = setup().await;
    let filename = stage_photo(&app, &app.admin).await;
    let res = app
        .server
        .post("/api/fotos")
        .authorization_bearer(&app.worker)
        .json(&json!({ "obra_id": app.obra, "filename": filename, "tipo": "inicio" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_images_are_rejected() {
    let app = setup().await;
    let form = MultipartForm::new().add_part(
        "foto",
        Part::bytes(b"hola".to_vec())
            .file_name("notas.txt")
            .mime_type("text/plain"),
    );
    let res = app
        .server
        .post("/api/upload-foto")
        .authorization_bearer(&app.worker)
        .multipart(form)
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn material_requests() {
    let app = setup().await;
    let catalog = app
        .server
        .get("/api/materiales")
        .authorization_bearer(&app.worker)
        .await
        .json::<Vec<Material>>();
    assert_eq!(catalog.len(), 6);
    let cemento = catalog.iter().find(|m| m.nombre == "Cemento").unwrap().id;

    let res = app
        .server
        .post("/api/materiales/solicitar")
        .authorization_bearer(&app.worker)
        .json(&json!({ "obra_id": app.obra, "materiales": [] }))
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let res = app
        .server
        .post("/api/materiales/solicitar")
        .authorization_bearer(&app.worker)
        .json(&json!({ "obra_id": app.obra, "materiales": [{ "material_id": cemento, "cantidad": 10 }] }))
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    let request_id = res.json::<Value>()["solicitudes"][0]["id"].as_i64().unwrap();

    let res = app
        .server
        .put(&format!("/api/materiales/solicitud/{request_id}"))
        .authorization_bearer(&app.worker)
        .json(&json!({ "estado": "aprobado" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let res = app
        .server
        .put(&format!("/api/materiales/solicitud/{request_id}"))
        .authorization_bearer(&app.admin)
        .json(&json!({ "estado": "aprobado" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["cantidad_aprobada"], 10);

    // Approval does not touch worksite progress.
    assert_eq!(estado(&app).await, "pendiente");
}

#[tokio::test]
async fn chat_is_scoped_to_the_worksite() {
    let app = setup().await;
    let path = format!("/api/chat/obra/{}", app.obra);
    let res = app
        .server
        .post(&path)
        .authorization_bearer(&app.worker)
        .json(&json!({ "mensaje": "Llegué a la obra" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);

    let res = app
        .server
        .post(&path)
        .authorization_bearer(&app.stranger)
        .json(&json!({ "mensaje": "hola" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let messages = app
        .server
        .get(&path)
        .authorization_bearer(&app.admin)
        .await
        .json::<Vec<Message>>();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].rol, Role::FieldWorker);
}

#[tokio::test]
async fn user_management_is_admin_only() {
    let app = setup().await;
    let res = app.server.get("/api/usuarios").authorization_bearer(&app.worker).await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let body = json!({
        "username": "juan",
        "email": "otro@obra.test",
        "password": "x",
        "nombre": "Juan",
        "apellido": "Dup",
        "rol": "albanil"
    });
    let res = app
        .server
        .post("/api/usuarios")
        .authorization_bearer(&app.admin)
        .json(&body)
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let workers = app
        .server
        .get("/api/usuarios/albaniles")
        .authorization_bearer(&app.admin)
        .await
        .json::<Vec<UserSummary>>();
    assert_eq!(workers.len(), 2);

    let pedro = app.db.get_user_by_username("pedro").unwrap().unwrap();
    let res = app
        .server
        .put(&format!("/api/usuarios/{}/desactivar", pedro.id))
        .authorization_bearer(&app.admin)
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let res = app.server.get("/api/obras").authorization_bearer(&app.stranger).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn worksite_crud_is_admin_only() {
    let app = setup().await;
    let juan = app.db.get_user_by_username("juan").unwrap().unwrap();
    let body = json!({
        "nombre": "Local",
        "ubicacion": "Centro",
        "albanil_asignado": juan.id
    });
    let res = app
        .server
        .post("/api/obras")
        .authorization_bearer(&app.worker)
        .json(&body)
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let res = app
        .server
        .post("/api/obras")
        .authorization_bearer(&app.admin)
        .json(&body)
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    let id = res.json::<Value>()["id"].as_i64().unwrap();

    let mine = app
        .server
        .get("/api/obras")
        .authorization_bearer(&app.worker)
        .await
        .json::<Vec<Worksite>>();
    assert_eq!(mine.len(), 2);
    let theirs = app
        .server
        .get("/api/obras")
        .authorization_bearer(&app.stranger)
        .await
        .json::<Vec<Worksite>>();
    assert!(theirs.is_empty());

    let res = app
        .server
        .delete(&format!("/api/obras/{id}"))
        .authorization_bearer(&app.admin)
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let res = app
        .server
        .get(&format!("/api/obras/{id}"))
        .authorization_bearer(&app.admin)
        .await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}
