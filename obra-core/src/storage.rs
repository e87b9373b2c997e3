//! On-disk storage for uploaded photo files.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::db::{is_safe_filename, Database};
use crate::error::{Error, Result};
use crate::models::{Actor, CreatePhotoInput, Photo};

/// Largest accepted photo upload.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "heic"];

#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    /// Opens (creating if needed) a photo directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes an image and returns its server-assigned filename.
    pub fn save(&self, bytes: &[u8], original_name: Option<&str>, content_type: Option<&str>) -> Result<String> {
        if !content_type.is_some_and(|ct| ct.starts_with("image/")) {
            return Err(Error::validation("solo se permiten archivos de imagen"));
        }
        if bytes.is_empty() {
            return Err(Error::validation("no se subió ninguna foto"));
        }
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(Error::validation("la foto supera el tamaño máximo de 5MB"));
        }

        let ext = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or_else(|| "jpg".to_string());
        let filename = format!("foto-{}.{ext}", Uuid::new_v4().simple());
        fs::write(self.dir.join(&filename), bytes)?;
        tracing::debug!(bytes = bytes.len(), "Stored photo {}", filename);
        Ok(filename)
    }

    pub fn exists(&self, filename: &str) -> bool {
        is_safe_filename(filename) && self.dir.join(filename).is_file()
    }

    /// Removes a stored file. Missing files are not an error.
    pub fn remove(&self, filename: &str) -> Result<()> {
        if !is_safe_filename(filename) {
            return Err(Error::validation("nombre de archivo inválido"));
        }
        match fs::remove_file(self.dir.join(filename)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores an image that `actor` will record later with [`PhotoStore::record`].
    pub fn stage(
        &self,
        db: &Database,
        bytes: &[u8],
        original_name: Option<&str>,
        content_type: Option<&str>,
        actor: &Actor,
    ) -> Result<String> {
        let filename = self.save(bytes, original_name, content_type)?;
        if let Err(err) = db.register_upload(&filename, actor) {
            self.discard(&filename);
            return Err(err);
        }
        Ok(filename)
    }

    /// Records metadata for a file the same user staged earlier.
    pub fn record(&self, db: &Database, input: CreatePhotoInput, actor: &Actor) -> Result<Photo> {
        if !self.exists(&input.filename) {
            return Err(Error::validation("la foto referenciada no existe"));
        }
        db.claim_upload(input, actor)
    }

    fn discard(&self, filename: &str) {
        if let Err(cleanup) = self.remove(filename) {
            tracing::error!(error = %cleanup, "Could not remove orphaned photo {}", filename);
        }
    }

    /// Stores the file and its record as one unit: if the record cannot be
    /// created the stored file is removed again.
    pub fn upload(
        &self,
        db: &Database,
        bytes: &[u8],
        original_name: Option<&str>,
        content_type: Option<&str>,
        mut input: CreatePhotoInput,
        actor: &Actor,
    ) -> Result<Photo> {
        // Check access before touching the disk.
        db.get_worksite(input.obra_id, actor)?;
        input.filename = self.save(bytes, original_name, content_type)?;

        match db.create_photo(input.clone(), actor) {
            Ok(photo) => Ok(photo),
            Err(err) => {
                tracing::warn!(error = %err, "Photo record failed, removing {}", input.filename);
                self.discard(&input.filename);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateUserInput, CreateWorksiteInput, PhotoCategory, Role};

    fn setup() -> (tempfile::TempDir, PhotoStore, Database, Actor, i64) {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path().join("fotos")).unwrap();
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let worker = db
            .create_user(CreateUserInput {
                username: "juan".into(),
                email: "juan@obra.test".into(),
                password: "pw".into(),
                nombre: "Juan".into(),
                apellido: "Pérez".into(),
                rol: Role::FieldWorker,
            })
            .unwrap();
        let obra = db
            .create_worksite(CreateWorksiteInput {
                nombre: "Casa".into(),
                ubicacion: "Calle 1".into(),
                latitud: None,
                longitud: None,
                descripcion: None,
                albanil_asignado: worker.id,
                jefe_obra: None,
            })
            .unwrap();
        (dir, store, db, Actor::new(worker.id, Role::FieldWorker), obra.id)
    }

    fn input(obra_id: i64) -> CreatePhotoInput {
        CreatePhotoInput {
            obra_id,
            filename: String::new(),
            tipo: PhotoCategory::Start,
            descripcion: Some("Foto de inicio".into()),
        }
    }

    #[test]
    fn save_rejects_non_images() {
        let (_dir, store, ..) = setup();
        let err = store.save(b"hello", Some("a.txt"), Some("text/plain")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn save_assigns_unique_names_and_keeps_extension() {
        let (_dir, store, ..) = setup();
        let a = store.save(b"img", Some("IMG_1.PNG"), Some("image/png")).unwrap();
        let b = store.save(b"img", Some("IMG_1.PNG"), Some("image/png")).unwrap();
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
        assert!(store.exists(&a));
    }

    #[test]
    fn record_requires_existing_file() {
        let (_dir, store, db, worker, obra) = setup();
        let mut meta = input(obra);
        meta.filename = "foto-missing.jpg".into();
        assert!(matches!(store.record(&db, meta, &worker), Err(Error::Validation(_))));
    }

    #[test]
    fn staged_upload_is_recorded_once() {
        let (_dir, store, db, worker, obra) = setup();
        let filename = store
            .stage(&db, b"jpeg", Some("x.jpg"), Some("image/jpeg"), &worker)
            .unwrap();
        let mut meta = input(obra);
        meta.filename = filename;
        store.record(&db, meta.clone(), &worker).unwrap();
        assert!(matches!(store.record(&db, meta, &worker), Err(Error::Validation(_))));
        assert_eq!(db.count_photos(obra, PhotoCategory::Start).unwrap(), 1);
    }

    #[test]
    fn staged_upload_belongs_to_its_uploader() {
        let (_dir, store, db, worker, obra) = setup();
        let admin = db
            .create_user(CreateUserInput {
                username: "jefa".into(),
                email: "jefa@obra.test".into(),
                password: "pw".into(),
                nombre: "Ana".into(),
                apellido: "Ruiz".into(),
                rol: Role::Admin,
            })
            .unwrap();
        let filename = store
            .stage(&db, b"jpeg", Some("x.jpg"), Some("image/jpeg"), &Actor::new(admin.id, Role::Admin))
            .unwrap();
        let mut meta = input(obra);
        meta.filename = filename;
        assert!(matches!(store.record(&db, meta, &worker), Err(Error::Validation(_))));
        assert_eq!(db.count_photos(obra, PhotoCategory::Start).unwrap(), 0);
    }

    #[test]
    fn upload_stores_file_and_record() {
        let (_dir, store, db, worker, obra) = setup();
        let photo = store
            .upload(&db, b"jpeg", Some("x.jpg"), Some("image/jpeg"), input(obra), &worker)
            .unwrap();
        assert!(store.exists(&photo.filename));
        assert_eq!(db.count_photos(obra, PhotoCategory::Start).unwrap(), 1);
    }

    #[test]
    fn failed_record_removes_stored_file() {
        let (_dir, store, db, worker, obra) = setup();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_fotos BEFORE INSERT ON fotos
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();
        let err = store
            .upload(&db, b"jpeg", Some("x.jpg"), Some("image/jpeg"), input(obra), &worker)
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
    }
}
