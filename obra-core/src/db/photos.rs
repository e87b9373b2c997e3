use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::worksites::authorize_worksite;
use super::{enum_col, fmt_ts, is_unique_violation, now, ts_col, Database};
use crate::error::{Error, Result};
use crate::models::*;

const PHOTO_SELECT: &str = "SELECT f.id, f.obra_id, f.usuario_id, f.filename, f.tipo,
        f.descripcion, u.nombre || ' ' || u.apellido, f.created_at
    FROM fotos f
    LEFT JOIN usuarios u ON f.usuario_id = u.id";

fn row_to_photo(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        obra_id: row.get(1)?,
        usuario_id: row.get(2)?,
        filename: row.get(3)?,
        tipo: enum_col(row, 4, PhotoCategory::from_str)?,
        descripcion: row.get(5)?,
        autor: row.get(6)?,
        created_at: ts_col(row, 7)?,
    })
}

pub(crate) fn count_photos(
    conn: &Connection,
    obra_id: i64,
    category: PhotoCategory,
) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM fotos WHERE obra_id = ?1 AND tipo = ?2",
        params![obra_id, category.as_str()],
        |row| row.get(0),
    )
}

/// Stored filenames are plain names inside the uploads directory.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn insert_photo(conn: &Connection, input: &CreatePhotoInput, actor: &Actor) -> Result<Photo> {
    let inserted = conn.execute(
        "INSERT INTO fotos (obra_id, usuario_id, filename, tipo, descripcion, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            input.obra_id,
            actor.user_id,
            input.filename,
            input.tipo.as_str(),
            input.descripcion,
            fmt_ts(now())
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::validation("la foto ya está registrada"));
        }
        Err(e) => return Err(e.into()),
    }
    let id = conn.last_insert_rowid();
    tracing::info!(obra_id = input.obra_id, foto_id = id, tipo = input.tipo.as_str(), "Photo recorded");
    Ok(conn.query_row(&format!("{PHOTO_SELECT} WHERE f.id = ?1"), [id], row_to_photo)?)
}

impl Database {
    /// Records a photo whose file was just stored under a fresh name.
    pub fn create_photo(&self, input: CreatePhotoInput, actor: &Actor) -> Result<Photo> {
        if !is_safe_filename(&input.filename) {
            return Err(Error::validation("nombre de archivo inválido"));
        }
        let conn = self.conn();
        authorize_worksite(&conn, input.obra_id, actor)?;
        insert_photo(&conn, &input, actor)
    }

    /// Remembers who stored `filename` so only they can record it later.
    pub fn register_upload(&self, filename: &str, actor: &Actor) -> Result<()> {
        if !is_safe_filename(filename) {
            return Err(Error::validation("nombre de archivo inválido"));
        }
        self.conn().execute(
            "INSERT INTO subidas (filename, usuario_id, created_at) VALUES (?1, ?2, ?3)",
            params![filename, actor.user_id, fmt_ts(now())],
        )?;
        Ok(())
    }

    /// Records a file stored earlier by the same user. Each upload can be
    /// claimed once.
    pub fn claim_upload(&self, input: CreatePhotoInput, actor: &Actor) -> Result<Photo> {
        if !is_safe_filename(&input.filename) {
            return Err(Error::validation("nombre de archivo inválido"));
        }
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        authorize_worksite(&tx, input.obra_id, actor)?;
        let claimed = tx.execute(
            "DELETE FROM subidas WHERE filename = ?1 AND usuario_id = ?2",
            params![input.filename, actor.user_id],
        )?;
        if claimed == 0 {
            tracing::debug!(user_id = actor.user_id, "No pending upload {}", input.filename);
            return Err(Error::validation("la foto no está pendiente de registro para este usuario"));
        }
        let photo = insert_photo(&tx, &input, actor)?;
        tx.commit()?;
        Ok(photo)
    }

    /// Photos of a worksite, newest first.
    pub fn list_photos(&self, obra_id: i64, actor: &Actor) -> Result<Vec<Photo>> {
        let conn = self.conn();
        authorize_worksite(&conn, obra_id, actor)?;
        let mut stmt = conn.prepare(&format!(
            "{PHOTO_SELECT} WHERE f.obra_id = ?1 ORDER BY f.created_at DESC, f.id DESC"
        ))?;
        let photos = stmt
            .query_map([obra_id], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn count_photos(&self, obra_id: i64, category: PhotoCategory) -> Result<u32> {
        Ok(count_photos(&self.conn(), obra_id, category)?)
    }

    /// Removes a photo record (admin only) and returns it so the file can be removed.
    pub fn delete_photo(&self, id: i64, actor: &Actor) -> Result<Photo> {
        if actor.role != Role::Admin {
            return Err(Error::Forbidden);
        }
        let conn = self.conn();
        let photo = conn
            .query_row(&format!("{PHOTO_SELECT} WHERE f.id = ?1"), [id], row_to_photo)
            .optional()?
            .ok_or(Error::NotFound("foto"))?;
        conn.execute("DELETE FROM fotos WHERE id = ?1", [id])?;
        tracing::info!(foto_id = id, obra_id = photo.obra_id, "Photo deleted");
        Ok(photo)
    }
}
