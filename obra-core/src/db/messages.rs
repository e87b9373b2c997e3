use rusqlite::{params, Row};

use super::worksites::authorize_worksite;
use super::{enum_col, fmt_ts, now, ts_col, Database};
use crate::error::{Error, Result};
use crate::models::*;

const MESSAGE_SELECT: &str = "SELECT m.id, m.obra_id, m.usuario_id, m.mensaje,
        u.nombre, u.apellido, u.rol, m.created_at
    FROM mensajes m
    JOIN usuarios u ON m.usuario_id = u.id";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        obra_id: row.get(1)?,
        usuario_id: row.get(2)?,
        mensaje: row.get(3)?,
        nombre: row.get(4)?,
        apellido: row.get(5)?,
        rol: enum_col(row, 6, Role::from_str)?,
        created_at: ts_col(row, 7)?,
    })
}

impl Database {
    /// Chat messages of a worksite in posting order.
    pub fn list_messages(&self, obra_id: i64, actor: &Actor) -> Result<Vec<Message>> {
        let conn = self.conn();
        authorize_worksite(&conn, obra_id, actor)?;
        let mut stmt = conn.prepare(&format!(
            "{MESSAGE_SELECT} WHERE m.obra_id = ?1 ORDER BY m.created_at ASC, m.id ASC"
        ))?;
        let messages = stmt
            .query_map([obra_id], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    pub fn post_message(&self, obra_id: i64, mensaje: &str, actor: &Actor) -> Result<Message> {
        let mensaje = mensaje.trim();
        if mensaje.is_empty() {
            return Err(Error::validation("el mensaje no puede estar vacío"));
        }
        let conn = self.conn();
        authorize_worksite(&conn, obra_id, actor)?;
        conn.execute(
            "INSERT INTO mensajes (obra_id, usuario_id, mensaje, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![obra_id, actor.user_id, mensaje, fmt_ts(now())],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(obra_id, user_id = actor.user_id, "Message posted");
        let message = conn.query_row(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"), [id], row_to_message)?;
        Ok(message)
    }
}
