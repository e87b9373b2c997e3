use std::collections::HashSet;

use rusqlite::{params, OptionalExtension, Row};

use super::worksites::authorize_worksite;
use super::{enum_col, fmt_ts, now, ts_col, Database};
use crate::error::{Error, Result};
use crate::models::*;

const REQUEST_SELECT: &str = "SELECT om.id, om.obra_id, om.material_id, om.usuario_id,
        m.nombre, m.unidad, om.cantidad_solicitada, om.cantidad_aprobada, om.estado, om.created_at
    FROM obra_materiales om
    JOIN materiales m ON om.material_id = m.id";

fn row_to_request(row: &Row<'_>) -> rusqlite::Result<MaterialRequest> {
    Ok(MaterialRequest {
        id: row.get(0)?,
        obra_id: row.get(1)?,
        material_id: row.get(2)?,
        usuario_id: row.get(3)?,
        nombre: row.get(4)?,
        unidad: row.get(5)?,
        cantidad_solicitada: row.get(6)?,
        cantidad_aprobada: row.get(7)?,
        estado: enum_col(row, 8, RequestStatus::from_str)?,
        created_at: ts_col(row, 9)?,
    })
}

impl Database {
    pub fn list_materials(&self) -> Result<Vec<Material>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, nombre, unidad, precio_unitario, stock_disponible FROM materiales ORDER BY nombre",
        )?;
        let materials = stmt
            .query_map([], |row| {
                Ok(Material {
                    id: row.get(0)?,
                    nombre: row.get(1)?,
                    unidad: row.get(2)?,
                    precio_unitario: row.get(3)?,
                    stock_disponible: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(materials)
    }

    /// Records a material request as one unit: either every line is stored or none.
    pub fn submit_materials(
        &self,
        input: SubmitMaterialsInput,
        actor: &Actor,
    ) -> Result<Vec<MaterialRequest>> {
        if input.materiales.is_empty() {
            return Err(Error::validation("la solicitud debe incluir al menos un material"));
        }
        if input.materiales.iter().any(|line| line.cantidad <= 0) {
            return Err(Error::validation("las cantidades deben ser mayores que cero"));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        authorize_worksite(&tx, input.obra_id, actor)?;

        let known: HashSet<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM materiales")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<HashSet<i64>>>()?;
            ids
        };
        if let Some(line) = input.materiales.iter().find(|l| !known.contains(&l.material_id)) {
            return Err(Error::validation(format!(
                "material {} no existe",
                line.material_id
            )));
        }

        let ts = fmt_ts(now());
        let mut ids = Vec::with_capacity(input.materiales.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO obra_materiales (obra_id, material_id, usuario_id, cantidad_solicitada, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for line in &input.materiales {
                stmt.execute(params![input.obra_id, line.material_id, actor.user_id, line.cantidad, ts])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        let mut requests = Vec::with_capacity(ids.len());
        {
            let mut stmt = tx.prepare(&format!("{REQUEST_SELECT} WHERE om.id = ?1"))?;
            for id in ids {
                requests.push(stmt.query_row([id], row_to_request)?);
            }
        }
        tx.commit()?;

        tracing::info!(
            obra_id = input.obra_id,
            user_id = actor.user_id,
            lineas = requests.len(),
            "Material request submitted"
        );
        Ok(requests)
    }

    /// Material request lines of a worksite, newest first.
    pub fn list_material_requests(&self, obra_id: i64, actor: &Actor) -> Result<Vec<MaterialRequest>> {
        let conn = self.conn();
        authorize_worksite(&conn, obra_id, actor)?;
        let mut stmt = conn.prepare(&format!(
            "{REQUEST_SELECT} WHERE om.obra_id = ?1 ORDER BY om.created_at DESC, om.id DESC"
        ))?;
        let requests = stmt
            .query_map([obra_id], row_to_request)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requests)
    }

    /// Approves or rejects one request line. Has no effect on worksite progress.
    pub fn review_material_request(
        &self,
        id: i64,
        input: ReviewRequestInput,
        actor: &Actor,
    ) -> Result<MaterialRequest> {
        if !actor.has_any_role(&[Role::Admin, Role::SiteSupervisor]) {
            return Err(Error::Forbidden);
        }
        if input.cantidad_aprobada.is_some_and(|q| q < 0) {
            return Err(Error::validation("la cantidad aprobada no puede ser negativa"));
        }

        let conn = self.conn();
        let requested: i64 = conn
            .query_row(
                "SELECT cantidad_solicitada FROM obra_materiales WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(Error::NotFound("solicitud"))?;

        let approved = match input.estado {
            RequestStatus::Approved => input.cantidad_aprobada.unwrap_or(requested),
            RequestStatus::Rejected | RequestStatus::Pending => input.cantidad_aprobada.unwrap_or(0),
        };
        conn.execute(
            "UPDATE obra_materiales SET estado = ?1, cantidad_aprobada = ?2 WHERE id = ?3",
            params![input.estado.as_str(), approved, id],
        )?;
        tracing::info!(solicitud_id = id, estado = input.estado.as_str(), approved, "Material request reviewed");
        let request = conn.query_row(&format!("{REQUEST_SELECT} WHERE om.id = ?1"), [id], row_to_request)?;
        Ok(request)
    }
}
