use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::progress::step_flags;
use super::{enum_col, fmt_ts, now, ts_col, Database};
use crate::error::{Error, Result};
use crate::models::*;

const WORKSITE_SELECT: &str = "SELECT o.id, o.nombre, o.ubicacion, o.latitud, o.longitud,
        o.descripcion, o.estado, o.albanil_asignado, o.jefe_obra,
        u1.nombre || ' ' || u1.apellido,
        u2.nombre || ' ' || u2.apellido,
        o.created_at, o.updated_at
    FROM obras o
    LEFT JOIN usuarios u1 ON o.albanil_asignado = u1.id
    LEFT JOIN usuarios u2 ON o.jefe_obra = u2.id";

fn row_to_worksite(row: &Row<'_>) -> rusqlite::Result<Worksite> {
    Ok(Worksite {
        id: row.get(0)?,
        nombre: row.get(1)?,
        ubicacion: row.get(2)?,
        latitud: row.get(3)?,
        longitud: row.get(4)?,
        descripcion: row.get(5)?,
        estado: enum_col(row, 6, WorksiteStatus::from_str)?,
        albanil_asignado: row.get(7)?,
        jefe_obra: row.get(8)?,
        albanil_nombre: row.get(9)?,
        jefe_nombre: row.get(10)?,
        created_at: ts_col(row, 11)?,
        updated_at: ts_col(row, 12)?,
    })
}

pub(crate) fn load_worksite(conn: &Connection, id: i64) -> rusqlite::Result<Option<Worksite>> {
    conn.query_row(
        &format!("{WORKSITE_SELECT} WHERE o.id = ?1"),
        [id],
        row_to_worksite,
    )
    .optional()
}

/// Loads a worksite the actor may see.
///
/// Field workers only see worksites assigned to them. They get `Forbidden`
/// for unknown ids as well, so the response never reveals whether a worksite
/// they are not assigned to exists.
pub(crate) fn authorize_worksite(conn: &Connection, id: i64, actor: &Actor) -> Result<Worksite> {
    let worksite = load_worksite(conn, id)?;
    match worksite {
        Some(w) if !actor.is_field_worker() || w.albanil_asignado == Some(actor.user_id) => Ok(w),
        Some(_) => {
            tracing::debug!(obra_id = id, user_id = actor.user_id, "Worksite access denied");
            Err(Error::Forbidden)
        }
        None if actor.is_field_worker() => Err(Error::Forbidden),
        None => Err(Error::NotFound("obra")),
    }
}

fn validate_input(conn: &Connection, input: &CreateWorksiteInput) -> Result<()> {
    if input.nombre.trim().is_empty() || input.ubicacion.trim().is_empty() {
        return Err(Error::validation(
            "nombre, ubicación y albañil asignado son requeridos",
        ));
    }
    let worker_role: Option<String> = conn
        .query_row(
            "SELECT rol FROM usuarios WHERE id = ?1 AND activo = 1",
            [input.albanil_asignado],
            |row| row.get(0),
        )
        .optional()?;
    if worker_role.as_deref() != Some(Role::FieldWorker.as_str()) {
        return Err(Error::validation("el albañil asignado no existe"));
    }
    if let Some(jefe) = input.jefe_obra {
        let jefe_role: Option<String> = conn
            .query_row(
                "SELECT rol FROM usuarios WHERE id = ?1 AND activo = 1",
                [jefe],
                |row| row.get(0),
            )
            .optional()?;
        if jefe_role.as_deref() != Some(Role::SiteSupervisor.as_str()) {
            return Err(Error::validation("el jefe de obra no existe"));
        }
    }
    Ok(())
}

impl Database {
    pub fn create_worksite(&self, input: CreateWorksiteInput) -> Result<Worksite> {
        let conn = self.conn();
        validate_input(&conn, &input)?;
        let ts = fmt_ts(now());
        conn.execute(
            "INSERT INTO obras (nombre, ubicacion, latitud, longitud, descripcion, estado,
                                albanil_asignado, jefe_obra, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pendiente', ?6, ?7, ?8, ?8)",
            params![
                input.nombre.trim(),
                input.ubicacion.trim(),
                input.latitud,
                input.longitud,
                input.descripcion,
                input.albanil_asignado,
                input.jefe_obra,
                ts
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(obra_id = id, albanil = input.albanil_asignado, "Created worksite");
        load_worksite(&conn, id)?.ok_or(Error::NotFound("obra"))
    }

    pub fn update_worksite(&self, id: i64, input: UpdateWorksiteInput) -> Result<Worksite> {
        let conn = self.conn();
        validate_input(&conn, &input)?;
        let changed = conn.execute(
            "UPDATE obras SET nombre = ?1, ubicacion = ?2, latitud = ?3, longitud = ?4,
                    descripcion = ?5, albanil_asignado = ?6, jefe_obra = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                input.nombre.trim(),
                input.ubicacion.trim(),
                input.latitud,
                input.longitud,
                input.descripcion,
                input.albanil_asignado,
                input.jefe_obra,
                fmt_ts(now()),
                id
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound("obra"));
        }
        load_worksite(&conn, id)?.ok_or(Error::NotFound("obra"))
    }

    /// Deletes a worksite and its dependent rows. Returns the worksite and the
    /// filenames of its photos so the caller can remove the stored files.
    pub fn delete_worksite(&self, id: i64) -> Result<(Worksite, Vec<String>)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let worksite = load_worksite(&tx, id)?.ok_or(Error::NotFound("obra"))?;
        let files = {
            let mut stmt = tx.prepare("SELECT filename FROM fotos WHERE obra_id = ?1")?;
            let files = stmt
                .query_map([id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            files
        };
        tx.execute("DELETE FROM obras WHERE id = ?1", [id])?;
        tx.commit()?;
        tracing::info!(obra_id = id, fotos = files.len(), "Deleted worksite {}", worksite.nombre);
        Ok((worksite, files))
    }

    pub fn get_worksite(&self, id: i64, actor: &Actor) -> Result<Worksite> {
        authorize_worksite(&self.conn(), id, actor)
    }

    /// Worksite detail including its photos, newest first.
    pub fn get_worksite_detail(&self, id: i64, actor: &Actor) -> Result<WorksiteDetail> {
        let worksite = self.get_worksite(id, actor)?;
        let fotos = self.list_photos(id, actor)?;
        Ok(WorksiteDetail { worksite, fotos })
    }

    /// Worksites visible to the actor, newest first.
    pub fn list_worksites(&self, actor: &Actor) -> Result<Vec<Worksite>> {
        if actor.is_field_worker() {
            return self.list_worksites_for_worker(actor.user_id);
        }
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{WORKSITE_SELECT} ORDER BY o.created_at DESC, o.id DESC"))?;
        let worksites = stmt
            .query_map([], row_to_worksite)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(worksites)
    }

    pub fn list_worksites_for_worker(&self, worker_id: i64) -> Result<Vec<Worksite>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{WORKSITE_SELECT} WHERE o.albanil_asignado = ?1 ORDER BY o.created_at DESC, o.id DESC"
        ))?;
        let worksites = stmt
            .query_map([worker_id], row_to_worksite)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(worksites)
    }

    pub fn worksite_stats(&self) -> Result<WorksiteStats> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT estado, COUNT(*) FROM obras GROUP BY estado")?;
        let mut stats = WorksiteStats::default();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (estado, count) = row?;
            stats.total += count;
            match WorksiteStatus::from_str(&estado) {
                Some(WorksiteStatus::Pending) => stats.pendientes = count,
                Some(WorksiteStatus::InProgress) => stats.en_progreso = count,
                Some(WorksiteStatus::Completed) => stats.completadas = count,
                Some(WorksiteStatus::Cancelled) => stats.canceladas = count,
                None => {}
            }
        }
        Ok(stats)
    }

    /// Manual status change by a supervisor.
    ///
    /// `en_progreso` and `completada` belong to the progress gate: they are only
    /// accepted when they already match what the step table implies.
    /// Cancelling freezes the worksite; requesting `pendiente` on a cancelled
    /// worksite reopens it at the status its steps imply.
    pub fn set_worksite_status(
        &self,
        id: i64,
        requested: WorksiteStatus,
        actor: &Actor,
    ) -> Result<Worksite> {
        if !actor.has_any_role(&[Role::Admin, Role::SiteSupervisor]) {
            return Err(Error::Forbidden);
        }

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = load_worksite(&tx, id)?.ok_or(Error::NotFound("obra"))?.estado;
        let (first_done, all_done) = step_flags(&tx, id)?;
        let projected = WorksiteStatus::projected(first_done, all_done);

        let next = match (requested, current) {
            (WorksiteStatus::Cancelled, WorksiteStatus::Completed) => {
                return Err(Error::conflict("una obra completada no se puede cancelar"));
            }
            (WorksiteStatus::Cancelled, _) => WorksiteStatus::Cancelled,
            (WorksiteStatus::Pending, WorksiteStatus::Cancelled) => projected,
            (_, WorksiteStatus::Cancelled) => {
                return Err(Error::conflict(
                    "la obra está cancelada; reábrela con estado pendiente",
                ));
            }
            (requested, _) if requested == projected => requested,
            _ => {
                return Err(Error::conflict(
                    "el estado de la obra lo determina el progreso de sus pasos",
                ));
            }
        };

        if next != current {
            tx.execute(
                "UPDATE obras SET estado = ?1, updated_at = ?2 WHERE id = ?3",
                params![next.as_str(), fmt_ts(now()), id],
            )?;
            tracing::info!(
                obra_id = id,
                user_id = actor.user_id,
                from = current.as_str(),
                to = next.as_str(),
                "Worksite status overridden"
            );
        }
        let worksite = load_worksite(&tx, id)?.ok_or(Error::NotFound("obra"))?;
        tx.commit()?;
        Ok(worksite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        db: Database,
        admin: Actor,
        worker: Actor,
        other_worker: Actor,
        obra: Worksite,
    }

    fn user(db: &Database, name: &str, rol: Role) -> Actor {
        let u = db
            .create_user(CreateUserInput {
                username: name.into(),
                email: format!("{name}@obra.test"),
                password: "pw".into(),
                nombre: name.into(),
                apellido: "Test".into(),
                rol,
            })
            .unwrap();
        Actor::new(u.id, rol)
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let admin = user(&db, "admin", Role::Admin);
        let worker = user(&db, "juan", Role::FieldWorker);
        let other_worker = user(&db, "pedro", Role::FieldWorker);
        let obra = db
            .create_worksite(CreateWorksiteInput {
                nombre: "Casa Norte".into(),
                ubicacion: "Calle 1".into(),
                latitud: Some(-34.6),
                longitud: Some(-58.4),
                descripcion: None,
                albanil_asignado: worker.user_id,
                jefe_obra: None,
            })
            .unwrap();
        Fixture {
            db,
            admin,
            worker,
            other_worker,
            obra,
        }
    }

    #[test]
    fn new_worksite_is_pending_and_names_worker() {
        let f = fixture();
        assert_eq!(f.obra.estado, WorksiteStatus::Pending);
        assert_eq!(f.obra.albanil_nombre.as_deref(), Some("juan Test"));
        assert!(f.obra.jefe_nombre.is_none());
    }

    #[test]
    fn create_requires_field_worker_assignment() {
        let f = fixture();
        let err = f
            .db
            .create_worksite(CreateWorksiteInput {
                nombre: "X".into(),
                ubicacion: "Y".into(),
                latitud: None,
                longitud: None,
                descripcion: None,
                albanil_asignado: f.admin.user_id,
                jefe_obra: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn field_worker_sees_only_assigned_worksites() {
        let f = fixture();
        assert_eq!(f.db.list_worksites(&f.worker).unwrap().len(), 1);
        assert!(f.db.list_worksites(&f.other_worker).unwrap().is_empty());
        assert_eq!(f.db.list_worksites(&f.admin).unwrap().len(), 1);

        assert!(matches!(
            f.db.get_worksite(f.obra.id, &f.other_worker),
            Err(Error::Forbidden)
        ));
        assert!(matches!(f.db.get_worksite(999, &f.other_worker), Err(Error::Forbidden)));
        assert!(matches!(f.db.get_worksite(999, &f.admin), Err(Error::NotFound(_))));
    }

    #[test]
    fn status_override_rules() {
        let f = fixture();
        let id = f.obra.id;

        assert!(matches!(
            f.db.set_worksite_status(id, WorksiteStatus::Cancelled, &f.worker),
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.db.set_worksite_status(id, WorksiteStatus::InProgress, &f.admin),
            Err(Error::Conflict(_))
        ));
        // Matching the projection is a no-op.
        let w = f.db.set_worksite_status(id, WorksiteStatus::Pending, &f.admin).unwrap();
        assert_eq!(w.estado, WorksiteStatus::Pending);

        let w = f.db.set_worksite_status(id, WorksiteStatus::Cancelled, &f.admin).unwrap();
        assert_eq!(w.estado, WorksiteStatus::Cancelled);
        assert!(matches!(
            f.db.set_worksite_status(id, WorksiteStatus::InProgress, &f.admin),
            Err(Error::Conflict(_))
        ));

        let w = f.db.set_worksite_status(id, WorksiteStatus::Pending, &f.admin).unwrap();
        assert_eq!(w.estado, WorksiteStatus::Pending);
    }

    #[test]
    fn stats_count_by_status() {
        let f = fixture();
        f.db.set_worksite_status(f.obra.id, WorksiteStatus::Cancelled, &f.admin)
            .unwrap();
        let stats = f.db.worksite_stats().unwrap();
        assert_eq!(
            stats,
            WorksiteStats {
                total: 1,
                canceladas: 1,
                ..WorksiteStats::default()
            }
        );
    }

    #[test]
    fn delete_cascades_progress() {
        let f = fixture();
        f.db.get_progress(f.obra.id, &f.admin).unwrap();
        let (deleted, files) = f.db.delete_worksite(f.obra.id).unwrap();
        assert_eq!(deleted.id, f.obra.id);
        assert!(files.is_empty());
        assert!(matches!(
            f.db.get_progress(f.obra.id, &f.admin),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(f.db.delete_worksite(f.obra.id), Err(Error::NotFound(_))));
    }
}
