//! The progress gate: four ordered steps per worksite, completed strictly in
//! sequence, with the worksite status projected from the step table.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::photos::count_photos;
use super::worksites::authorize_worksite;
use super::{fmt_ts, now, opt_ts_col, ts_col, Database};
use crate::error::{Error, Result};
use crate::models::*;

fn row_to_progress(row: &Row<'_>) -> rusqlite::Result<StepProgress> {
    let paso: i64 = row.get(2)?;
    Ok(StepProgress {
        id: row.get(0)?,
        obra_id: row.get(1)?,
        paso: Step::from_number(paso).ok_or_else(|| {
            rusqlite::Error::IntegralValueOutOfRange(2, paso)
        })?,
        completado: row.get(3)?,
        fecha_completado: opt_ts_col(row, 4)?,
        comentarios: row.get(5)?,
        created_at: ts_col(row, 6)?,
    })
}

fn load_progress(conn: &Connection, obra_id: i64) -> rusqlite::Result<Vec<StepProgress>> {
    let mut stmt = conn.prepare(
        "SELECT id, obra_id, paso, completado, fecha_completado, comentarios, created_at
         FROM obra_progreso WHERE obra_id = ?1 ORDER BY paso",
    )?;
    let rows = stmt
        .query_map([obra_id], row_to_progress)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Inserts any missing step rows. The unique (obra_id, paso) index turns
/// concurrent initializations into no-ops.
fn ensure_progress_rows(conn: &Connection, obra_id: i64) -> rusqlite::Result<usize> {
    let ts = fmt_ts(now());
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO obra_progreso (obra_id, paso, completado, created_at)
         VALUES (?1, ?2, 0, ?3)",
    )?;
    let mut created = 0;
    for step in Step::ALL {
        created += stmt.execute(params![obra_id, step.number(), ts])?;
    }
    Ok(created)
}

fn is_step_completed(conn: &Connection, obra_id: i64, step: Step) -> rusqlite::Result<bool> {
    let done: Option<bool> = conn
        .query_row(
            "SELECT completado FROM obra_progreso WHERE obra_id = ?1 AND paso = ?2",
            params![obra_id, step.number()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(done.unwrap_or(false))
}

/// (step 1 completed, all four steps completed) for a worksite.
pub(crate) fn step_flags(conn: &Connection, obra_id: i64) -> rusqlite::Result<(bool, bool)> {
    conn.query_row(
        "SELECT COALESCE(MAX(paso = 1 AND completado = 1), 0),
                COUNT(CASE WHEN completado = 1 THEN 1 END) = 4
         FROM obra_progreso WHERE obra_id = ?1",
        [obra_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

fn parse_step(step: i64) -> Result<Step> {
    Step::from_number(step)
        .ok_or_else(|| Error::validation(format!("paso inválido {step}, debe estar entre 1 y 4")))
}

impl Database {
    /// Returns the four step rows of a worksite, creating them on first read.
    pub fn get_progress(&self, obra_id: i64, actor: &Actor) -> Result<Vec<StepProgress>> {
        let mut conn = self.conn();
        authorize_worksite(&conn, obra_id, actor)?;

        let progress = load_progress(&conn, obra_id)?;
        if progress.len() == Step::ALL.len() {
            return Ok(progress);
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let created = ensure_progress_rows(&tx, obra_id)?;
        let progress = load_progress(&tx, obra_id)?;
        tx.commit()?;
        if created > 0 {
            tracing::debug!(obra_id, created, "Initialized worksite progress");
        }
        Ok(progress)
    }

    /// Marks a step completed.
    ///
    /// Completing an already completed step succeeds without touching the row,
    /// so the first `fecha_completado` and `comentarios` are kept.
    pub fn complete_step(
        &self,
        obra_id: i64,
        step: i64,
        comentarios: Option<String>,
        actor: &Actor,
    ) -> Result<StepCompletion> {
        let step = parse_step(step)?;

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let worksite = authorize_worksite(&tx, obra_id, actor)?;
        if worksite.estado == WorksiteStatus::Cancelled {
            return Err(Error::conflict("la obra está cancelada"));
        }
        ensure_progress_rows(&tx, obra_id)?;

        if is_step_completed(&tx, obra_id, step)? {
            tracing::debug!(obra_id, paso = step.number(), "Step already completed");
            return Ok(StepCompletion {
                obra_id,
                paso: step,
                already_completed: true,
                estado: worksite.estado,
            });
        }

        if let Some(previous) = step.previous() {
            if !is_step_completed(&tx, obra_id, previous)? {
                tracing::debug!(obra_id, paso = step.number(), "Step blocked by step {}", previous);
                return Err(Error::PreconditionNotMet {
                    blocking_step: previous,
                });
            }
        }

        if let Some(category) = step.required_photos() {
            let required = self.config.min_photos;
            let found = count_photos(&tx, obra_id, category)?;
            if found < required {
                return Err(Error::InsufficientPhotos {
                    step,
                    required,
                    found,
                });
            }
        }

        let comentarios = comentarios.filter(|c| !c.trim().is_empty());
        let ts = fmt_ts(now());
        tx.execute(
            "UPDATE obra_progreso SET completado = 1, fecha_completado = ?1, comentarios = ?2
             WHERE obra_id = ?3 AND paso = ?4",
            params![ts, comentarios, obra_id, step.number()],
        )?;

        let estado = match (step, worksite.estado) {
            (Step::ArrivalPhotos, WorksiteStatus::Pending) => WorksiteStatus::InProgress,
            (Step::CompletionPhotos, _) => WorksiteStatus::Completed,
            (_, current) => current,
        };
        if estado != worksite.estado {
            tx.execute(
                "UPDATE obras SET estado = ?1, updated_at = ?2 WHERE id = ?3",
                params![estado.as_str(), ts, obra_id],
            )?;
        }
        tx.commit()?;

        tracing::info!(
            obra_id,
            paso = step.number(),
            user_id = actor.user_id,
            estado = estado.as_str(),
            "Step completed"
        );
        Ok(StepCompletion {
            obra_id,
            paso: step,
            already_completed: false,
            estado,
        })
    }

    /// Read-only pre-flight: could the actor complete `step` right now?
    ///
    /// Mirrors the ordering and cancellation checks of [`Database::complete_step`].
    /// Photo minimums are not part of access; they are reported at completion.
    pub fn validate_step_access(&self, obra_id: i64, step: i64, actor: &Actor) -> Result<StepAccess> {
        let step = parse_step(step)?;
        let conn = self.conn();
        let worksite = authorize_worksite(&conn, obra_id, actor)?;

        let (puede_acceder, paso_bloqueante, motivo) = if worksite.estado == WorksiteStatus::Cancelled {
            (false, None, Some(StepBlock::WorksiteCancelled))
        } else {
            match step.previous() {
                Some(previous) if !is_step_completed(&conn, obra_id, previous)? => {
                    (false, Some(previous), Some(StepBlock::PreviousStepIncomplete))
                }
                _ => (true, None, None),
            }
        };

        Ok(StepAccess {
            paso: step,
            puede_acceder,
            paso_bloqueante,
            motivo,
        })
    }
}
