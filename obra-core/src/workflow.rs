//! Field-worker workflow logic shared by every client of the progress gate.
//!
//! The view is always derived from server state: the current step is the
//! lowest step not yet completed. Nothing here keeps its own progression.

use serde::{Deserialize, Serialize};

use crate::models::{Photo, PhotoCategory, Step, StepProgress};

/// What the field worker should be looking at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "view", content = "paso")]
pub enum WorkflowView {
    Step(Step),
    Done,
}

pub fn current_view(progress: &[StepProgress]) -> WorkflowView {
    Step::ALL
        .into_iter()
        .find(|step| {
            !progress
                .iter()
                .any(|row| row.paso == *step && row.completado)
        })
        .map_or(WorkflowView::Done, WorkflowView::Step)
}

/// What the worker has already produced for a worksite.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepEvidence {
    pub fotos_inicio: u32,
    pub fotos_progreso: u32,
    pub fotos_final: u32,
    pub solicitudes_material: u32,
}

impl StepEvidence {
    pub fn from_records(photos: &[Photo], material_requests: usize) -> Self {
        let count = |category: PhotoCategory| {
            photos.iter().filter(|p| p.tipo == category).count() as u32
        };
        Self {
            fotos_inicio: count(PhotoCategory::Start),
            fotos_progreso: count(PhotoCategory::Progress),
            fotos_final: count(PhotoCategory::Final),
            solicitudes_material: u32::try_from(material_requests).unwrap_or(u32::MAX),
        }
    }

    pub fn photos(&self, category: PhotoCategory) -> u32 {
        match category {
            PhotoCategory::Start => self.fotos_inicio,
            PhotoCategory::Progress => self.fotos_progreso,
            PhotoCategory::Final => self.fotos_final,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "estado", content = "detalle")]
pub enum Readiness {
    Ready,
    MissingPhotos { category: PhotoCategory, remaining: u32 },
    NoMaterialRequest,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Whether the "complete" action for `step` should be offered.
///
/// This is guidance only; the server re-checks photo minimums itself.
pub fn readiness(step: Step, evidence: &StepEvidence, min_photos: u32) -> Readiness {
    if let Some(category) = step.required_photos() {
        let have = evidence.photos(category);
        return if have >= min_photos {
            Readiness::Ready
        } else {
            Readiness::MissingPhotos {
                category,
                remaining: min_photos - have,
            }
        };
    }
    match step {
        Step::MaterialRequest if evidence.solicitudes_material == 0 => Readiness::NoMaterialRequest,
        _ => Readiness::Ready,
    }
}
