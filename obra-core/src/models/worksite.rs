use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Photo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worksite {
    pub id: i64,
    pub nombre: String,
    pub ubicacion: String,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub descripcion: Option<String>,
    pub estado: WorksiteStatus,
    pub albanil_asignado: Option<i64>,
    pub jefe_obra: Option<i64>,
    pub albanil_nombre: Option<String>,
    pub jefe_nombre: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorksiteStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "en_progreso")]
    InProgress,
    #[serde(rename = "completada")]
    Completed,
    #[serde(rename = "cancelada")]
    Cancelled,
}

impl WorksiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::InProgress => "en_progreso",
            Self::Completed => "completada",
            Self::Cancelled => "cancelada",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pendiente" => Some(Self::Pending),
            "en_progreso" => Some(Self::InProgress),
            "completada" => Some(Self::Completed),
            "cancelada" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Status implied by the step table alone, ignoring cancellation.
    pub fn projected(step_one_done: bool, all_done: bool) -> Self {
        if all_done {
            Self::Completed
        } else if step_one_done {
            Self::InProgress
        } else {
            Self::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksiteDetail {
    #[serde(flatten)]
    pub worksite: Worksite,
    pub fotos: Vec<Photo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorksiteInput {
    pub nombre: String,
    pub ubicacion: String,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub descripcion: Option<String>,
    pub albanil_asignado: i64,
    pub jefe_obra: Option<i64>,
}

/// Full replacement of the editable worksite fields. Status is not editable here.
pub type UpdateWorksiteInput = CreateWorksiteInput;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorksiteStats {
    pub total: i64,
    pub pendientes: i64,
    pub en_progreso: i64,
    pub completadas: i64,
    pub canceladas: i64,
}
