use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub nombre: String,
    pub unidad: String,
    pub precio_unitario: f64,
    pub stock_disponible: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aprobado")]
    Approved,
    #[serde(rename = "rechazado")]
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::Approved => "aprobado",
            Self::Rejected => "rechazado",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pendiente" => Some(Self::Pending),
            "aprobado" => Some(Self::Approved),
            "rechazado" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One line of a material request as stored against a worksite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRequest {
    pub id: i64,
    pub obra_id: i64,
    pub material_id: i64,
    pub usuario_id: Option<i64>,
    pub nombre: String,
    pub unidad: String,
    pub cantidad_solicitada: i64,
    pub cantidad_aprobada: i64,
    pub estado: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaterialLine {
    pub material_id: i64,
    pub cantidad: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMaterialsInput {
    pub obra_id: i64,
    pub materiales: Vec<MaterialLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequestInput {
    pub estado: RequestStatus,
    pub cantidad_aprobada: Option<i64>,
}
