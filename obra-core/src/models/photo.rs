use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PhotoCategory {
    #[serde(rename = "inicio")]
    Start,
    #[serde(rename = "progreso")]
    Progress,
    #[serde(rename = "final")]
    Final,
}

impl PhotoCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "inicio",
            Self::Progress => "progreso",
            Self::Final => "final",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inicio" => Some(Self::Start),
            "progreso" => Some(Self::Progress),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub obra_id: i64,
    pub usuario_id: i64,
    pub filename: String,
    pub tipo: PhotoCategory,
    pub descripcion: Option<String>,
    pub autor: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePhotoInput {
    pub obra_id: i64,
    pub filename: String,
    pub tipo: PhotoCategory,
    pub descripcion: Option<String>,
}
