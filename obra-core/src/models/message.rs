use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub obra_id: i64,
    pub usuario_id: i64,
    pub mensaje: String,
    pub nombre: String,
    pub apellido: String,
    pub rol: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageInput {
    pub mensaje: String,
}
