use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "jefe_obra")]
    SiteSupervisor,
    #[serde(rename = "logistica")]
    Logistics,
    #[serde(rename = "albanil")]
    FieldWorker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::SiteSupervisor => "jefe_obra",
            Self::Logistics => "logistica",
            Self::FieldWorker => "albanil",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "jefe_obra" => Some(Self::SiteSupervisor),
            "logistica" => Some(Self::Logistics),
            "albanil" => Some(Self::FieldWorker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nombre: String,
    pub apellido: String,
    pub rol: Role,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
}

/// Short form used when listing assignable workers and supervisors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub nombre: String,
    pub apellido: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub nombre: String,
    pub apellido: String,
    pub rol: Role,
}

/// The authenticated caller of an operation.
///
/// Every access-scoped operation takes an `Actor` rather than a bare user id
/// so that the field-worker restriction is applied in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_field_worker(&self) -> bool {
        self.role == Role::FieldWorker
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSession {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}
