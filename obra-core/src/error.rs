use thiserror::Error;

use crate::models::Step;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication required")]
    Unauthenticated,

    /// Caller's role or assignment does not grant access. The message stays
    /// generic so it does not reveal which check failed.
    #[error("no tienes acceso a esta obra")]
    Forbidden,

    #[error("debes completar el paso {blocking_step} antes de continuar")]
    PreconditionNotMet { blocking_step: Step },

    #[error("el paso {step} requiere al menos {required} fotos (hay {found})")]
    InsufficientPhotos {
        step: Step,
        required: u32,
        found: u32,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(argon2::password_hash::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
