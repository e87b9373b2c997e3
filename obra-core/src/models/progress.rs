use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PhotoCategory;

/// One of the four fixed stages of the field-worker workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(into = "u8", try_from = "u8")]
pub enum Step {
    ArrivalPhotos = 1,
    MaterialRequest = 2,
    WorkExecution = 3,
    CompletionPhotos = 4,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::ArrivalPhotos,
        Step::MaterialRequest,
        Step::WorkExecution,
        Step::CompletionPhotos,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::ArrivalPhotos),
            2 => Some(Self::MaterialRequest),
            3 => Some(Self::WorkExecution),
            4 => Some(Self::CompletionPhotos),
            _ => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_number(i64::from(self.number()) - 1)
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(i64::from(self.number()) + 1)
    }

    /// Photo category whose uploads count towards this step's completion.
    pub fn required_photos(self) -> Option<PhotoCategory> {
        match self {
            Self::ArrivalPhotos => Some(PhotoCategory::Start),
            Self::CompletionPhotos => Some(PhotoCategory::Final),
            Self::MaterialRequest | Self::WorkExecution => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::ArrivalPhotos => "Fotos de llegada",
            Self::MaterialRequest => "Solicitud de materiales",
            Self::WorkExecution => "Ejecución del trabajo",
            Self::CompletionPhotos => "Fotos finales",
        }
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> u8 {
        step.number()
    }
}

impl TryFrom<u8> for Step {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Step::from_number(i64::from(n)).ok_or_else(|| format!("invalid step {n}, expected 1-4"))
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepProgress {
    pub id: i64,
    pub obra_id: i64,
    pub paso: Step,
    pub completado: bool,
    pub fecha_completado: Option<DateTime<Utc>>,
    pub comentarios: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteStepInput {
    pub comentarios: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepCompletion {
    pub obra_id: i64,
    pub paso: Step,
    /// True when the step had already been completed by an earlier call.
    pub already_completed: bool,
    pub estado: super::WorksiteStatus,
}

/// Why a step cannot be completed right now.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepBlock {
    PreviousStepIncomplete,
    WorksiteCancelled,
}

/// Result of the read-only pre-flight check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepAccess {
    pub paso: Step,
    pub puede_acceder: bool,
    pub paso_bloqueante: Option<Step>,
    pub motivo: Option<StepBlock>,
}
