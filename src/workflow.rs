//! Drives the four-step field-worker workflow against a progress gate.
//!
//! The session never tracks progression on its own: after every successful
//! action it re-reads progress and evidence from its backend and recomputes
//! the current view. A failed action leaves the view where it was.

use async_trait::async_trait;

use obra_core::models::*;
use obra_core::workflow::{current_view, readiness, Readiness, StepEvidence, WorkflowView};
use obra_core::Database;

use crate::client::{ApiClient, ClientError};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Gate(#[from] obra_core::Error),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("el paso {step} aún no se puede completar: {reason:?}")]
    NotReady { step: Step, reason: Readiness },

    #[error("todos los pasos ya están completos")]
    AllDone,
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Everything the workflow needs from the outside world.
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn progress(&self, obra_id: i64) -> WorkflowResult<Vec<StepProgress>>;
    async fn photos(&self, obra_id: i64) -> WorkflowResult<Vec<Photo>>;
    async fn material_requests(&self, obra_id: i64) -> WorkflowResult<Vec<MaterialRequest>>;
    async fn submit_materials(&self, input: SubmitMaterialsInput) -> WorkflowResult<Vec<MaterialRequest>>;
    async fn complete_step(
        &self,
        obra_id: i64,
        step: Step,
        comentarios: Option<String>,
    ) -> WorkflowResult<StepCompletion>;
}

#[async_trait]
impl WorkflowBackend for ApiClient {
    async fn progress(&self, obra_id: i64) -> WorkflowResult<Vec<StepProgress>> {
        Ok(ApiClient::progress(self, obra_id).await?)
    }

    async fn photos(&self, obra_id: i64) -> WorkflowResult<Vec<Photo>> {
        Ok(ApiClient::photos(self, obra_id).await?)
    }

    async fn material_requests(&self, obra_id: i64) -> WorkflowResult<Vec<MaterialRequest>> {
        Ok(ApiClient::material_requests(self, obra_id).await?)
    }

    async fn submit_materials(&self, input: SubmitMaterialsInput) -> WorkflowResult<Vec<MaterialRequest>> {
        Ok(ApiClient::submit_materials(self, &input).await?)
    }

    async fn complete_step(
        &self,
        obra_id: i64,
        step: Step,
        comentarios: Option<String>,
    ) -> WorkflowResult<StepCompletion> {
        Ok(ApiClient::complete_step(self, obra_id, step, comentarios).await?)
    }
}

/// In-process backend acting as one user directly on the database.
#[derive(Clone)]
pub struct LocalBackend {
    db: Database,
    actor: Actor,
}

impl LocalBackend {
    pub fn new(db: Database, actor: Actor) -> Self {
        Self { db, actor }
    }
}

#[async_trait]
impl WorkflowBackend for LocalBackend {
    async fn progress(&self, obra_id: i64) -> WorkflowResult<Vec<StepProgress>> {
        Ok(self.db.get_progress(obra_id, &self.actor)?)
    }

    async fn photos(&self, obra_id: i64) -> WorkflowResult<Vec<Photo>> {
        Ok(self.db.list_photos(obra_id, &self.actor)?)
    }

    async fn material_requests(&self, obra_id: i64) -> WorkflowResult<Vec<MaterialRequest>> {
        Ok(self.db.list_material_requests(obra_id, &self.actor)?)
    }

    async fn submit_materials(&self, input: SubmitMaterialsInput) -> WorkflowResult<Vec<MaterialRequest>> {
        Ok(self.db.submit_materials(input, &self.actor)?)
    }

    async fn complete_step(
        &self,
        obra_id: i64,
        step: Step,
        comentarios: Option<String>,
    ) -> WorkflowResult<StepCompletion> {
        Ok(self
            .db
            .complete_step(obra_id, i64::from(step.number()), comentarios, &self.actor)?)
    }
}

pub struct WorkflowSession<B> {
    backend: B,
    obra_id: i64,
    min_photos: u32,
    progress: Vec<StepProgress>,
    evidence: StepEvidence,
}

impl<B: WorkflowBackend> WorkflowSession<B> {
    pub async fn open(backend: B, obra_id: i64, min_photos: u32) -> WorkflowResult<Self> {
        let mut session = Self {
            backend,
            obra_id,
            min_photos,
            progress: Vec::new(),
            evidence: StepEvidence::default(),
        };
        session.refresh().await?;
        Ok(session)
    }

    pub async fn refresh(&mut self) -> WorkflowResult<()> {
        let progress = self.backend.progress(self.obra_id).await?;
        let photos = self.backend.photos(self.obra_id).await?;
        let requests = self.backend.material_requests(self.obra_id).await?;
        self.progress = progress;
        self.evidence = StepEvidence::from_records(&photos, requests.len());
        Ok(())
    }

    pub fn obra_id(&self) -> i64 {
        self.obra_id
    }

    pub fn progress(&self) -> &[StepProgress] {
        &self.progress
    }

    pub fn evidence(&self) -> &StepEvidence {
        &self.evidence
    }

    pub fn view(&self) -> WorkflowView {
        current_view(&self.progress)
    }

    /// Readiness of the current step, or `None` once every step is done.
    pub fn readiness(&self) -> Option<Readiness> {
        match self.view() {
            WorkflowView::Step(step) => Some(readiness(step, &self.evidence, self.min_photos)),
            WorkflowView::Done => None,
        }
    }

    /// Completes the current step once its own criterion is met.
    pub async fn complete_current(&mut self, comentarios: Option<String>) -> WorkflowResult<StepCompletion> {
        let step = match self.view() {
            WorkflowView::Step(step) => step,
            WorkflowView::Done => return Err(WorkflowError::AllDone),
        };
        let ready = readiness(step, &self.evidence, self.min_photos);
        if !ready.is_ready() {
            return Err(WorkflowError::NotReady { step, reason: ready });
        }

        let completion = self.backend.complete_step(self.obra_id, step, comentarios).await?;
        tracing::info!(obra_id = self.obra_id, paso = step.number(), "Workflow step completed");
        self.refresh().await?;
        Ok(completion)
    }

    /// Submits the lines that name a material and a positive quantity.
    pub async fn submit_materials(&mut self, lines: Vec<MaterialLine>) -> WorkflowResult<Vec<MaterialRequest>> {
        let materiales: Vec<_> = lines
            .into_iter()
            .filter(|line| line.material_id > 0 && line.cantidad > 0)
            .collect();
        if materiales.is_empty() {
            return Err(obra_core::Error::validation("agrega al menos un material con cantidad").into());
        }
        let requests = self
            .backend
            .submit_materials(SubmitMaterialsInput {
                obra_id: self.obra_id,
                materiales,
            })
            .await?;
        self.refresh().await?;
        Ok(requests)
    }
}
