use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router,
    schemars::JsonSchema,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};

use obra_core::models::*;
use obra_core::workflow::{current_view, WorkflowView};
use obra_core::{Database, Error};

/// MCP server exposing the progress gate, acting as one user.
#[derive(Clone)]
pub struct McpServer {
    db: Database,
    actor: Actor,
    tool_router: ToolRouter<Self>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WorksiteRequest {
    #[schemars(description = "The worksite (obra) ID")]
    pub obra_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StepRequest {
    #[schemars(description = "The worksite (obra) ID")]
    pub obra_id: i64,
    #[schemars(description = "Step number: 1 arrival photos, 2 materials, 3 work, 4 completion photos")]
    pub paso: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompleteStepRequest {
    #[schemars(description = "The worksite (obra) ID")]
    pub obra_id: i64,
    #[schemars(description = "Step number to mark as completed (1-4)")]
    pub paso: i64,
    #[schemars(description = "Optional comments recorded with the completion")]
    #[serde(default)]
    pub comentarios: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressReport {
    pub obra_id: i64,
    pub view: WorkflowView,
    pub pasos: Vec<StepProgress>,
}

fn to_mcp_error(err: Error) -> McpError {
    match err {
        Error::Database(_) | Error::Io(_) | Error::PasswordHash(_) => McpError::internal_error(err.to_string(), None),
        other => McpError::invalid_params(other.to_string(), None),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

impl McpServer {
    pub fn new(db: Database, actor: Actor) -> Self {
        Self {
            db,
            actor,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl McpServer {
    #[tool(description = "List the worksites visible to the current user")]
    async fn list_worksites(&self) -> Result<CallToolResult, McpError> {
        let worksites = self.db.list_worksites(&self.actor).map_err(to_mcp_error)?;
        json_result(&worksites)
    }

    #[tool(description = "Get the four-step progress of a worksite and the step to work on next")]
    async fn get_worksite_progress(
        &self,
        params: Parameters<WorksiteRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let pasos = self.db.get_progress(req.obra_id, &self.actor).map_err(to_mcp_error)?;
        json_result(&ProgressReport {
            obra_id: req.obra_id,
            view: current_view(&pasos),
            pasos,
        })
    }

    #[tool(description = "Check whether a step of a worksite can be completed now")]
    async fn validate_worksite_step(
        &self,
        params: Parameters<StepRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let access = self
            .db
            .validate_step_access(req.obra_id, req.paso, &self.actor)
            .map_err(to_mcp_error)?;
        json_result(&access)
    }

    #[tool(description = "Mark a worksite step as completed; the previous step must already be completed")]
    async fn complete_worksite_step(
        &self,
        params: Parameters<CompleteStepRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let completion = self
            .db
            .complete_step(req.obra_id, req.paso, req.comentarios, &self.actor)
            .map_err(to_mcp_error)?;
        json_result(&completion)
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Obra MCP server for guided worksite progress".into()),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(db: Database, username: &str) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    let user = db
        .get_user_by_username(username)?
        .filter(|u| u.activo)
        .ok_or_else(|| anyhow::anyhow!("unknown or inactive user {username}"))?;
    tracing::info!(user_id = user.id, "Starting MCP server via stdio");

    let service = McpServer::new(db, Actor::new(user.id, user.rol));
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_errors_are_invalid_params() {
        let err = to_mcp_error(Error::PreconditionNotMet {
            blocking_step: Step::ArrivalPhotos,
        });
        assert!(err.message.contains("paso 1"));
    }
}
