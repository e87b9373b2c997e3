//! HTTP client for the REST API, used by the field-worker workflow driver.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use obra_core::models::*;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    Api { status: StatusCode, message: String },

    #[error("not logged in; pass --token or log in first")]
    NoToken,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            Self::NoToken => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SubmittedBody {
    solicitudes: Vec<MaterialRequest>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NoToken)?;
        Ok(req.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("error").to_string(),
        };
        tracing::debug!(%status, "API error: {}", message);
        Err(ClientError::Api { status, message })
    }

    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        Self::send(self.http.get(self.url("/api/health"))).await
    }

    /// Logs in and keeps the issued token on this client.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginSession, ClientError> {
        let req = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }));
        let session: LoginSession = Self::send(req).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn worksites(&self) -> Result<Vec<Worksite>, ClientError> {
        Self::send(self.authed(self.http.get(self.url("/api/obras")))?).await
    }

    pub async fn worksite(&self, obra_id: i64) -> Result<WorksiteDetail, ClientError> {
        Self::send(self.authed(self.http.get(self.url(&format!("/api/obras/{obra_id}"))))?).await
    }

    pub async fn progress(&self, obra_id: i64) -> Result<Vec<StepProgress>, ClientError> {
        let url = self.url(&format!("/api/progreso/obra/{obra_id}"));
        Self::send(self.authed(self.http.get(url))?).await
    }

    pub async fn validate_step(&self, obra_id: i64, step: Step) -> Result<StepAccess, ClientError> {
        let url = self.url(&format!("/api/progreso/obra/{obra_id}/validar-paso/{step}"));
        Self::send(self.authed(self.http.get(url))?).await
    }

    pub async fn complete_step(
        &self,
        obra_id: i64,
        step: Step,
        comentarios: Option<String>,
    ) -> Result<StepCompletion, ClientError> {
        let url = self.url(&format!("/api/progreso/obra/{obra_id}/paso/{step}"));
        let req = self.http.post(url).json(&json!({ "comentarios": comentarios }));
        Self::send(self.authed(req)?).await
    }

    pub async fn photos(&self, obra_id: i64) -> Result<Vec<Photo>, ClientError> {
        let url = self.url(&format!("/api/fotos/obra/{obra_id}"));
        Self::send(self.authed(self.http.get(url))?).await
    }

    pub async fn material_requests(&self, obra_id: i64) -> Result<Vec<MaterialRequest>, ClientError> {
        let url = self.url(&format!("/api/materiales/obra/{obra_id}"));
        Self::send(self.authed(self.http.get(url))?).await
    }

    pub async fn submit_materials(
        &self,
        input: &SubmitMaterialsInput,
    ) -> Result<Vec<MaterialRequest>, ClientError> {
        let req = self.http.post(self.url("/api/materiales/solicitar")).json(input);
        let body: SubmittedBody = Self::send(self.authed(req)?).await?;
        Ok(body.solicitudes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:3000/");
        assert_eq!(client.url("/api/health"), "http://localhost:3000/api/health");
    }

    #[test]
    fn authed_requests_need_a_token() {
        let client = ApiClient::new("http://localhost:3000");
        let req = client.http.get(client.url("/api/obras"));
        assert!(matches!(client.authed(req), Err(ClientError::NoToken)));
    }
}
