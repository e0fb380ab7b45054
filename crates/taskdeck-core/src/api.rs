use anyhow::Context;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::task::{StatusFilter, Task, TaskPayload, User};

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend rejected the credentials; the message is shown inline.
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("request failed with HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize, Default)]
struct LoginFailure {
    #[serde(default)]
    error: Option<String>,
}

/// The backend contract. The view-model is generic over this so tests can
/// substitute an in-memory service.
#[allow(async_fn_in_trait)]
pub trait TaskService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;

    async fn list_tasks(&self, token: &str, filter: StatusFilter) -> Result<Vec<Task>, ApiError>;

    async fn save_task(&self, token: &str, payload: &TaskPayload) -> Result<Task, ApiError>;

    async fn delete_task(&self, token: &str, id: i64) -> Result<(), ApiError>;

    async fn list_users(&self, token: &str) -> Result<Vec<User>, ApiError>;
}

/// reqwest-backed client for the real backend. No request timeout is set;
/// failures surface through the transport itself.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTaskService {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let trimmed = base_url.trim();
        let base_url = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };

        let http = reqwest::Client::builder()
            .build()
            .context("failed building HTTP client")?;

        Ok(Self { base_url, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_value(token: &str) -> String {
        format!("Token {token}")
    }
}

impl TaskService for HttpTaskService {
    #[tracing::instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("login/"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<LoginResponse>().await?);
        }

        let failure = response
            .json::<LoginFailure>()
            .await
            .unwrap_or_default();
        debug!(%status, "login rejected");
        Err(ApiError::InvalidCredentials(
            failure
                .error
                .unwrap_or_else(|| "invalid credentials".to_string()),
        ))
    }

    #[tracing::instrument(skip(self, token))]
    async fn list_tasks(&self, token: &str, filter: StatusFilter) -> Result<Vec<Task>, ApiError> {
        let mut request = self.http.get(self.endpoint("tasks/"));
        if let Some(status) = filter.query_value() {
            request = request.query(&[("status", status)]);
        }

        let response = request
            .header(AUTHORIZATION, Self::auth_value(token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        let tasks = response.json::<Vec<Task>>().await?;
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, token, payload))]
    async fn save_task(&self, token: &str, payload: &TaskPayload) -> Result<Task, ApiError> {
        let request = match payload {
            TaskPayload::Draft(fields) => {
                self.http.post(self.endpoint("tasks/")).json(fields)
            }
            TaskPayload::Persisted { id, fields } => self
                .http
                .put(self.endpoint(&format!("tasks/{id}/")))
                .json(fields),
        };

        let response = request
            .header(AUTHORIZATION, Self::auth_value(token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        Ok(response.json::<Task>().await?)
    }

    #[tracing::instrument(skip(self, token))]
    async fn delete_task(&self, token: &str, id: i64) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.endpoint(&format!("tasks/{id}/")))
            .header(AUTHORIZATION, Self::auth_value(token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, token))]
    async fn list_users(&self, token: &str) -> Result<Vec<User>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("users/"))
            .header(AUTHORIZATION, Self::auth_value(token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        Ok(response.json::<Vec<User>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpTaskService, LoginResponse};

    #[test]
    fn login_response_wire_shape() {
        let parsed: LoginResponse =
            serde_json::from_str(r#"{"username":"alice","user_id":7,"token":"abc"}"#)
                .expect("login response should deserialize");

        assert_eq!(parsed.username, "alice");
        assert_eq!(parsed.user_id, 7);
        assert_eq!(parsed.token, "abc");
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let service = HttpTaskService::new("http://localhost:8000/api").expect("client");
        assert_eq!(service.endpoint("tasks/"), "http://localhost:8000/api/tasks/");

        let service = HttpTaskService::new("http://localhost:8000/api/").expect("client");
        assert_eq!(service.endpoint("login/"), "http://localhost:8000/api/login/");
    }
}
