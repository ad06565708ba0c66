//! Synchronous backend calls — init, clarify, and history fetch.
//!
//! The backend contract is fixed: any non-2xx response is a failure
//! carrying the status code and body text. [`ChatBackend`] is the seam
//! the orchestration layer is tested through.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use perspective_session::HistoryTurn;

use crate::config::ClientConfig;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Response to a successful init call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct InitRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct ClarifyRequest<'a> {
    session_id: &'a str,
    answers: &'a str,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<HistoryTurn>,
}

/// The backend collaborator as the client sees it.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Create a session for the given user input.
    async fn init(&self, message: &str) -> Result<InitResponse, BackendError>;

    /// Submit clarification answers for an active session.
    async fn clarify(&self, session_id: &str, answers: &str) -> Result<(), BackendError>;

    /// Fetch the durable record of a session.
    async fn history(&self, session_id: &str) -> Result<Vec<HistoryTurn>, BackendError>;
}

/// HTTP implementation over `reqwest`.
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn init(&self, message: &str) -> Result<InitResponse, BackendError> {
        let response = self
            .client
            .post(self.config.init_url())
            .json(&InitRequest { message })
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: InitResponse = response.json().await?;
        debug!(session_id = %parsed.session_id, status = %parsed.status, "session initialized");
        Ok(parsed)
    }

    async fn clarify(&self, session_id: &str, answers: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.config.clarify_url())
            .json(&ClarifyRequest {
                session_id,
                answers,
            })
            .send()
            .await?;
        check_status(response).await?;
        debug!(session_id, "clarification submitted");
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<HistoryTurn>, BackendError> {
        let response = self
            .client
            .get(self.config.history_url(session_id))
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: HistoryResponse = response.json().await?;
        debug!(session_id, turns = parsed.history.len(), "history fetched");
        Ok(parsed.history)
    }
}

/// Turn a non-2xx response into [`BackendError::Status`] with its body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status { status, body })
}
