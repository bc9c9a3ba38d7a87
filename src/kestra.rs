//! HTTP client for the Kestra workflow engine.
//!
//! Thin facade over the engine's REST API: flow upsert/delete, execution
//! start/status/kill, and incremental log streaming. Instances are
//! constructed explicitly from [`KestraConfig`] and shared by reference; no
//! global client exists. No call here retries; a failed request fails the
//! operation and carries the remote error payload.

use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::KestraConfig;

#[derive(Debug, Error)]
pub enum KestraError {
    /// The engine answered with a non-success status.
    #[error("Workflow engine returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        payload: Option<Value>,
    },

    #[error("Workflow engine request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Reference to a started execution.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionRef {
    pub id: String,
}

/// Execution status as reported by the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KestraExecution {
    pub id: String,
    pub namespace: String,
    pub flow_id: String,
    pub state: ExecutionState,
    #[serde(default)]
    pub task_run_list: Vec<TaskRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionState {
    pub current: ExecutionPhase,
    #[serde(default)]
    pub histories: Vec<StateHistory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPhase {
    Created,
    Queued,
    Running,
    Paused,
    Restarted,
    Retrying,
    Killing,
    Success,
    Warning,
    Failed,
    Killed,
    Cancelled,
    /// States this client does not know about yet; the engine adds new ones.
    #[serde(other)]
    Other,
}

impl ExecutionPhase {
    /// Whether the engine will make no further progress on this execution.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Warning | Self::Failed | Self::Killed | Self::Cancelled
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateHistory {
    pub state: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    pub id: String,
    pub task_id: String,
    pub state: ExecutionState,
    #[serde(default)]
    pub outputs: Option<Value>,
}

/// Client for one Kestra endpoint.
pub struct KestraClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl KestraClient {
    pub fn new(config: &KestraConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Convert a non-success response into `KestraError::Api`, keeping the
    /// remote payload when the body is readable.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, KestraError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let payload: Option<Value> = serde_json::from_str(&body).ok();
        let message = payload
            .as_ref()
            .and_then(|p| p["message"].as_str())
            .map(str::to_string)
            .unwrap_or(body);

        Err(KestraError::Api {
            status: status.as_u16(),
            message,
            payload,
        })
    }

    /// Create or update a flow. The engine treats `PUT` as an upsert keyed by
    /// `(namespace, flow_id)`, so callers never distinguish the two cases.
    pub async fn upsert_flow(
        &self,
        namespace: &str,
        flow_id: &str,
        definition: &str,
    ) -> Result<(), KestraError> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/api/v1/flows/{}/{}", namespace, flow_id),
            )
            .header("Content-Type", "text/plain")
            .body(definition.to_string())
            .send()
            .await?;

        Self::check(response).await?;
        tracing::info!(namespace, flow_id, "upserted workflow");
        Ok(())
    }

    /// Start an execution with the given JSON inputs.
    pub async fn execute(
        &self,
        namespace: &str,
        flow_id: &str,
        inputs: &Value,
    ) -> Result<ExecutionRef, KestraError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/executions/{}/{}", namespace, flow_id),
            )
            .json(inputs)
            .send()
            .await?;

        let execution = Self::check(response).await?.json::<ExecutionRef>().await?;
        tracing::info!(namespace, flow_id, execution_id = %execution.id, "started execution");
        Ok(execution)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<KestraExecution, KestraError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/api/v1/executions/{}", execution_id),
            )
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Stream execution logs as UTF-8 chunks. Cancelling the token halts
    /// further reads and drops the underlying connection.
    pub fn stream_logs(
        &self,
        execution_id: &str,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<String, KestraError>> {
        let request = self.request(
            reqwest::Method::GET,
            &format!("/api/v1/executions/{}/logs", execution_id),
        );

        async_stream::try_stream! {
            let response = Self::check(request.send().await?).await?;
            let mut chunks = response.bytes_stream();

            loop {
                // Check cancellation before pulling another chunk.
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = chunks.next() => next,
                };

                match next {
                    Some(chunk) => {
                        let chunk = chunk?;
                        yield String::from_utf8_lossy(&chunk).into_owned();
                    }
                    None => break,
                }
            }
        }
    }

    /// Cancel a running execution.
    pub async fn kill(&self, execution_id: &str) -> Result<(), KestraError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/executions/{}/kill", execution_id),
            )
            .send()
            .await?;

        Self::check(response).await?;
        tracing::info!(execution_id, "killed execution");
        Ok(())
    }

    pub async fn delete_flow(&self, namespace: &str, flow_id: &str) -> Result<(), KestraError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/flows/{}/{}", namespace, flow_id),
            )
            .send()
            .await?;

        Self::check(response).await?;
        tracing::info!(namespace, flow_id, "deleted workflow");
        Ok(())
    }

    /// Whether the engine is reachable.
    pub async fn test_connection(&self) -> bool {
        match self.request(reqwest::Method::GET, "/api/v1/flows").send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
