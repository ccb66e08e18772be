use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use thiserror::Error;

const TOKEN_HEADER: &str = "X-Nomad-Token";

#[derive(Debug, Error)]
pub enum NomadError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("agent response has no usable stats.raft.last_log_index")]
    MissingLastLogIndex,
}

/// Thin client for the two Nomad endpoints the relay needs.
#[derive(Debug, Clone)]
pub struct NomadClient {
    http: Client,
    api_base: String,
    token: Option<String>,
    namespace: String,
}

impl NomadClient {
    pub fn new(http: Client, addr: &str, token: Option<String>, namespace: String) -> Self {
        Self {
            http,
            api_base: format!("{}/v1", addr.trim_end_matches('/')),
            token: token.filter(|token| !token.is_empty()),
            namespace,
        }
    }

    /// Current Raft log index; stream records at or below it are history.
    pub async fn last_log_index(&self) -> Result<u64, NomadError> {
        let url = format!("{}/agent/self", self.api_base);
        let response = self.send(self.http.get(&url), &url).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|source| NomadError::Request { url, source })?;
        parse_last_log_index(&body).ok_or(NomadError::MissingLastLogIndex)
    }

    /// Opens the long-lived NDJSON event stream. Read it with [`Response::chunk`].
    pub async fn event_stream(&self) -> Result<Response, NomadError> {
        let url = format!("{}/event/stream", self.api_base);
        let request = self
            .http
            .get(&url)
            .query(&[("namespace", self.namespace.as_str())]);
        self.send(request, &url).await
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, NomadError> {
        let request = match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token.as_str()),
            None => request,
        };
        let response = request.send().await.map_err(|source| NomadError::Request {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(NomadError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

/// Nomad reports raft stats as strings; accept numbers too.
pub fn parse_last_log_index(agent_self: &Value) -> Option<u64> {
    let raw = agent_self.pointer("/stats/raft/last_log_index")?;
    match raw {
        Value::String(text) => text.trim().parse().ok(),
        other => other.as_u64(),
    }
}
