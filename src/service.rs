use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One query as submitted to the service under test.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub text: String,
    pub user_id: String,
    pub session_id: String,
    pub model: String,
    pub use_rag: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("HTTP {0}")]
    Http(u16),
    #[error("API status: {0}")]
    ApiStatus(String),
    #[error("Timeout ({0}s)")]
    Timeout(u64),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The service implementation itself broke down while handling the call.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Boundary to the service under test: submit a query, get an answer or a
/// failure. Implementations should not apply their own overall timeout; the
/// load generator bounds every call.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryAnswer, QueryError>;
}

#[derive(Debug, Serialize)]
struct AskPayload<'a> {
    texto: &'a str,
    #[serde(rename = "userId")]
    user_id: &'a str,
    #[serde(rename = "chatToken")]
    chat_token: &'a str,
    history: Vec<serde_json::Value>,
    modelo: &'a str,
    #[serde(rename = "useRag")]
    use_rag: bool,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    #[serde(default)]
    respuesta: Option<String>,
    #[serde(default = "unknown_status")]
    status: String,
}

/// Chat service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpQueryService {
    client: Client,
    endpoint: String,
}

impl HttpQueryService {
    pub fn new(base_url: &str, query_path: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                query_path.trim_start_matches('/')
            ),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryAnswer, QueryError> {
        let payload = AskPayload {
            texto: &request.text,
            user_id: &request.user_id,
            chat_token: &request.session_id,
            history: Vec::new(),
            modelo: &request.model,
            use_rag: request.use_rag,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| QueryError::Connection(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            warn!("HTTP {} from {}: {}", status.as_u16(), self.endpoint, excerpt);
            return Err(QueryError::Http(status.as_u16()));
        }

        let body: AskResponse = response
            .json()
            .await
            .map_err(|e| QueryError::InvalidResponse(e.to_string()))?;

        match body.respuesta {
            Some(text) if body.status == "success" && !text.is_empty() => {
                debug!("Answer received ({} chars)", text.len());
                Ok(QueryAnswer { text })
            }
            _ => {
                warn!("Service answered with status={}", body.status);
                Err(QueryError::ApiStatus(body.status))
            }
        }
    }
}
