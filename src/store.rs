//! HTTP client for the run-record document store.
//!
//! The store exposes a single documents endpoint that takes the lookback
//! window in days and returns the matching run records as raw JSON. Failures
//! here are `FetchError`, kept separate from aggregation errors so the
//! caller can tell a dead store from a bad record.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const DOCUMENTS_PATH: &str = "/getdocumentsprinceton";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("run store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("run store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode run store response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsResponse {
    pub docs: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct DocumentsRequest {
    // The store expects the day count as a string, matching the dropdown
    // values the original page posted.
    days: String,
}

#[derive(Debug, Clone)]
pub struct RunStoreClient {
    client: Client,
    base_url: String,
}

impl RunStoreClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("runlog-backend/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the raw run documents for the trailing `days` window.
    ///
    /// Transient failures (transport errors, 5xx) are retried with
    /// exponential backoff; 4xx responses fail immediately.
    pub async fn fetch_documents(&self, days: u32) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}{DOCUMENTS_PATH}", self.base_url);
        let body = DocumentsRequest {
            days: days.to_string(),
        };

        let mut backoff = INITIAL_BACKOFF_MS;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    let text = response.text().await?;
                    let parsed: DocumentsResponse = serde_json::from_str(&text)?;
                    info!(days, count = parsed.docs.len(), "fetched run documents");
                    return Ok(parsed.docs);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if status.is_client_error() || attempt >= MAX_RETRIES {
                        return Err(FetchError::Status { status, body });
                    }
                    warn!(%status, attempt, "run store error, retrying");
                }
                Err(err) => {
                    if attempt >= MAX_RETRIES {
                        return Err(FetchError::Transport(err));
                    }
                    warn!(error = %err, attempt, "run store request failed, retrying");
                }
            }

            debug!(backoff_ms = backoff, "backing off before retry");
            sleep(Duration::from_millis(backoff)).await;
            backoff = (backoff * 2).min(30_000);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // axum and reqwest disagree on the `http` major version, so the canned
    // handlers spell out axum's status type.
    use axum::{http::StatusCode as ServerStatus, routing::post, Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn posts_days_and_returns_docs() {
        let app = Router::new().route(
            DOCUMENTS_PATH,
            post(|Json(req): Json<Value>| async move {
                Json(json!({ "docs": [ { "days_seen": req["days"] }, {} ] }))
            }),
        );
        let base = serve(app).await;

        let client = RunStoreClient::new(base, Duration::from_secs(5));
        let docs = client.fetch_documents(5).await.unwrap();
        assert_eq!(docs.len(), 2);
        // Day count travels as a string, exactly as the dropdown posted it.
        assert_eq!(docs[0]["days_seen"], "5");
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let app = Router::new().route(
            DOCUMENTS_PATH,
            post(|| async { (ServerStatus::UNPROCESSABLE_ENTITY, "bad days") }),
        );
        let base = serve(app).await;

        let client = RunStoreClient::new(base, Duration::from_secs(5));
        match client.fetch_documents(5).await {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(body, "bad days");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_surface_after_retries() {
        let app = Router::new().route(
            DOCUMENTS_PATH,
            post(|| async { (ServerStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;

        let client = RunStoreClient::new(base, Duration::from_secs(5));
        match client.fetch_documents(5).await {
            Err(FetchError::Status { status, .. }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_payload_is_a_decode_error() {
        let app = Router::new().route(DOCUMENTS_PATH, post(|| async { "not json" }));
        let base = serve(app).await;

        let client = RunStoreClient::new(base, Duration::from_secs(5));
        assert!(matches!(
            client.fetch_documents(5).await,
            Err(FetchError::Decode(_))
        ));
    }
}
