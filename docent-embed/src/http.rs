//! JSON-over-HTTP plumbing shared by the embedding and generation clients.

use crate::error::{MAX_ERROR_BODY_CHARS, ModelError, Result, truncate_body};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Build the HTTP client used for one service.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ModelError::invalid_config(format!("failed to build HTTP client: {e}")))
}

/// POST `body` as JSON to `endpoint` and decode the JSON reply.
///
/// Send failures become [`ModelError::UnreachableService`], non-success
/// statuses become [`ModelError::ServiceError`] carrying the truncated body,
/// and undecodable success bodies become [`ModelError::MalformedResponse`].
pub(crate) async fn post_json<B, R>(client: &Client, endpoint: &str, body: &B) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(endpoint)
        .json(body)
        .send()
        .await
        .map_err(|source| ModelError::UnreachableService {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        tracing::debug!("{} answered {}", endpoint, status);
        return Err(ModelError::ServiceError {
            endpoint: endpoint.to_string(),
            status,
            body: truncate_body(&body, MAX_ERROR_BODY_CHARS),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ModelError::malformed(endpoint, format!("failed to read body: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ModelError::malformed(endpoint, format!("invalid JSON payload: {e}")))
}
