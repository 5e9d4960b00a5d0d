//! HTTP plumbing shared by the backends.

use std::time::Duration;

use docbot_core::{Error, RetrievalError};
use tracing::warn;

pub(crate) fn client(timeout: Duration, accept_invalid_certs: bool) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))
}

/// Map a non-success HTTP status to a retrieval error.
pub(crate) async fn check_status(
    response: reqwest::Response,
    index: &str,
) -> Result<reqwest::Response, RetrievalError> {
    let status = response.status().as_u16();

    if status == 401 || status == 403 {
        return Err(RetrievalError::AuthenticationFailed(
            "Invalid credentials or insufficient permissions".into(),
        ));
    }

    if status == 404 {
        return Err(RetrievalError::IndexNotFound(index.to_string()));
    }

    if !(200..300).contains(&status) {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Vector store returned error");
        return Err(RetrievalError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

pub(crate) fn send_error(e: reqwest::Error) -> RetrievalError {
    if e.is_timeout() {
        RetrievalError::Timeout(e.to_string())
    } else {
        RetrievalError::Network(e.to_string())
    }
}

pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, RetrievalError> {
    response
        .json()
        .await
        .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))
}
