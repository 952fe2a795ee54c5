//! Bond verification client.

use common::errors::{AppError, AppResult};
use common::models::AggregateResult;

/// Path of the verification endpoint, appended to the configured base URL.
pub const VERIFY_PATH: &str = "/v1/data_driven_decaf/verify";

/// Client for the Bond verification service.
#[derive(Clone)]
pub struct BondClient {
    base_url: String,
    http: reqwest::Client,
}

impl BondClient {
    /// Creates a client on top of a shared HTTP client.
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Submits `result` for verification and returns the raw response body.
    ///
    /// # Errors
    /// Returns `AppError::VerificationFailed` on transport errors and on any
    /// non-2xx status. The rejected body is logged.
    pub async fn verify(&self, result: &AggregateResult) -> AppResult<String> {
        let url = format!("{}{}", self.base_url, VERIFY_PATH);

        let response = self
            .http
            .post(&url)
            .json(result)
            .send()
            .await
            .map_err(|e| AppError::VerificationFailed(format!("could not reach Bond: {}", e)))?;

        let status = response.status();
        // diagnostic only
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, body = %body, "verification rejected");
            return Err(AppError::VerificationFailed(format!(
                "expected 2xx response, got {}",
                status
            )));
        }

        tracing::debug!(status = %status, body = %body, "verification accepted");
        Ok(body)
    }
}
