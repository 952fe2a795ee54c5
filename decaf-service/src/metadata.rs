//! Platform project detection.
//!
//! On Cloud Run / GCE the project id is available from the metadata server.

use std::time::Duration;

/// Metadata server endpoint returning the project id as plain text.
pub const PROJECT_ID_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/project/project-id";

const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

/// Asks the metadata server at `url` for the project id.
///
/// Returns `None` off-platform or on any error; startup continues without it.
pub async fn detect_project_id(http: &reqwest::Client, url: &str) -> Option<String> {
    let response = match http
        .get(url)
        .header("Metadata-Flavor", "Google")
        .timeout(METADATA_TIMEOUT)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(status = %response.status(), "metadata server refused project id");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "metadata server unavailable, project id unknown");
            return None;
        }
    };

    match response.text().await {
        Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}
