//! Error types shared by all request-processing stages.
//!
//! Every failure aborts the current request only. The HTTP layer renders
//! them as a plain-text `Error: <message>` body with status 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result alias used across the services.
pub type AppResult<T> = Result<T, AppError>;

/// Application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Required connection parameters are missing from the environment.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),

    /// `DB_TYPE` is not one of the recognised backend kinds.
    #[error("unknown backend kind {0:?}")]
    UnknownBackend(String),

    /// The clustered backend was selected without `DB_CLUSTER`.
    #[error("cluster required for this backend (set DB_CLUSTER)")]
    ClusterRequired,

    /// Dialing or authenticating against the database failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The aggregation query or a row scan failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The verification service could not be reached or rejected the result.
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}

impl AppError {
    /// Returns the short error code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ConfigurationMissing(_) => "CONFIGURATION_MISSING",
            AppError::UnknownBackend(_) => "UNKNOWN_BACKEND",
            AppError::ClusterRequired => "CLUSTER_REQUIRED",
            AppError::ConnectionFailed(_) => "CONNECTION_FAILED",
            AppError::QueryFailed(_) => "QUERY_FAILED",
            AppError::VerificationFailed(_) => "VERIFICATION_FAILED",
        }
    }

    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(code = self.code(), error = %self, "request failed");
        (self.status_code(), format!("Error: {}", self)).into_response()
    }
}
