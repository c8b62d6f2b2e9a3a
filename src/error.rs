//! Portal error type and its HTTP mapping
//!
//! Upstream failures deliberately carry their diagnostic detail and a hint
//! toward the escalation path into the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::progress::ProgressError;

/// Hint returned with every failed monitoring-function call
pub const UPSTREAM_HINT: &str = "Try using \"token\" as the metadata parameter";

/// Hint returned when the monitoring function is not deployed
pub const UNCONFIGURED_HINT: &str = "The monitoring-function Cloud Function must be deployed";

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Malformed submission
    #[error("{0}")]
    Validation(String),

    /// Gated operation reached without the credential it needs
    #[error("Authentication required")]
    AuthRequired { hint: String },

    /// No monitoring function endpoint configured
    #[error("Monitoring function not configured")]
    UpstreamUnavailable,

    /// Monitoring function call failed or timed out
    #[error("Failed to call monitoring function: {details}")]
    Upstream { details: String },

    #[error(transparent)]
    Progress(#[from] ProgressError),
}

pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::AuthRequired { .. } => StatusCode::OK,
            PortalError::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            PortalError::Progress(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            PortalError::Validation(message) => json!({
                "success": false,
                "message": message,
            }),
            PortalError::AuthRequired { hint } => json!({
                "login_required": true,
                "hint": hint,
            }),
            PortalError::UpstreamUnavailable => json!({
                "error": "Monitoring function not configured",
                "hint": UNCONFIGURED_HINT,
            }),
            PortalError::Upstream { details } => json!({
                "error": "Failed to call monitoring function",
                "details": details,
                "hint": UPSTREAM_HINT,
            }),
            PortalError::Progress(e) => json!({
                "error": e.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PortalError::Validation("Please enter a flag".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PortalError::UpstreamUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            PortalError::Upstream { details: "timed out".into() }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PortalError::AuthRequired { hint: String::new() }.status(),
            StatusCode::OK
        );
    }

    #[test]
    fn test_progress_error_converts() {
        let err: PortalError = ProgressError::UnknownModule(9).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Unknown module: 9");
    }
}
