//! Error types for Reelsmith services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,

    // Resource errors (4xxx)
    NotFound,
    AgentNotFound,
    JobNotFound,

    // Quota / rate limiting (6xxx)
    RateLimited,
    QuotaExceeded,

    // Webhook errors (7xxx)
    SignatureVerification,

    // External service errors (8xxx)
    VendorError,
    VendorUnconfigured,

    // Pipeline errors (85xx)
    FrameExtraction,
    Canceled,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::AgentNotFound => 4002,
            ErrorCode::JobNotFound => 4003,

            // Quota (6xxx)
            ErrorCode::RateLimited => 6001,
            ErrorCode::QuotaExceeded => 6002,

            // Webhooks (7xxx)
            ErrorCode::SignatureVerification => 7001,

            // External (8xxx)
            ErrorCode::VendorError => 8001,
            ErrorCode::VendorUnconfigured => 8002,

            // Pipeline (85xx)
            ErrorCode::FrameExtraction => 8501,
            ErrorCode::Canceled => 8502,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Agent not found: {id}")]
    AgentNotFound { id: String },

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    // Rate limiting (request-level, distinct from per-session quota)
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Per-session free-tier quota
    #[error("Free tier limit reached for {kind}: {used}/{limit} this month")]
    QuotaExceeded {
        kind: String,
        limit: u64,
        used: u64,
        upgrade_url: String,
    },

    // Webhook signature verification
    #[error("Webhook signature verification failed: {message}")]
    SignatureVerification { message: String },

    // External service errors
    #[error("{vendor} error ({status}): {message}")]
    Vendor {
        vendor: &'static str,
        status: u16,
        message: String,
    },

    #[error("{vendor} is not configured (missing API key)")]
    VendorUnconfigured { vendor: &'static str },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Pipeline errors
    #[error("Frame extraction failed: {message}")]
    FrameExtraction { message: String },

    #[error("Operation canceled")]
    Canceled,

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::AgentNotFound { .. } => ErrorCode::AgentNotFound,
            AppError::JobNotFound { .. } => ErrorCode::JobNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            AppError::SignatureVerification { .. } => ErrorCode::SignatureVerification,
            AppError::Vendor { .. } => ErrorCode::VendorError,
            AppError::VendorUnconfigured { .. } => ErrorCode::VendorUnconfigured,
            AppError::HttpClient(_) => ErrorCode::VendorError,
            AppError::FrameExtraction { .. } => ErrorCode::FrameExtraction,
            AppError::Canceled => ErrorCode::Canceled,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. }
            | AppError::SignatureVerification { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::AgentNotFound { .. }
            | AppError::JobNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } | AppError::QuotaExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }

            // 500 Internal Server Error
            AppError::FrameExtraction { .. }
            | AppError::Canceled
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Vendor { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::VendorUnconfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_url: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        // Quota errors carry remaining-usage metadata so clients can
        // render the paywall without a second request.
        let details = match &self {
            AppError::QuotaExceeded {
                limit,
                used,
                upgrade_url,
                ..
            } => ErrorDetails {
                code,
                message,
                limit: Some(*limit),
                used: Some(*used),
                remaining: Some(limit.saturating_sub(*used)),
                upgrade_url: Some(upgrade_url.clone()),
            },
            _ => ErrorDetails {
                code,
                message,
                limit: None,
                used: None,
                remaining: None,
                upgrade_url: None,
            },
        };

        (status, Json(ErrorResponse { error: details })).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::JobNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::JobNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Prompt must not be empty".into(),
            field: Some("prompt".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_quota_error_metadata() {
        let err = AppError::QuotaExceeded {
            kind: "agent_call".into(),
            limit: 3,
            used: 3,
            upgrade_url: "https://reelsmith.dev/upgrade".into(),
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code(), ErrorCode::QuotaExceeded);
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_vendor_unconfigured_is_503() {
        let err = AppError::VendorUnconfigured { vendor: "luma" };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_server_error());
    }
}
