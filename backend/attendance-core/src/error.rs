// src/error.rs

use reqwest::StatusCode;
use thiserror::Error;

// --- Remote boundary errors ---

/// Failure of a single call to the attendance service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Unauthorized (Status 401)")]
    Unauthorized,

    #[error("Rate limit exceeded (Status 429)")]
    RateLimited,

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Attendance API error: Status={status}, Message='{message}'")]
    Status { status: StatusCode, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::InvalidUrl(e.to_string())
    }
}

impl ApiError {
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            _ => ApiError::Status { status, message },
        }
    }
}

// --- Engine errors ---

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Expected when a run is superseded or torn down. Never shown to the user.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: Box<EngineError>,
    },

    #[error("Invalid date range. 'From Date' cannot be after 'To Date'.")]
    InvalidWindow,

    #[error("No employee data available.")]
    EmptyDirectory,

    #[error("{0}")]
    Api(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ApiError> for EngineError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized => EngineError::Unauthorized,
            ApiError::RateLimited => EngineError::RateLimited,
            ApiError::NetworkUnavailable(msg) => EngineError::NetworkUnavailable(msg),
            other => EngineError::Api(other.to_string()),
        }
    }
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, EngineError::Unauthorized)
    }

    /// Text for the notification sink.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Unauthorized => "Unauthorized: Please log in again".to_string(),
            EngineError::NetworkUnavailable(_) => {
                "Network error: Please check your connection".to_string()
            }
            EngineError::Exhausted {
                operation, last, ..
            } => format!("Failed to {}: {}", operation, last.user_message()),
            other => other.to_string(),
        }
    }
}
