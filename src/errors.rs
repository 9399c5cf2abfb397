// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Coarse classification of a failed call to the vision endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connection,
    Authentication,
    RateLimit,
    ApiStatus,
    MalformedResponse,
}

impl TransportKind {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => TransportKind::Authentication,
            429 => TransportKind::RateLimit,
            _ => TransportKind::ApiStatus,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportKind::Timeout
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else if err.is_decode() {
            TransportKind::MalformedResponse
        } else {
            TransportKind::Connection
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Timeout => "Timeout",
            TransportKind::Connection => "ConnectionError",
            TransportKind::Authentication => "AuthenticationError",
            TransportKind::RateLimit => "RateLimitError",
            TransportKind::ApiStatus => "APIStatusError",
            TransportKind::MalformedResponse => "MalformedResponse",
        }
    }
}

#[derive(Error, Debug)]
pub enum EcoVisionError {
    #[error("Image encoding error: {0}")]
    Encoding(String),

    #[error("{message}")]
    Transport { kind: TransportKind, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EcoVisionError {
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        EcoVisionError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Short type tag used in `debug_info` of error analyses.
    pub fn type_name(&self) -> &'static str {
        match self {
            EcoVisionError::Encoding(_) => "EncodingError",
            EcoVisionError::Transport { kind, .. } => kind.name(),
            EcoVisionError::Validation(_) => "InputError",
            EcoVisionError::NotFound(_) => "NotFound",
            EcoVisionError::Config(_) => "ConfigError",
        }
    }
}

impl ResponseError for EcoVisionError {
    fn error_response(&self) -> HttpResponse {
        match self {
            EcoVisionError::Encoding(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Image processing error",
                "message": self.to_string()
            })),
            EcoVisionError::Transport { .. } => {
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "AI service error",
                    "message": self.to_string()
                }))
            }
            EcoVisionError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
            EcoVisionError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
                "error": "Not found",
                "message": self.to_string()
            })),
            EcoVisionError::Config(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal error",
                    "message": self.to_string()
                }))
            }
        }
    }
}
