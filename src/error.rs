use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ErrorBody;

/// Rejected ingress body. Reported to the producer, never fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngressError {
    #[error("Missing log body")]
    MissingBody,

    #[error("Malformed log body: {0}")]
    Malformed(String),
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Errors surfaced by the dashboard connection manager
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,

    #[error("channel error: {0}")]
    Channel(String),

    #[error("connection manager disposed")]
    Disposed,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid websocket url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid listen address {addr:?}: {reason}")]
    InvalidAddr { addr: String, reason: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
