/// Error types for charset configuration and form decoding
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Startup errors. These abort the process; nothing retries them.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The label is not a charset the runtime knows about
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),

    /// The charset exists but `&`, `=`, `%` and `+` would not keep their ASCII meaning
    #[error("Charset {0} is not ASCII-compatible and cannot carry form data")]
    IncompatibleCharset(&'static str),

    /// A numeric setting could not be parsed
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors raised while turning request bytes into form fields
#[derive(Debug, Error)]
pub enum DecodeError {
    /// `%` not followed by two hex digits
    #[error("Malformed percent-escape at byte {position} in {segment:?}")]
    MalformedEscape { segment: String, position: usize },

    /// Bytes that are not a valid sequence in the charset
    #[error("Byte sequence is not valid {charset}")]
    InvalidSequence { charset: &'static str },

    /// The body stream was already taken by an earlier read
    #[error("Request body has already been consumed")]
    BodyConsumed,

    /// Reading the body failed or exceeded the size limit
    #[error("Failed to read request body: {0}")]
    Body(#[from] axum::Error),
}

/// Errors raised while serializing form fields into a charset
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Character {ch:?} cannot be represented in {charset}")]
    Unmappable { ch: char, charset: &'static str },
}

/// Handler-facing error, rendered as an HTTP response
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Decode(DecodeError::BodyConsumed) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Decode(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Rejected request body");
        }
        (status, self.to_string()).into_response()
    }
}
