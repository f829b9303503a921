use lambda_http::http::StatusCode;
use thiserror::Error;

/// Failures surfaced while handling a login or proxy request.
///
/// Every variant maps to a fixed status code and a client-safe message; the
/// handler boundary turns them into `{"error": ...}` bodies.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("no route for path `{0}`")]
    NotFound(String),
    #[error("configuration error: {0}")]
    InternalConfig(&'static str),
    #[error("dynamodb error: {0}")]
    Store(String),
    #[error("upstream `{0}` timed out")]
    UpstreamTimeout(String),
    #[error("upstream `{route}` unreachable: {reason}")]
    UpstreamUnreachable { route: String, reason: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short classification string used for logging.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::InternalConfig(_) => "config",
            AppError::Store(_) => "dynamodb",
            AppError::UpstreamTimeout(_) => "upstream_timeout",
            AppError::UpstreamUnreachable { .. } => "upstream_unreachable",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::InternalConfig(_)
            | AppError::Store(_)
            | AppError::UpstreamUnreachable { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the response body.
    ///
    /// Never includes the internal detail carried by the variant: store
    /// errors, transport errors and unknown paths all get a fixed string.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::InternalConfig(msg) => msg,
            AppError::InvalidCredentials => "Invalid credentials",
            AppError::NotFound(_) => "Unknown endpoint",
            AppError::Store(_) => "Database error",
            AppError::UpstreamTimeout(_) => "Request timeout",
            AppError::UpstreamUnreachable { .. } => "Failed to call backend API",
            AppError::Internal(_) => "Internal server error",
        }
    }
}

impl From<lambda_http::http::Error> for AppError {
    fn from(err: lambda_http::http::Error) -> Self {
        AppError::Internal(format!("failed to build response: {err}"))
    }
}

/// Cold-start configuration failures; these abort the runtime before it
/// accepts any invocation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{name}` must be a positive integer, got `{value}`")]
    InvalidNumber { name: &'static str, value: String },
}
