use http::StatusCode;
use thiserror::Error;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is used to generate a synthetic error response
pub(crate) type HttpResult<T> = std::result::Result<T, HttpError>;

/// Describes things that can go wrong while routing or forwarding a request
#[derive(Debug, Error, Clone)]
pub enum HttpError {
    #[error("Missing host in request")]
    MissingHost,

    #[error("No route for host '{0}'")]
    NoRoute(String),

    #[error("Proxy engine is closed")]
    EngineClosed,

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Failed to get response from backend on port {port}: {reason}")]
    BackendUnavailable { port: u16, reason: String },
}

impl HttpError {
    pub fn error_type(&self) -> &'static str {
        match self {
            HttpError::MissingHost => "missing_host",
            HttpError::NoRoute(_) => "no_route",
            HttpError::EngineClosed => "engine_closed",
            HttpError::InvalidUri(_) => "invalid_uri",
            HttpError::BackendUnavailable { .. } => "backend_unavailable",
        }
    }
}

impl From<&HttpError> for StatusCode {
    fn from(e: &HttpError) -> StatusCode {
        match e {
            HttpError::MissingHost => StatusCode::BAD_REQUEST,
            HttpError::NoRoute(_) => StatusCode::NOT_FOUND,
            HttpError::EngineClosed => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::InvalidUri(_) => StatusCode::BAD_REQUEST,
            HttpError::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}
