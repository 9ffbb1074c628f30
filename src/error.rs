use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid authentication")]
    InvalidAuthentication,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("no reference named {0:?} found")]
    ReferenceNotFound(String),

    #[error("bad magic: {0}")]
    BadMagic(String),

    #[error("malformed index: {0}")]
    MalformedIndex(String),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed block: {0}")]
    MalformedBlock(String),

    #[error("block too large ({0} bytes)")]
    BlockTooLarge(usize),

    #[error("request cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct HtsgetError {
    pub htsget: HtsgetErrorBody,
}

#[derive(Debug, Serialize)]
pub struct HtsgetErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl Error {
    /// The error name defined by the htsget protocol.  Errors describing
    /// broken data on the storage side have no protocol name of their own
    /// and surface as internal errors.
    fn error_type(&self) -> &'static str {
        match self {
            Error::InvalidAuthentication => "InvalidAuthentication",
            Error::PermissionDenied(_) => "PermissionDenied",
            Error::NotFound(_) | Error::ReferenceNotFound(_) => "NotFound",
            Error::UnsupportedFormat(_) => "UnsupportedFormat",
            Error::InvalidInput(_) => "InvalidInput",
            Error::InvalidRange(_) => "InvalidRange",
            Error::BadMagic(_)
            | Error::MalformedIndex(_)
            | Error::MalformedHeader(_)
            | Error::MalformedBlock(_)
            | Error::BlockTooLarge(_)
            | Error::Cancelled
            | Error::Io(_)
            | Error::Internal(_) => "InternalError",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidAuthentication => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) | Error::ReferenceNotFound(_) => StatusCode::NOT_FOUND,
            Error::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Error::BadMagic(_)
            | Error::MalformedIndex(_)
            | Error::MalformedHeader(_)
            | Error::MalformedBlock(_)
            | Error::BlockTooLarge(_)
            | Error::Cancelled
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = HtsgetError {
            htsget: HtsgetErrorBody {
                error: self.error_type(),
                message: self.to_string(),
            },
        };
        (self.status_code(), axum::Json(body)).into_response()
    }
}
