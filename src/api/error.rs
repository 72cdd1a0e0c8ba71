use crate::session::SessionError;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;
use tracing::error;

#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    Session(SessionError),

    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(&'static str),

    #[display(fmt = "{}", _0)]
    Forbidden(&'static str),

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "{}", _0)]
    Conflict(&'static str),

    #[display(fmt = "Internal Server Error")]
    Database(sqlx::Error),
}

impl std::error::Error for ApiError {}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError::Session(e)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        // duplicate key only; SQLSTATE 23000 also covers foreign keys
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return ApiError::Conflict("Record already exists");
            }
        }
        ApiError::Database(e)
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Session(e) => e.code(),
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Database(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Session(e) => match e {
                SessionError::InvalidTransition | SessionError::AlreadyClosed(_) => {
                    StatusCode::CONFLICT
                }
                SessionError::RecordNotFound(_) => StatusCode::NOT_FOUND,
                SessionError::NoActiveSession | SessionError::InvalidTimestamp { .. } => {
                    StatusCode::BAD_REQUEST
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Database(e) = self {
            error!(error = %e, "Database error");
        }

        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string(),
            "code": self.code(),
        }))
    }
}
