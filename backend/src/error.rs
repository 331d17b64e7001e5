use axum::http::StatusCode;
use axum::Json;
use newsdesk_shared::CmsError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

/// Translate the domain taxonomy into HTTP status classes. Partial
/// deletes surface as server faults: they signal a consistency break that
/// needs operator attention, not a client retry.
pub fn error_response(err: CmsError) -> ApiError {
    let status = match &err {
        CmsError::NotFound(_) => StatusCode::NOT_FOUND,
        CmsError::UnknownLabel(_)
        | CmsError::MalformedDocument(_)
        | CmsError::Conflict(_)
        | CmsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CmsError::DependencyMissing(_) => StatusCode::CONFLICT,
        CmsError::PartialDelete { .. } => {
            tracing::error!("consistency break: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        },
        CmsError::Storage(_) | CmsError::Serde(_) => {
            tracing::error!("storage failure: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        },
    };
    (status, Json(ErrorResponse { error: err.to_string(), code: status.as_u16() }))
}

pub fn internal_error<E: std::fmt::Display>(context: &str, err: E) -> ApiError {
    tracing::error!("{context}: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: context.to_string(), code: 500 }),
    )
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message.into(), code: 400 }),
    )
}
