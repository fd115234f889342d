use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jobexec_core::JobExecError;

/// Carries an explicit 400 through the `anyhow::Error` chain.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<BadRequestError>().is_some() {
            StatusCode::BAD_REQUEST
        } else if let Some(e) = self.0.downcast_ref::<JobExecError>() {
            match e {
                JobExecError::InvalidEvent(_)
                | JobExecError::Json(_)
                | JobExecError::PropertyNotFound(_) => StatusCode::BAD_REQUEST,
                JobExecError::InvalidConfig(_)
                | JobExecError::InvalidImagePattern { .. }
                | JobExecError::Yaml(_) => StatusCode::UNPROCESSABLE_ENTITY,
                JobExecError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
                JobExecError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": format!("{:#}", self.0) });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
