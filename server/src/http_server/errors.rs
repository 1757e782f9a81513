use std::fmt::{Debug, Display};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use color_eyre::Report;
use db::cooking::CookingError;
use serde::{Deserialize, Serialize};

/// An error on its way out of a handler, with the status it should be
/// reported as.
pub struct ServerError(pub(crate) Report, pub(crate) StatusCode);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl ServerError {
    pub(crate) fn new(report: impl Into<Report>, status: StatusCode) -> Self {
        ServerError(report.into(), status)
    }

    fn cooking_error(&self) -> Option<&CookingError> {
        self.0.downcast_ref::<CookingError>()
    }

    fn code(&self) -> &'static str {
        if let Some(err) = self.cooking_error() {
            return err.code();
        }

        match self.1 {
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => "invalid_input",
            _ => "internal",
        }
    }

    /// Messages for server errors never carry the underlying report. Known
    /// workflow failures use their own fixed wording.
    fn public_message(&self) -> String {
        if !self.1.is_server_error() {
            return self.0.to_string();
        }

        match self.cooking_error() {
            Some(err) => err.to_string(),
            None => "Internal Server Error".to_string(),
        }
    }
}

fn status_for(err: &CookingError) -> StatusCode {
    match err {
        CookingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CookingError::NotFound { .. } => StatusCode::NOT_FOUND,
        CookingError::Persistence(_) | CookingError::GroceryListCreation { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Status Code: {}\n", self.1))?;
        f.write_str("ServerError: \n")?;

        Debug::fmt(&self.0, f)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.1.is_server_error() {
            sentry::capture_error(&*self.0);
            tracing::error!(error = ?self, "ServerError");
        } else {
            tracing::info!(status = %self.1, error = %self.0, "Request rejected");
        }

        let body = ErrorBody {
            error: self.public_message(),
            code: self.code().to_string(),
        };

        (self.1, Json(body)).into_response()
    }
}

impl<E> From<E> for ServerError
where
    E: Into<Report>,
{
    fn from(err: E) -> Self {
        let report = err.into();
        let status = report
            .downcast_ref::<CookingError>()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, status_for);

        ServerError(report, status)
    }
}

pub(crate) trait WithStatus<T> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError>;
}

impl<T, E> WithStatus<T> for Result<T, E>
where
    E: Into<Report>,
{
    fn with_status(self, status: StatusCode) -> Result<T, ServerError> {
        self.map_err(|err| ServerError::new(err, status))
    }
}
