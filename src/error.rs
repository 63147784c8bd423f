//! Error responses, and the fallback handler for anything the handlers don't deal with themselves.
//!
//! Handled errors render their own JSON envelope. Unhandled ones leave an [`UnhandledError`] in
//! the response extensions, and [`render_unhandled`] turns that into `{message, stack}` on the
//! way out, hiding the stack in production.

use std::any::Any;
use std::error::Error;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::config::Environment;
use crate::models::SortField;
use crate::repo::RepoError;
use crate::validation::ValidationErrors;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid page parameter")]
    InvalidPage,
    #[error("invalid limit parameter")]
    InvalidLimit,
    #[error("cannot sort books by {0:?}")]
    InvalidSortField(String),
    #[error("invalid book ID: {0}")]
    InvalidId(String),
    #[error("no book found with ID: {0}")]
    NotFound(Uuid),
    #[error("required fields are missing: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("no update data provided")]
    EmptyUpdate,
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("malformed request body: {0}")]
    MalformedBody(#[source] serde_json::Error),
    #[error("{context}: {source}")]
    Unexpected {
        context: &'static str,
        #[source]
        source: BoxError,
    },
}

impl ApiError {
    pub fn unexpected(context: &'static str, source: impl Into<BoxError>) -> ApiError {
        ApiError::Unexpected {
            context,
            source: source.into(),
        }
    }

    /// Keeps validation failures, everything else from the store is unexpected
    pub fn from_repo<E>(context: &'static str, err: RepoError<E>) -> ApiError
    where
        E: Error + Send + Sync + 'static,
    {
        match err {
            RepoError::Validation(errors) => ApiError::Validation(errors),
            RepoError::Store(e) => ApiError::unexpected(context, e),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Body of a handled error. Fields that don't apply are left out.
#[derive(Debug, Default, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl ErrorBody {
    fn new(message: impl Into<String>) -> Self {
        ErrorBody {
            message: message.into(),
            ..Default::default()
        }
    }

    fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// An error that reached the edge of the app without a response of its own
#[derive(Debug, Clone)]
pub struct UnhandledError {
    pub status: StatusCode,
    pub message: String,
    pub stack: Option<String>,
}

impl UnhandledError {
    pub fn new(status: StatusCode, message: impl Into<String>, err: &dyn Error) -> Self {
        UnhandledError {
            status,
            message: message.into(),
            stack: Some(error_chain(err)),
        }
    }

    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

fn error_chain(err: &dyn Error) -> String {
    let mut stack = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        stack.push_str("\n  caused by: ");
        stack.push_str(&cause.to_string());
        source = cause.source();
    }
    stack
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::InvalidPage => ErrorBody::new("Page number must be greater than 0")
                .error("Invalid page parameter"),
            ApiError::InvalidLimit => {
                ErrorBody::new("Limit must be between 1 and 100").error("Invalid limit parameter")
            }
            ApiError::InvalidSortField(field) => {
                let allowed: Vec<_> = SortField::ALL.iter().map(|f| f.as_str()).collect();
                ErrorBody::new(format!("Cannot sort books by '{field}'"))
                    .error("Invalid sortBy parameter")
                    .details(format!("sortBy must be one of: {}", allowed.join(", ")))
            }
            ApiError::InvalidId(_) => ErrorBody::new("Invalid book ID format")
                .error("The provided ID is not a valid book ID")
                .details("Book ID must be a UUID"),
            ApiError::NotFound(id) => ErrorBody::new("Book not found")
                .error(format!("No book found with ID: {id}"))
                .details("Please check the book ID and try again"),
            ApiError::MissingFields(fields) => ErrorBody::new("Required fields are missing")
                .errors(fields.iter().map(|f| format!("{f} is required")).collect()),
            ApiError::EmptyUpdate => {
                ErrorBody::new("No update data provided").error("Request body cannot be empty")
            }
            ApiError::Validation(errors) => {
                let messages = errors.messages();
                let details = format!("Please check the following fields: {}", messages.join(", "));
                ErrorBody::new("Validation failed")
                    .errors(messages)
                    .details(details)
            }
            ApiError::MalformedBody(err) => {
                return UnhandledError::new(status, "Request body is not valid JSON", &err)
                    .into_response();
            }
            ApiError::Unexpected { context, source } => {
                error!("{context}: {source}");
                return UnhandledError::new(status, context, source.as_ref()).into_response();
            }
        };

        (status, Json(body)).into_response()
    }
}

/// The fallback handler: renders any [`UnhandledError`] left on a response
pub async fn render_unhandled(
    State(environment): State<Environment>,
    mut response: Response,
) -> Response {
    let Some(unhandled) = response.extensions_mut().remove::<UnhandledError>() else {
        return response;
    };

    let stack = unhandled.stack.filter(|_| environment.exposes_stack());
    let body = json!({
        "message": unhandled.message,
        "stack": stack,
    });

    (unhandled.status, Json(body)).into_response()
}

/// Unknown routes go through the fallback handler too
pub async fn route_not_found(uri: Uri) -> Response {
    UnhandledError {
        status: StatusCode::NOT_FOUND,
        message: format!("Not Found - {uri}"),
        stack: None,
    }
    .into_response()
}

/// Turns a caught panic into a 500 for the fallback handler
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!("Handler panicked: {detail}");

    UnhandledError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "Internal Server Error".to_string(),
        stack: Some(detail),
    }
    .into_response()
}
