use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::FormRejection;
use tracing::{debug, error, warn};

use parley_db::StoreError;

/// Shown instead of storage and session failures.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

pub const INVALID_FORM: &str = "Invalid form submission";
pub const INVALID_LINK: &str = "Invalid link";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Username and password not found")]
    InvalidCredentials,

    #[error("You are not a member of this room")]
    NotAMember,

    #[error("Emoji not found")]
    UnknownEmoji(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage: {0}")]
    Storage(#[source] StoreError),

    #[error("session store: {0}")]
    Session(#[source] StoreError),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AppError::DuplicateUsername,
            StoreError::NotAMember => AppError::NotAMember,
            StoreError::UnknownEmoji(name) => AppError::UnknownEmoji(name),
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::InvalidInput(msg) => AppError::Validation(msg),
            StoreError::AlreadyMember => {
                AppError::Validation("User is already a member of this room".into())
            }
            other => AppError::Storage(other),
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        debug!("Form rejected: {}", rejection.body_text());
        AppError::Validation(INVALID_FORM.into())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Path rejected: {}", rejection.body_text());
        AppError::Validation(INVALID_LINK.into())
    }
}

impl AppError {
    /// Text safe to put in front of the user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Storage(_) | AppError::Session(_) | AppError::Internal(_) => {
                GENERIC_FAILURE.to_string()
            }
            other => other.to_string(),
        }
    }

    /// Pairs the error with the page the user is sent back to.
    pub fn redirect_to(self, back: impl Into<String>) -> Rejection {
        Rejection {
            error: self,
            back: back.into(),
        }
    }
}

/// A failed request: redirects to `back` with `?error=<message>`.
#[derive(Debug)]
pub struct Rejection {
    pub error: AppError,
    pub back: String,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match &self.error {
            AppError::UnknownEmoji(name) => {
                warn!("Reaction with unknown emoji '{}'", name);
                return (StatusCode::BAD_REQUEST, "Emoji not found").into_response();
            }
            AppError::Storage(_) | AppError::Session(_) | AppError::Internal(_) => {
                error!("Request failed, redirecting to {}: {}", self.back, self.error);
            }
            _ => {}
        }
        Redirect::to(&with_error(&self.back, &self.error.user_message())).into_response()
    }
}

/// `path?error=<urlencoded message>`
pub fn with_error(path: &str, message: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(message.as_bytes()).collect();
    format!("{}?error={}", path, encoded)
}

pub trait OrRedirect<T> {
    fn or_redirect(self, back: impl Into<String>) -> Result<T, Rejection>;
}

impl<T, E: Into<AppError>> OrRedirect<T> for Result<T, E> {
    fn or_redirect(self, back: impl Into<String>) -> Result<T, Rejection> {
        self.map_err(|e| e.into().redirect_to(back))
    }
}

/// Runs blocking work (SQLite, password hashing) off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("spawn_blocking join error: {}", e)))?
}
