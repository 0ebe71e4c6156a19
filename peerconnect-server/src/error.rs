use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, info};

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures that belong to the HTTP layer rather than the connection store.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no user profile stored, complete onboarding first")]
    NoProfile,
    #[error("failed to write {0}")]
    Write(&'static str),
}

pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<StoreError>() {
            return match err {
                StoreError::RequestNotFound(_) => StatusCode::NOT_FOUND,
                StoreError::AlreadyConnected(_) | StoreError::AlreadyPending(_) => StatusCode::CONFLICT,
                StoreError::ConnectionLimitReached(_) | StoreError::PendingLimitReached(_) => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                StoreError::NoCurrentUser
                | StoreError::NoTargetUser
                | StoreError::WrongReceiver(_)
                | StoreError::SelfConnection
                | StoreError::MessageTooLong { .. } => StatusCode::BAD_REQUEST,
                StoreError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        match self.0.downcast_ref::<ApiError>() {
            Some(ApiError::NoProfile) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            info!(%status, error = %self.0, "request rejected");
        }
        (status, format!("{}", self.0)).into_response()
    }
}

// This enables using `?` on functions that return `Result<_, anyhow::Error>` to turn them into
// `Result<_, AppError>`. That way you don't need to do that manually.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
