//! HTTP API.
//!
//! ```text
//! GET/PUT  /api/settings           app key/secret, upload directory, remove flag
//! POST     /api/oauth/start        leg 1: redirect to the Dropbox authorize page
//! GET      /api/oauth/callback     leg 2: exchange, then redirect to the settings page
//! POST     /api/oauth/deauthorize  forget the access token
//! POST     /api/submissions        run the upload pipeline for one submission
//! ```
//!
//! Everything except the callback requires the admin bearer token when one is
//! configured. The callback is reached through a browser redirect from Dropbox.

mod oauth;
mod settings;
mod submissions;

pub use oauth::create_oauth_router;
pub use settings::{create_settings_router, SettingsResponse, SettingsUpdate};
pub use submissions::{create_submission_router, SubmissionRequest};

use crate::auth::{authorize_admin, TokenError};
use crate::credentials::CredentialStore;
use crate::oauth::{AuthError, AuthFlow};
use crate::upload::UploadDispatcher;
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: CredentialStore,
    pub auth_flow: AuthFlow,
    pub dispatcher: UploadDispatcher,
    pub admin_token: Option<String>,
    /// Where Dropbox sends the browser back to after the authorize page
    pub callback_url: String,
    /// Admin settings page; receives `auth=1` or `auth_error=1`
    pub settings_url: String,
}

impl AppState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), AppError> {
        authorize_admin(headers, self.admin_token.as_deref()).map_err(AppError::from)
    }
}

/// Create the full API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .merge(create_settings_router(state.clone()))
        .merge(create_oauth_router(state.clone()))
        .merge(create_submission_router(state))
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types
#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    ServerError(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        warn!(error = %err, "Rejected admin request");
        AppError::Unauthorized(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotConfigured
            | AuthError::NotStarted
            | AuthError::TokenMismatch
            | AuthError::Denied => AppError::BadRequest(err.to_string()),
            AuthError::Rejected(_) | AuthError::Network(_) => AppError::BadGateway(err.to_string()),
            AuthError::Storage(_) => AppError::ServerError(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::ServerError(format!("{:#}", err))
    }
}
