//! Dropbox authorization legs.

use super::{AppError, AppState};
use crate::oauth::Callback;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct DeauthorizeResponse {
    deauthorized: bool,
}

pub fn create_oauth_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/oauth/start", post(oauth_start))
        .route("/api/oauth/callback", get(oauth_callback))
        .route("/api/oauth/deauthorize", post(oauth_deauthorize))
        .with_state(state)
}

/// POST /api/oauth/start
///
/// Obtains a request token and redirects the browser to the Dropbox
/// authorize page. Dropbox returns to the callback endpoint afterwards.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    state.authorize(&headers)?;

    let authorize_url = state.auth_flow.start(&state.callback_url).await?;

    info!("Redirecting to Dropbox authorize page");
    Ok(Redirect::temporary(&authorize_url))
}

/// GET /api/oauth/callback
///
/// Always answers with a redirect to the settings page: `auth=1` when an
/// access token was stored, `auth_error=1` otherwise.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(callback): Query<Callback>,
) -> Redirect {
    debug!(has_token = callback.oauth_token.is_some(), "OAuth callback received");

    let flag = match state.auth_flow.finish(&callback).await {
        Ok(account_id) => {
            info!(account_id = %account_id, "Authorization complete");
            "auth=1"
        }
        Err(e) => {
            warn!(error = %e, "Authorization failed");
            "auth_error=1"
        }
    };

    Redirect::to(&with_query(&state.settings_url, flag))
}

/// POST /api/oauth/deauthorize
async fn oauth_deauthorize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DeauthorizeResponse>, AppError> {
    state.authorize(&headers)?;

    let deauthorized = state.auth_flow.deauthorize()?;
    Ok(Json(DeauthorizeResponse { deauthorized }))
}

fn with_query(url: &str, param: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, param)
}
