use super::{AppError, AppState};
use crate::credentials::UploadSettings;
use axum::{extract::State, http::HeaderMap, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Current settings. The app secret is reported as present/absent only.
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub app_key: String,
    pub has_app_secret: bool,
    pub directory: String,
    pub remove_after_upload: bool,
    /// An access token is stored
    pub authorized: bool,
    /// Pending authorization leg, empty when none
    pub auth_state: String,
}

/// Partial update body. Only fields present in the request are changed;
/// strings are trimmed before they are stored.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SettingsUpdate {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub directory: Option<String>,
    pub remove_after_upload: Option<bool>,
}

pub fn create_settings_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/settings", get(get_settings).put(put_settings))
        .with_state(state)
}

/// GET /api/settings
async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SettingsResponse>, AppError> {
    state.authorize(&headers)?;
    Ok(Json(current_settings(&state)?))
}

/// PUT /api/settings
async fn put_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>, AppError> {
    state.authorize(&headers)?;

    let store = &state.store;
    if let Some(app_key) = &update.app_key {
        store.save_app_key(app_key.trim())?;
    }
    if let Some(app_secret) = &update.app_secret {
        store.save_app_secret(app_secret.trim())?;
    }

    if update.directory.is_some() || update.remove_after_upload.is_some() {
        let current = store.upload_settings()?;
        let settings = UploadSettings {
            directory: update
                .directory
                .as_deref()
                .map(|d| d.trim().to_string())
                .unwrap_or(current.directory),
            remove_after_upload: update
                .remove_after_upload
                .unwrap_or(current.remove_after_upload),
        };
        store.save_upload_settings(&settings)?;
    }

    info!(
        app_key = update.app_key.is_some(),
        app_secret = update.app_secret.is_some(),
        "Settings updated"
    );
    Ok(Json(current_settings(&state)?))
}

fn current_settings(state: &AppState) -> Result<SettingsResponse, AppError> {
    let store = &state.store;
    let upload = store.upload_settings()?;

    Ok(SettingsResponse {
        app_key: store.app_key()?.unwrap_or_default(),
        has_app_secret: store.has_app_secret()?,
        directory: upload.directory,
        remove_after_upload: upload.remove_after_upload,
        authorized: store.access_token()?.is_some(),
        auth_state: store.auth_state()?.as_str().to_string(),
    })
}
