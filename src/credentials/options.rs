//! String-keyed option storage.
//!
//! The upload pipeline and the authorization flow only ever see options through
//! [`OptionStore`], so the SQLite store and the in-memory store are
//! interchangeable.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// Keys persisted by formdrop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptionKey {
    AppKey,
    AppSecret,
    UploadDirectory,
    RemoveAfterUpload,
    TempToken,
    AccessToken,
    AuthState,
}

impl OptionKey {
    pub const ALL: [OptionKey; 7] = [
        OptionKey::AppKey,
        OptionKey::AppSecret,
        OptionKey::UploadDirectory,
        OptionKey::RemoveAfterUpload,
        OptionKey::TempToken,
        OptionKey::AccessToken,
        OptionKey::AuthState,
    ];

    /// Column value used in the options table.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::AppKey => "dropbox_key",
            OptionKey::AppSecret => "dropbox_secret",
            OptionKey::UploadDirectory => "dropbox_directory",
            OptionKey::RemoveAfterUpload => "dropbox_remove",
            OptionKey::TempToken => "dropbox_temp_token",
            OptionKey::AccessToken => "dropbox_access_token",
            OptionKey::AuthState => "dropbox_state",
        }
    }

    /// Whether the value is encrypted at rest.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            OptionKey::AppSecret | OptionKey::TempToken | OptionKey::AccessToken
        )
    }
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide persisted key-value store.
pub trait OptionStore: Send + Sync {
    fn get_option(&self, key: OptionKey) -> Result<Option<String>>;

    fn set_option(&self, key: OptionKey, value: &str) -> Result<()>;

    /// Returns `true` if a value was removed.
    fn delete_option(&self, key: OptionKey) -> Result<bool>;
}

/// Volatile option store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryOptionStore {
    values: Mutex<HashMap<OptionKey, String>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for MemoryOptionStore {
    fn get_option(&self, key: OptionKey) -> Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(&key).cloned())
    }

    fn set_option(&self, key: OptionKey, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key, value.to_string());
        Ok(())
    }

    fn delete_option(&self, key: OptionKey) -> Result<bool> {
        Ok(self.values.lock().unwrap().remove(&key).is_some())
    }
}
