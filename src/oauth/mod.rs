//! OAuth 1.0a authorization against the storage provider.
//!
//! Implements the three-legged flow:
//! 1. Admin starts authorization → request token obtained, stored, state
//!    `awaiting_redirect`
//! 2. Browser is redirected to the provider's authorize page
//! 3. Provider redirects back to the callback → state `awaiting_exchange`
//! 4. Request token exchanged for an access token, verified, persisted
//!
//! Each leg runs in its own request, so [`AuthFlow`] resumes from the state
//! persisted in the [`CredentialStore`](crate::credentials::CredentialStore).

mod flow;
mod provider;
mod session;
mod signature;

pub use flow::{AuthFlow, Callback};
pub use provider::ProviderConfig;
pub use session::OAuthSession;
pub use signature::{percent_encode, signature_base_string, Signer};

/// Authorization failures.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// App key or secret missing
    NotConfigured,
    /// Provider rejected the request (bad credentials, unauthorized or expired token)
    Rejected(String),
    /// Provider could not be reached or answered garbage
    Network(String),
    /// Callback arrived without a pending authorization
    NotStarted,
    /// Callback token does not match the pending request token
    TokenMismatch,
    /// User declined on the authorize page
    Denied,
    /// Credential store failure
    Storage(String),
}

impl AuthError {
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        AuthError::Storage(format!("{:#}", err))
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NotConfigured => write!(f, "Dropbox app key and secret are not configured"),
            AuthError::Rejected(msg) => write!(f, "Dropbox rejected the request: {}", msg),
            AuthError::Network(msg) => write!(f, "Dropbox request failed: {}", msg),
            AuthError::NotStarted => write!(f, "No authorization in progress"),
            AuthError::TokenMismatch => write!(f, "Callback token does not match the pending request token"),
            AuthError::Denied => write!(f, "Authorization was declined"),
            AuthError::Storage(msg) => write!(f, "Credential store error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}
