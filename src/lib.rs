// Configuration
pub mod config;

// Option persistence and typed credential access
pub mod credentials;

// OAuth 1.0a signing and the authorization flow
pub mod oauth;

// Dropbox storage client
pub mod dropbox;

// Destination path macros
pub mod template;

// Submission upload pipeline
pub mod upload;

// Admin notifications
pub mod notify;

// Admin bearer-token checks
pub mod auth;

// HTTP API
pub mod api;
