//! Admin bearer-token checks for the settings and authorization endpoints.

use axum::http::HeaderMap;


/// Token from an `Authorization: Bearer <token>` header, trimmed.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, TokenError> {
    let header_value = headers
        .get("authorization")
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?;

    let (scheme, token) = header_value
        .split_once(' ')
        .ok_or(TokenError::InvalidFormat)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::InvalidFormat);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(token.to_string())
}

/// Checks the request against the configured admin token.
///
/// With no admin token configured every request is allowed.
pub fn authorize_admin(headers: &HeaderMap, admin_token: Option<&str>) -> Result<(), TokenError> {
    let Some(expected) = admin_token else {
        return Ok(());
    };

    let presented = extract_bearer_token(headers)?;
    if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        return Err(TokenError::Mismatch);
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Why an admin request was refused
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// No Authorization header
    Missing,
    /// Not "Bearer <token>"
    InvalidFormat,
    /// Nothing after the scheme
    Empty,
    /// Token does not match the admin token
    Mismatch,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Missing => write!(f, "Missing admin bearer token"),
            TokenError::InvalidFormat => write!(f, "Expected 'Authorization: Bearer <token>'"),
            TokenError::Empty => write!(f, "Admin bearer token is blank"),
            TokenError::Mismatch => write!(f, "Admin bearer token rejected"),
        }
    }
}

impl std::error::Error for TokenError {}
