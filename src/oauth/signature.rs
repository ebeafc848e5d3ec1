//! OAuth 1.0a HMAC-SHA1 request signing (RFC 5849).

use crate::credentials::{AppCredentials, OAuthToken};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 percent-encoding: everything but `ALPHA / DIGIT / - . _ ~`.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Signs requests on behalf of an app, optionally with a user token.
pub struct Signer<'a> {
    credentials: &'a AppCredentials,
    token: Option<&'a OAuthToken>,
}

impl<'a> Signer<'a> {
    pub fn new(credentials: &'a AppCredentials, token: Option<&'a OAuthToken>) -> Self {
        Self { credentials, token }
    }

    /// Builds the `Authorization: OAuth ...` header value with a fresh nonce and
    /// the current timestamp.
    ///
    /// `params` are the query/form parameters that take part in the signature.
    pub fn authorization_header(&self, method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let oauth_params = self.oauth_params(nonce, timestamp);
        let signature = self.signature(method, url, params, &oauth_params);

        let mut fields: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
            .collect();
        fields.push(format!("oauth_signature=\"{}\"", percent_encode(&signature)));

        format!("OAuth {}", fields.join(", "))
    }

    fn oauth_params(&self, nonce: &str, timestamp: &str) -> Vec<(&'static str, String)> {
        let mut oauth_params = vec![
            ("oauth_consumer_key", self.credentials.app_key.clone()),
            ("oauth_nonce", nonce.to_string()),
            ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp", timestamp.to_string()),
        ];
        if let Some(token) = self.token {
            oauth_params.push(("oauth_token", token.key.clone()));
        }
        oauth_params.push(("oauth_version", OAUTH_VERSION.to_string()));
        oauth_params
    }

    fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        oauth_params: &[(&'static str, String)],
    ) -> String {
        let base = signature_base_string(
            method,
            url,
            params
                .iter()
                .map(|(k, v)| (*k, *v))
                .chain(oauth_params.iter().map(|(k, v)| (*k, v.as_str()))),
        );

        let key = format!(
            "{}&{}",
            percent_encode(&self.credentials.app_secret),
            self.token
                .map(|t| percent_encode(&t.secret))
                .unwrap_or_default()
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(base.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

/// `METHOD&enc(url)&enc(sorted, encoded params)`.
pub fn signature_base_string<'p>(
    method: &str,
    url: &str,
    params: impl Iterator<Item = (&'p str, &'p str)>,
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_credentials() -> AppCredentials {
        AppCredentials {
            app_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            app_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
        }
    }

    fn reference_token() -> OAuthToken {
        OAuthToken {
            key: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        }
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(percent_encode("/"), "%2F");
    }

    #[test]
    fn test_reference_signature() {
        let credentials = reference_credentials();
        let token = reference_token();
        let signer = Signer::new(&credentials, Some(&token));

        let header = signer.authorization_header_with(
            "POST",
            "https://api.twitter.com/1.1/statuses/update.json",
            &[
                ("include_entities", "true"),
                ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
            ],
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
            "1318622958",
        );

        // hCtSmYh+iHYCEqBWrE7C7hYmtUk= percent-encoded
        assert!(
            header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""),
            "{}",
            header
        );
        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(header.contains("oauth_version=\"1.0\""));
    }

    #[test]
    fn test_base_string_sorts_encoded_params() {
        let base = signature_base_string(
            "get",
            "https://api.example.com/1/account/info",
            [("b", "2"), ("a", "x y")].into_iter(),
        );
        assert_eq!(
            base,
            "GET&https%3A%2F%2Fapi.example.com%2F1%2Faccount%2Finfo&a%3Dx%2520y%26b%3D2"
        );
    }

    #[test]
    fn test_header_without_token() {
        let credentials = reference_credentials();
        let signer = Signer::new(&credentials, None);

        let header = signer.authorization_header("POST", "https://api.example.com/1/oauth/request_token", &[]);
        assert!(header.starts_with("OAuth "));
        assert!(!header.contains("oauth_token="));
        assert!(header.contains("oauth_signature="));
    }

    #[test]
    fn test_fresh_nonce_per_request() {
        let credentials = reference_credentials();
        let signer = Signer::new(&credentials, None);

        let first = signer.authorization_header("GET", "https://api.example.com/", &[]);
        let second = signer.authorization_header("GET", "https://api.example.com/", &[]);
        assert_ne!(first, second);
    }
}
