//! Analysis-platform credential exchange.
//!
//! Worker invocations are short-lived and process lifetime between
//! invocations is not guaranteed, so tokens are fetched fresh per
//! invocation and never cached.

use serde::Deserialize;

use crate::error::EnrichmentError;
use tapsync_core::SecretError;

/// Credentials for the analysis platform, as stored in the secret store.
///
/// The [`Debug`] impl redacts the client secret.
#[derive(Clone, Deserialize)]
pub struct ApiCredentials {
    /// Platform endpoint, either a bare host or a full base URL.
    pub api_endpoint: String,
    /// OAuth2 client id.
    pub api_id: String,
    /// OAuth2 client secret.
    pub api_secret: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_endpoint", &self.api_endpoint)
            .field("api_id", &self.api_id)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

impl ApiCredentials {
    /// Parse the secret-store payload (`{api_endpoint, api_id, api_secret}`).
    pub fn from_secret(secret_id: &str, raw: &str) -> Result<Self, SecretError> {
        serde_json::from_str(raw).map_err(|e| SecretError::InvalidValue {
            secret_id: secret_id.to_string(),
            detail: e.to_string(),
        })
    }

    /// Base URL for API requests. Bare hostnames get an https scheme.
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.api_endpoint.contains("://") {
            self.api_endpoint.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.api_endpoint.trim_end_matches('/'))
        }
    }
}

/// A short-lived bearer token. Redacted in Debug output.
#[derive(Clone)]
pub struct AccessToken(pub(crate) String);

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Perform the OAuth2 client-credentials exchange against the platform's
/// token endpoint.
pub async fn fetch_token(
    http: &reqwest::Client,
    credentials: &ApiCredentials,
) -> Result<AccessToken, EnrichmentError> {
    let url = format!("{}/oauth2/token", credentials.base_url());

    let response = http
        .post(&url)
        .basic_auth(&credentials.api_id, Some(&credentials.api_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .map_err(|e| EnrichmentError::Auth(format!("token request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(EnrichmentError::Auth(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| EnrichmentError::Auth(format!("failed to parse token response: {e}")))?;

    Ok(AccessToken(token.access_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https_scheme() {
        let credentials = ApiCredentials {
            api_endpoint: "eda.example.com".into(),
            api_id: "id".into(),
            api_secret: "secret".into(),
        };
        assert_eq!(credentials.base_url(), "https://eda.example.com");
    }

    #[test]
    fn full_url_kept_and_trailing_slash_trimmed() {
        let credentials = ApiCredentials {
            api_endpoint: "http://127.0.0.1:9000/".into(),
            api_id: "id".into(),
            api_secret: "secret".into(),
        };
        assert_eq!(credentials.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn debug_redacts_secret() {
        let credentials = ApiCredentials {
            api_endpoint: "eda.example.com".into(),
            api_id: "id".into(),
            api_secret: "hunter2".into(),
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn parses_secret_payload() {
        let raw = r#"{"api_endpoint":"eda.example.com","api_id":"abc","api_secret":"xyz"}"#;
        let credentials = ApiCredentials::from_secret("s-1", raw).unwrap();
        assert_eq!(credentials.api_id, "abc");
    }

    #[test]
    fn malformed_secret_is_invalid_value() {
        let err = ApiCredentials::from_secret("s-1", "not-json").unwrap_err();
        assert!(matches!(err, SecretError::InvalidValue { .. }));
    }
}
