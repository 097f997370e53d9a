//! OAuth2 client-credentials token acquisition against Azure AD.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error};

use crate::config::TenantContext;
use crate::error::{AppError, AuthError};
use crate::secure::SecureString;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters of the token shown in diagnostics.
const TOKEN_PREVIEW_CHARS: usize = 80;

/// A bearer token and, when the provider reported one, its expiry.
#[derive(Clone, Debug)]
pub struct AccessToken {
    value: SecureString,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: SecureString::new(value),
            expires_at,
        }
    }

    /// The raw token, for the `Authorization` header only.
    pub fn secret(&self) -> &str {
        self.value.as_str()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Leading part of the token followed by `...`, safe to print.
    pub fn preview(&self) -> String {
        let head: String = self.secret().chars().take(TOKEN_PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

/// Source of bearer tokens for a tenant.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire_token(&self, tenant: &TenantContext) -> Result<AccessToken, AuthError>;
}

/// Acquires a new token from the tenant's authority on every call.
pub struct ClientCredentialProvider {
    http_client: reqwest::Client,
}

impl ClientCredentialProvider {
    /// Create a new provider with its own HTTP client.
    pub fn new() -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(AppError::Client)?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialProvider {
    async fn acquire_token(&self, tenant: &TenantContext) -> Result<AccessToken, AuthError> {
        let token_endpoint = tenant.token_url();

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", tenant.client_id.as_str()),
            ("client_secret", tenant.client_secret.as_str()),
            ("resource", tenant.resource_id.as_str()),
        ];

        debug!("Requesting access token from {}", token_endpoint);

        let response = self
            .http_client
            .post(&token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(AuthError::Unreachable)?;

        let status = response.status();
        let body = response.text().await.map_err(AuthError::Unreachable)?;

        if !status.is_success() {
            error!("Token request failed: HTTP {} - {}", status, body);
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                detail: rejection_detail(&body),
            });
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        token_response.into_access_token(Utc::now())
    }
}

/// Token response from the Azure AD v1 endpoint.
///
/// The v1 endpoint reports `expires_in` and `expires_on` as JSON strings;
/// numbers are accepted as well.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<Seconds>,
    #[serde(default)]
    pub expires_on: Option<Seconds>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn value(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl TokenResponse {
    /// Validate the response and compute the expiry relative to `now`.
    pub fn into_access_token(self, now: DateTime<Utc>) -> Result<AccessToken, AuthError> {
        if let Some(token_type) = &self.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(AuthError::UnsupportedTokenType(token_type.clone()));
            }
        }

        if self.access_token.is_empty() {
            return Err(AuthError::MalformedResponse(
                "access_token is empty".to_string(),
            ));
        }

        let expires_on = self
            .expires_on
            .as_ref()
            .and_then(Seconds::value)
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0));

        let expires_at = match (expires_on, self.expires_in.as_ref().and_then(Seconds::value)) {
            (Some(expires_on), _) => Some(expires_on),
            (None, Some(secs)) => Some(
                chrono::Duration::try_seconds(secs)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AuthError::MalformedResponse(format!("expires_in out of range: {secs}"))
                    })?,
            ),
            (None, None) => None,
        };

        Ok(AccessToken::new(self.access_token, expires_at))
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Best human-readable reason from a token endpoint error body.
fn rejection_detail(body: &str) -> String {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(OAuthErrorBody {
            error_description: Some(description),
            ..
        }) => description,
        Ok(OAuthErrorBody {
            error: Some(error), ..
        }) => error,
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;

    fn tenant(server: &MockServer) -> TenantContext {
        TenantContext {
            tenant_id: "contoso.onmicrosoft.com".into(),
            client_id: "test-client".into(),
            client_secret: SecureString::new("test-secret"),
            authority_endpoint: format!("{}/", server.base_url()),
            resource_id: "https://graph.windows.net/".into(),
            api_base_url: format!("{}/", server.base_url()),
            api_version: "1.6".into(),
        }
    }

    #[test]
    fn test_token_preview_truncates() {
        let token = AccessToken::new("a".repeat(200), None);
        let preview = token.preview();
        assert_eq!(preview.len(), 83);
        assert!(preview.ends_with("..."));

        let short = AccessToken::new("abc", None);
        assert_eq!(short.preview(), "abc...");
    }

    #[test]
    fn test_string_expiry_fields() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let response: TokenResponse = serde_json::from_str(
            r#"{"token_type":"Bearer","expires_in":"3599","access_token":"tok"}"#,
        )
        .unwrap();
        let token = response.into_access_token(now).unwrap();
        assert_eq!(
            token.expires_at(),
            Some(now + chrono::Duration::seconds(3599))
        );
    }

    #[test]
    fn test_expires_on_preferred() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"tok","expires_in":3600,"expires_on":"1704070800"}"#,
        )
        .unwrap();
        let token = response.into_access_token(now).unwrap();
        assert_eq!(
            token.expires_at(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unknown_expiry() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"tok"}"#).unwrap();
        let token = response.into_access_token(Utc::now()).unwrap();
        assert!(token.expires_at().is_none());
    }

    #[test]
    fn test_out_of_range_expiry_is_malformed() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","expires_in":"99999999999999999"}"#)
                .unwrap();
        let err = response.into_access_token(Utc::now()).unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));

        let response: TokenResponse =
            serde_json::from_str(&format!(r#"{{"access_token":"t","expires_in":{}}}"#, i64::MAX))
                .unwrap();
        assert!(response.into_access_token(Utc::now()).is_err());
    }

    #[test]
    fn test_rejection_detail() {
        assert_eq!(
            rejection_detail(r#"{"error":"invalid_client","error_description":"AADSTS7000215"}"#),
            "AADSTS7000215"
        );
        assert_eq!(rejection_detail(r#"{"error":"invalid_client"}"#), "invalid_client");
        assert_eq!(rejection_detail("Bad Gateway"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_client_credentials_grant() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/contoso.onmicrosoft.com/oauth2/token")
                .body_includes("grant_type=client_credentials")
                .body_includes("client_id=test-client")
                .body_includes("client_secret=test-secret")
                .body_includes("resource=https%3A%2F%2Fgraph.windows.net%2F");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"token_type":"Bearer","expires_in":"3599","access_token":"tok-123"}"#);
        });

        let provider = ClientCredentialProvider::new().unwrap();
        let token = provider.acquire_token(&tenant(&server)).await.unwrap();

        assert_eq!(token.secret(), "tok-123");
        assert!(token.expires_at().is_some());
        mock.assert();
    }

    #[tokio::test]
    async fn test_invalid_secret_is_rejected() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(POST).path("/contoso.onmicrosoft.com/oauth2/token");
            then.status(401)
                .header("content-type", "application/json")
                .body(r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret is provided."}"#);
        });

        let provider = ClientCredentialProvider::new().unwrap();
        let err = provider.acquire_token(&tenant(&server)).await.unwrap_err();

        assert!(
            matches!(err, AuthError::Rejected { status: 401, ref detail } if detail.starts_with("AADSTS7000215")),
            "unexpected error: {err}"
        );
        mock.assert();
    }

    #[tokio::test]
    async fn test_unparseable_response() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/contoso.onmicrosoft.com/oauth2/token");
            then.status(200).body("<html>not json</html>");
        });

        let provider = ClientCredentialProvider::new().unwrap();
        let err = provider.acquire_token(&tenant(&server)).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unsupported_token_type() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/contoso.onmicrosoft.com/oauth2/token");
            then.status(200)
                .body(r#"{"access_token":"tok","token_type":"mac"}"#);
        });

        let provider = ClientCredentialProvider::new().unwrap();
        let err = provider.acquire_token(&tenant(&server)).await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedTokenType(ref t) if t == "mac"));
    }

    #[tokio::test]
    async fn test_missing_access_token() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/contoso.onmicrosoft.com/oauth2/token");
            then.status(200).body(r#"{"token_type":"Bearer"}"#);
        });

        let provider = ClientCredentialProvider::new().unwrap();
        let err = provider.acquire_token(&tenant(&server)).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_access_token() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/contoso.onmicrosoft.com/oauth2/token");
            then.status(200)
                .body(r#"{"token_type":"Bearer","access_token":""}"#);
        });

        let provider = ClientCredentialProvider::new().unwrap();
        let err = provider.acquire_token(&tenant(&server)).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(ref msg) if msg == "access_token is empty"));
    }

    #[tokio::test]
    async fn test_unreachable_authority() {
        let server = MockServer::start();
        let mut tenant = tenant(&server);
        // Nothing listens on port 1
        tenant.authority_endpoint = "http://127.0.0.1:1/".into();

        let provider = ClientCredentialProvider::new().unwrap();
        let err = provider.acquire_token(&tenant).await.unwrap_err();
        assert!(matches!(err, AuthError::Unreachable(_)));
    }
}
