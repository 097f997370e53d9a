//! Azure AD Graph API client for B2C directory users, applications and
//! extension properties.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, info};

use super::DirectoryRequest;
use crate::auth::TokenProvider;
use crate::config::TenantContext;
use crate::error::{AppError, GraphApiError};

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticated directory API client for one tenant.
pub struct GraphClient {
    http_client: reqwest::Client,
    tenant: TenantContext,
    tokens: Box<dyn TokenProvider>,
}

impl GraphClient {
    /// Create a new Graph client.
    pub fn new(tenant: TenantContext, tokens: Box<dyn TokenProvider>) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(AppError::Client)?;

        Ok(Self {
            http_client,
            tenant,
            tokens,
        })
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub async fn get_user_by_object_id(&self, object_id: &str) -> Result<String, AppError> {
        self.send(&DirectoryRequest::get(format!("/users/{object_id}")))
            .await
    }

    pub async fn get_all_users(&self, query: Option<&str>) -> Result<String, AppError> {
        self.send(&DirectoryRequest::get("/users").with_query(query))
            .await
    }

    pub async fn create_user(&self, json: &str) -> Result<String, AppError> {
        self.send(&DirectoryRequest::post("/users", json)).await
    }

    pub async fn update_user(&self, object_id: &str, json: &str) -> Result<String, AppError> {
        self.send(&DirectoryRequest::patch(format!("/users/{object_id}"), json))
            .await
    }

    pub async fn delete_user(&self, object_id: &str) -> Result<String, AppError> {
        self.send(&DirectoryRequest::delete(format!("/users/{object_id}")))
            .await
    }

    /// Register an extension property on the application with `app_object_id`.
    pub async fn register_extension(
        &self,
        app_object_id: &str,
        json: &str,
    ) -> Result<String, AppError> {
        self.send(&DirectoryRequest::post(
            format!("/applications/{app_object_id}/extensionProperties"),
            json,
        ))
        .await
    }

    pub async fn unregister_extension(
        &self,
        app_object_id: &str,
        extension_object_id: &str,
    ) -> Result<String, AppError> {
        self.send(&DirectoryRequest::delete(format!(
            "/applications/{app_object_id}/extensionProperties/{extension_object_id}"
        )))
        .await
    }

    pub async fn get_extensions(&self, app_object_id: &str) -> Result<String, AppError> {
        self.send(&DirectoryRequest::get(format!(
            "/applications/{app_object_id}/extensionProperties"
        )))
        .await
    }

    pub async fn get_applications(&self, query: Option<&str>) -> Result<String, AppError> {
        self.send(&DirectoryRequest::get("/applications").with_query(query))
            .await
    }

    /// Send one authenticated request and return the raw response body.
    ///
    /// A fresh token is requested from the provider for every call. Any
    /// non-2xx status becomes a [`GraphApiError`]; the body of a successful
    /// response is returned unchanged.
    pub async fn send(&self, request: &DirectoryRequest) -> Result<String, AppError> {
        let url = request.url(&self.tenant);

        let token = self.tokens.acquire_token(&self.tenant).await?;

        info!("{} {}", request.method, url);
        debug!("Authorization: Bearer {}", token.preview());

        let mut builder = self
            .http_client
            .request(request.method.clone(), &url)
            .bearer_auth(token.secret());

        if let Some(json) = &request.body {
            debug!("Content-Type: application/json\n\n{}", json);
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(json.clone());
        }

        let response = builder.send().await.map_err(AppError::Network)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(AppError::Network)?;

        if !status.is_success() {
            error!("Graph API request failed: HTTP {}", status);
            return Err(GraphApiError {
                status: status.as_u16(),
                payload: error_payload(String::from_utf8_lossy(&bytes).into_owned()),
            }
            .into());
        }

        let body = String::from_utf8(bytes.to_vec()).map_err(AppError::InvalidBody)?;

        info!(
            "{}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        );

        Ok(body)
    }
}

/// Pretty-printed JSON when the body parses, the raw body otherwise.
fn error_payload(body: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(body),
        Err(_) => body,
    }
}
