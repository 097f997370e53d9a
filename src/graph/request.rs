//! Directory API request description and URL composition.

use reqwest::Method;

use crate::config::TenantContext;

/// One call against the directory API. Built per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRequest {
    pub method: Method,
    /// e.g. `/users` or `/applications/{id}/extensionProperties`.
    pub path: String,
    /// Raw query string appended after the api-version parameter.
    pub query: Option<String>,
    /// JSON text sent verbatim.
    pub body: Option<String>,
}

impl DirectoryRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, json: impl Into<String>) -> Self {
        Self::new(Method::POST, path).with_body(json)
    }

    pub fn patch(path: impl Into<String>, json: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path).with_body(json)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Empty queries are dropped.
    pub fn with_query(mut self, query: Option<impl Into<String>>) -> Self {
        self.query = query.map(Into::into).filter(|q| !q.is_empty());
        self
    }

    /// Empty bodies are dropped.
    pub fn with_body(mut self, json: impl Into<String>) -> Self {
        let json = json.into();
        self.body = (!json.is_empty()).then_some(json);
        self
    }

    /// `base + tenant + path + "?api-version=" + version [+ "&" + query]`
    pub fn url(&self, tenant: &TenantContext) -> String {
        let mut url = format!(
            "{}{}{}?api-version={}",
            tenant.api_base_url, tenant.tenant_id, self.path, tenant.api_version
        );
        if let Some(query) = &self.query {
            url.push('&');
            url.push_str(query);
        }
        url
    }
}
