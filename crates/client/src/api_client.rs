//! HTTP API client with bearer-token auth and normalized error envelopes.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use stockmaster_shared::{ApiError, Envelope};

use crate::config::ClientConfig;
use crate::storage::SessionStore;

/// Callback run after a 401 cleared the session, typically "show the login screen".
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// HTTP client for the StockMaster REST API.
///
/// Every request carries the stored bearer token. Responses are returned as
/// the server's [`Envelope`]; failures are normalized into [`ApiError`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionStore,
    on_session_expired: Option<SessionExpiredHook>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("on_session_expired", &self.on_session_expired.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                crate::log_warn!("Failed to build HTTP client ({}), using defaults", e);
                Client::new()
            });

        let session = match &config.session_dir {
            Some(dir) => SessionStore::new(dir),
            None => SessionStore::in_config_dir(),
        };

        Self {
            client,
            base_url: config.api_base_url.clone(),
            session,
            on_session_expired: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a specific session store
    pub fn with_session_store(mut self, session: SessionStore) -> Self {
        self.session = session;
        self
    }

    /// Register the callback run after a 401 response cleared the session
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// Issue a request and decode the response envelope.
    pub async fn request<TReq, TRes>(
        &self,
        method: Method,
        path: &str,
        body: Option<&TReq>,
    ) -> Result<Envelope<TRes>, ApiError>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        let url = self.url(path);
        crate::log_debug!("{} {}", method, url);

        let mut rb = self
            .client
            .request(method, &url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = self.session.token() {
            rb = rb.bearer_auth(token);
        }

        if let Some(body) = body {
            let body_bytes =
                serde_json::to_vec(body).map_err(|e| ApiError::Request(e.to_string()))?;
            rb = rb.body(body_bytes);
        }

        let resp = rb.send().await.map_err(|e| {
            if e.is_builder() {
                crate::log_error!("Request error: {}", e);
                ApiError::Request(e.to_string())
            } else {
                crate::log_error!("Network error: No response from server ({})", e);
                ApiError::Network(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(self.handle_error_status(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(Envelope {
                success: true,
                ..Envelope::default()
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| ApiError::Request(format!("invalid response body: {e}")))
    }

    fn handle_error_status(&self, status: u16, body: &str) -> ApiError {
        let err = ApiError::from_status(status, body);
        let message = err.message();

        match status {
            401 => {
                crate::log_warn!("Unauthorized ({}), clearing session", message);
                self.session.clear();
                if let Some(hook) = &self.on_session_expired {
                    hook();
                }
            }
            403 => crate::log_error!("Access forbidden: {}", message),
            404 => crate::log_error!("Resource not found: {}", message),
            500 => crate::log_error!("Server error: {}", message),
            _ => crate::log_error!("API Error: {}", message),
        }

        err
    }

    /// GET and decode the envelope
    pub async fn get_json<TRes: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Envelope<TRes>, ApiError> {
        self.request::<(), TRes>(Method::GET, path, None).await
    }

    /// POST a JSON body
    pub async fn post_json<TReq, TRes>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<Envelope<TRes>, ApiError>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// PUT a JSON body
    pub async fn put_json<TReq, TRes>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<Envelope<TRes>, ApiError>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// DELETE and decode the envelope
    pub async fn delete<TRes: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Envelope<TRes>, ApiError> {
        self.request::<(), TRes>(Method::DELETE, path, None).await
    }
}
