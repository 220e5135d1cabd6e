//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::accessor::{SharedTokenAccessor, TokenAccessor};
use crate::api::CallsApi;
use crate::error::{Error, Result};
use crate::request::{ApiRequest, ApiResponse, Method};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// SupportIQ API client.
///
/// Every request carries the configured API key (if any) and whatever
/// `Authorization` value the token accessor supplies at send time.
///
/// # Example
///
/// ```no_run
/// use supportiq_client::ApiClient;
///
/// # async fn example() -> supportiq_client::Result<()> {
/// let client = ApiClient::builder()
///     .base_url("https://api.example.com/prod")
///     .api_key("key")
///     .build()?;
///
/// let page = client.calls().list(Default::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<HeaderValue>,
    accessor: Option<SharedTokenAccessor>,
    timeout: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_key", &self.inner.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("has_accessor", &self.inner.accessor.is_some())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl ApiClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Access the call-analysis endpoints.
    pub fn calls(&self) -> CallsApi {
        CallsApi::new(self.clone())
    }

    /// Resolve a request target. Absolute URLs pass through untouched;
    /// anything else is joined under the base path.
    pub(crate) fn url(&self, target: &str) -> Result<Url> {
        if target.starts_with("http://") || target.starts_with("https://") {
            return Ok(Url::parse(target)?);
        }
        let path = target.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    async fn headers_for(&self, request: &ApiRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(key) = &self.inner.api_key {
            headers.insert(HeaderName::from_static(API_KEY_HEADER), key.clone());
        }

        if let Some(accessor) = &self.inner.accessor
            && let Some(credential) = accessor.authorization().await?
        {
            let value = HeaderValue::from_str(&credential)
                .map_err(|_| Error::InvalidHeader("authorization".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Send one request.
    ///
    /// Non-2xx responses become [`Error::RequestFailed`] carrying the status
    /// and the full body text. Nothing is retried.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut url = self.url(&request.url)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        let headers = self.headers_for(&request).await?;

        tracing::debug!(method = %request.method, url = %url, "Sending API request");

        let mut builder = self
            .inner
            .http
            .request(request.method.to_reqwest(), url.clone())
            .headers(headers)
            .timeout(self.inner.timeout);
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        self.handle_response(request.method, &url, response).await
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response(
        &self,
        method: Method,
        url: &Url,
        response: reqwest::Response,
    ) -> Result<ApiResponse> {
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                body = %body,
                "API request failed"
            );
            return Err(Error::RequestFailed {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        tracing::debug!(method = %method, url = %url, status = status.as_u16(), "API request succeeded");

        if !is_json {
            return Ok(ApiResponse::Text(body));
        }
        if body.trim().is_empty() {
            return Ok(ApiResponse::Json(serde_json::Value::Null));
        }
        Ok(ApiResponse::Json(serde_json::from_str(&body)?))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Convenience wrappers
    // ─────────────────────────────────────────────────────────────────────────

    /// Make a GET request.
    pub async fn get(&self, target: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::get(target)).await
    }

    /// Make a POST request.
    pub async fn post<B: Serialize + ?Sized>(&self, target: &str, body: &B) -> Result<ApiResponse> {
        self.request(ApiRequest::post(target).json(body)?).await
    }

    /// Make a PUT request.
    pub async fn put<B: Serialize + ?Sized>(&self, target: &str, body: &B) -> Result<ApiResponse> {
        self.request(ApiRequest::put(target).json(body)?).await
    }

    /// Make a PATCH request.
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        target: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        self.request(ApiRequest::patch(target).json(body)?).await
    }

    /// Make a DELETE request.
    pub async fn delete(&self, target: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::delete(target)).await
    }

    /// GET and deserialize.
    pub async fn get_json<T: DeserializeOwned>(&self, target: &str) -> Result<T> {
        self.get(target).await?.into_json()
    }

    /// POST and deserialize.
    pub async fn post_json<T, B>(&self, target: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.post(target, body).await?.into_json()
    }
}

/// Builder for creating an ApiClient.
pub struct ClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    accessor: Option<SharedTokenAccessor>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("has_accessor", &self.accessor.is_some())
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            accessor: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the base URL for the backend.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the static API key sent as `x-api-key`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the credential source consulted before every request.
    pub fn token_accessor<A: TokenAccessor + 'static>(mut self, accessor: A) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    /// Same as [`token_accessor`](Self::token_accessor) for an already shared handle.
    pub fn shared_token_accessor(mut self, accessor: SharedTokenAccessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .map(|key| {
                HeaderValue::from_str(&key)
                    .map(|mut value| {
                        value.set_sensitive(true);
                        value
                    })
                    .map_err(|_| Error::Config("Invalid API key".to_string()))
            })
            .transpose()?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("supportiq-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                api_key,
                accessor: self.accessor,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
