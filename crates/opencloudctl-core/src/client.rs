//! Typed Open Cloud client
//!
//! Every remote call goes through [`OpenCloudClient::request`]: the path is
//! resolved against the base URL, the body is JSON-encoded, the request is
//! authenticated by the [`AuthenticatingTransport`], and the whole response
//! body is read. Non-2xx statuses become [`HttpFault`] before anything tries
//! to decode the body.
//!
//! Decoding is a separate step on [`ApiResponse`], so the same bytes can be
//! probed against several shapes without fetching twice.

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use reqwest::{Request, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument, trace};
use url::Url;

pub use reqwest::Method;

use crate::config::{DEFAULT_BASE_URL, Profile};
use crate::error::{CoreError, HttpFault, Result};
use crate::transport::{AuthenticatingTransport, Credential};

/// Query parameters, kept sorted by key so URLs are deterministic
pub type Query = BTreeMap<String, String>;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings shared by every request a client makes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("opencloudctl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientSettings {
    /// Settings taken from a config profile
    pub fn from_profile(profile: &Profile) -> Self {
        let mut settings = Self {
            base_url: profile.resolved_base_url(),
            ..Self::default()
        };
        if let Some(secs) = profile.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        settings
    }
}

/// Builder for [`OpenCloudClient`]
#[derive(Debug, Default)]
pub struct OpenCloudClientBuilder {
    credential: Option<Credential>,
    settings: ClientSettings,
}

impl OpenCloudClientBuilder {
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn api_key(self, key: impl Into<String>) -> Self {
        self.credential(Credential::ApiKey(key.into()))
    }

    pub fn oauth_token(self, token: impl Into<String>) -> Self {
        self.credential(Credential::OAuthBearer(token.into()))
    }

    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<OpenCloudClient> {
        let credential = self.credential.ok_or_else(|| {
            CoreError::Validation("an API key or OAuth token is required".to_string())
        })?;

        let base_url =
            Url::parse(&self.settings.base_url).map_err(|source| CoreError::InvalidUrl {
                url: self.settings.base_url.clone(),
                source,
            })?;

        let http = reqwest::Client::builder()
            .timeout(self.settings.timeout)
            .user_agent(self.settings.user_agent.as_str())
            .build()?;

        let transport = AuthenticatingTransport::new(credential, http.clone())?;

        debug!(
            base_url = %base_url,
            auth = transport.credential().kind(),
            timeout_secs = self.settings.timeout.as_secs(),
            "built Open Cloud client"
        );

        Ok(OpenCloudClient {
            inner: Arc::new(ClientInner {
                base_url,
                transport,
                http,
            }),
        })
    }
}

struct ClientInner {
    base_url: Url,
    transport: AuthenticatingTransport,
    // Same connection pool, no credential header
    http: reqwest::Client,
}

/// Client for the Open Cloud REST API
///
/// Cheap to clone; clones share the connection pool and credential.
#[derive(Clone)]
pub struct OpenCloudClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for OpenCloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenCloudClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("transport", &self.inner.transport)
            .finish()
    }
}

impl OpenCloudClient {
    pub fn builder() -> OpenCloudClientBuilder {
        OpenCloudClientBuilder::default()
    }

    /// Client authenticated by a config profile
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let credential = profile.resolve_credential()?;
        Self::builder()
            .credential(credential)
            .settings(ClientSettings::from_profile(profile))
            .build()
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve `path` against the base URL and append non-empty query values
    pub fn endpoint(&self, path: &str, query: Option<&Query>) -> Result<Url> {
        let mut url = self
            .inner
            .base_url
            .join(path)
            .map_err(|source| CoreError::InvalidUrl {
                url: path.to_string(),
                source,
            })?;

        if let Some(query) = query {
            let mut pairs = query.iter().filter(|(_, value)| !value.is_empty()).peekable();
            if pairs.peek().is_some() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }

        Ok(url)
    }

    /// Build an unsent request
    ///
    /// A `Some` body is JSON-encoded with `Content-Type: application/json`.
    /// serde_json never HTML-escapes, so script source survives verbatim.
    pub fn build_request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: Option<&Query>,
    ) -> Result<Request>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path, query)?;
        let mut request = Request::new(method, url);

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(CoreError::Serialization)?;
            trace!(bytes = bytes.len(), "encoded request body");
            request
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            *request.body_mut() = Some(bytes.into());
        }

        Ok(request)
    }

    /// Send an already-built request through the authenticating transport
    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    pub async fn execute(&self, request: Request) -> Result<ApiResponse> {
        debug!("sending request");
        let response = self.inner.transport.send(request).await?;
        ApiResponse::read(response).await
    }

    /// Perform one authenticated call and return the raw response
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: Option<&Query>,
    ) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let request = self.build_request(method, path, body, query)?;
        self.execute(request).await
    }

    pub async fn get<T: DeserializeOwned + Default>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, None).await
    }

    pub async fn get_with_query<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        query: Option<&Query>,
    ) -> Result<T> {
        self.request(Method::GET, path, None::<&()>, query)
            .await?
            .decode()
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.request(Method::POST, path, Some(body), None)
            .await?
            .decode()
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.request(Method::PATCH, path, Some(body), None)
            .await?
            .decode()
    }

    pub async fn delete<T: DeserializeOwned + Default>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None::<&()>, None)
            .await?
            .decode()
    }

    /// GET an absolute URL without credentials
    ///
    /// Used for pre-signed locations outside the API surface, such as task
    /// binary output.
    #[instrument(skip(self))]
    pub async fn fetch_unauthenticated(&self, url: &str) -> Result<Vec<u8>> {
        let url = parse_absolute(url)?;
        debug!("fetching out-of-band resource");
        let response = self.inner.http.execute(Request::new(Method::GET, url)).await?;
        Ok(ApiResponse::read(response).await?.into_body())
    }

    /// PUT raw bytes to an absolute URL without credentials
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload_binary(&self, url: &str, data: Vec<u8>) -> Result<ApiResponse> {
        let url = parse_absolute(url)?;
        let mut request = Request::new(Method::PUT, url);
        let headers = request.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(data.len()));
        *request.body_mut() = Some(data.into());

        debug!("uploading binary payload");
        let response = self.inner.http.execute(request).await?;
        ApiResponse::read(response).await
    }
}

fn parse_absolute(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| CoreError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// A successful response whose body has not been decoded yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    /// Read the whole body, turning a non-2xx status into [`HttpFault`]
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "received response");

        if !status.is_success() {
            return Err(HttpFault::new(status.as_u16(), status.to_string(), body).into());
        }

        Ok(Self { status, body })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Decode the body into `T`
    ///
    /// An empty or whitespace-only body yields `T::default()`.
    pub fn decode<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&self.body).map_err(|source| CoreError::Decode {
            target: type_name::<T>(),
            source,
        })
    }
}

/// Sink for endpoints whose response body carries nothing of interest
///
/// Accepts any JSON value, unlike `()` which only accepts `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Discard;

impl<'de> Deserialize<'de> for Discard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Discard)
    }
}
