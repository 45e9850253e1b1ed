//! Authenticating round-trip transport
//!
//! [`AuthenticatingTransport`] wraps a [`RequestSender`] and stamps exactly
//! one credential header onto every outgoing request before handing it on.
//! It never looks at the response status; that is the typed client's job.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::{Request, Response};
use tracing::trace;

use crate::error::{CoreError, Result};

/// Header carrying an Open Cloud API key
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Credential injected into every authenticated request
///
/// The two variants are mutually exclusive per client.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Sent as `x-api-key: <key>`
    ApiKey(String),
    /// Sent as `Authorization: Bearer <token>`
    OAuthBearer(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credential::OAuthBearer(_) => f.write_str("OAuthBearer(<redacted>)"),
        }
    }
}

impl Credential {
    /// Short name of the credential kind, safe to log
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::ApiKey(_) => "api_key",
            Credential::OAuthBearer(_) => "oauth",
        }
    }

    /// The header this credential is sent as
    ///
    /// Fails if the secret contains bytes that cannot appear in a header value.
    pub fn header(&self) -> Result<(HeaderName, HeaderValue)> {
        let (name, raw) = match self {
            Credential::ApiKey(key) => (API_KEY_HEADER, key.clone()),
            Credential::OAuthBearer(token) => (AUTHORIZATION, format!("Bearer {token}")),
        };

        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            CoreError::Validation(format!(
                "{} credential contains characters that are not valid in an HTTP header",
                self.kind()
            ))
        })?;
        value.set_sensitive(true);

        Ok((name, value))
    }
}

/// Anything that can put a request on the wire
///
/// Implemented for [`reqwest::Client`]; tests wrap it to observe what is sent.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, request: Request) -> std::result::Result<Response, reqwest::Error>;
}

#[async_trait]
impl RequestSender for reqwest::Client {
    async fn send(&self, request: Request) -> std::result::Result<Response, reqwest::Error> {
        self.execute(request).await
    }
}

/// Round-trip transport that injects the credential header
///
/// Holds no per-request state, so one instance can serve any number of
/// concurrent calls.
pub struct AuthenticatingTransport<S = reqwest::Client> {
    credential: Credential,
    header_name: HeaderName,
    header_value: HeaderValue,
    inner: S,
}

impl<S> fmt::Debug for AuthenticatingTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatingTransport")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl<S: RequestSender> AuthenticatingTransport<S> {
    /// Wrap `inner`, authenticating with `credential`
    pub fn new(credential: Credential, inner: S) -> Result<Self> {
        let (header_name, header_value) = credential.header()?;
        Ok(Self {
            credential,
            header_name,
            header_value,
            inner,
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Set the credential header on `request`, replacing any existing value
    pub fn authorize(&self, request: &mut Request) {
        request
            .headers_mut()
            .insert(self.header_name.clone(), self.header_value.clone());
    }

    /// Authorize `request` and send it through the wrapped sender
    ///
    /// Network failures come back unchanged as [`CoreError::Transport`].
    pub async fn send(&self, mut request: Request) -> Result<Response> {
        self.authorize(&mut request);
        trace!(
            auth = self.credential.kind(),
            method = %request.method(),
            url = %request.url(),
            "dispatching authenticated request"
        );
        Ok(self.inner.send(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use reqwest::header::CONTENT_TYPE;
    use std::sync::Mutex;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn get(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[test]
    fn test_api_key_header() {
        let transport =
            AuthenticatingTransport::new(Credential::ApiKey("secret".into()), reqwest::Client::new())
                .unwrap();
        let mut request = get("https://apis.roblox.com/cloud/v2/universes/1");
        transport.authorize(&mut request);

        assert_eq!(request.headers()["x-api-key"], "secret");
        assert!(request.headers().get(AUTHORIZATION).is_none());
        assert!(request.headers()["x-api-key"].is_sensitive());
    }

    #[test]
    fn test_oauth_header() {
        let transport = AuthenticatingTransport::new(
            Credential::OAuthBearer("tok".into()),
            reqwest::Client::new(),
        )
        .unwrap();
        let mut request = get("https://apis.roblox.com/cloud/v2/universes/1");
        transport.authorize(&mut request);

        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok");
        assert!(request.headers().get("x-api-key").is_none());
    }

    #[test]
    fn test_authorize_replaces_existing_header_and_keeps_body() {
        let transport =
            AuthenticatingTransport::new(Credential::ApiKey("new".into()), reqwest::Client::new())
                .unwrap();
        let mut request = Request::new(
            Method::POST,
            Url::parse("https://apis.roblox.com/x").unwrap(),
        );
        request
            .headers_mut()
            .insert(API_KEY_HEADER, HeaderValue::from_static("old"));
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(b"{\"a\":1}".to_vec().into());

        transport.authorize(&mut request);

        let values: Vec<_> = request.headers().get_all("x-api-key").iter().collect();
        assert_eq!(values, vec!["new"]);
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            request.body().and_then(|b| b.as_bytes()),
            Some(&b"{\"a\":1}"[..])
        );
    }

    #[test]
    fn test_invalid_secret_rejected() {
        let result =
            AuthenticatingTransport::new(Credential::ApiKey("bad\nkey".into()), reqwest::Client::new());
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Credential::OAuthBearer("super-secret".into()));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }

    /// Records the headers of each request it forwards
    struct RecordingSender {
        inner: reqwest::Client,
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl RequestSender for RecordingSender {
        async fn send(&self, request: Request) -> std::result::Result<Response, reqwest::Error> {
            let key = request
                .headers()
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen.lock().unwrap().push(key);
            self.inner.execute(request).await
        }
    }

    #[tokio::test]
    async fn test_header_present_before_delegation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("x-api-key", "abc"))
            .respond_with(ResponseTemplate::new(418))
            .expect(1)
            .mount(&server)
            .await;

        let sender = RecordingSender {
            inner: reqwest::Client::new(),
            seen: Mutex::new(Vec::new()),
        };
        let transport = AuthenticatingTransport::new(Credential::ApiKey("abc".into()), sender).unwrap();

        let response = transport
            .send(get(&format!("{}/ping", server.uri())))
            .await
            .unwrap();

        // Status is passed through untouched, even when it's an error
        assert_eq!(response.status().as_u16(), 418);
        assert_eq!(
            *transport.inner.seen.lock().unwrap(),
            vec![Some("abc".to_string())]
        );
    }

    #[tokio::test]
    async fn test_network_failure_is_transport_error() {
        let transport =
            AuthenticatingTransport::new(Credential::ApiKey("abc".into()), reqwest::Client::new())
                .unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let err = transport
            .send(get("http://127.0.0.1:9/unreachable"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Transport(_)));
    }
}
