//! Sonar API client.
//!
//! Low-level HTTP client that handles authentication, error classification
//! and body decoding. Endpoint-specific operations live in the resource
//! modules and the builders they expose.

use std::env;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::{AuthProvider, AuthType, BasicAuth, BearerAuth, NoAuth, PasscodeAuth};
use crate::download::DownloadStream;
use crate::error::{Result, SonarError};
use crate::query::QueryParams;

const DEFAULT_HOST_URL: &str = "https://sonarcloud.io";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const USER_AGENT: &str = concat!("sonarapi/", env!("CARGO_PKG_VERSION"));

/// What the caller expects back from a successful call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseShape {
    #[default]
    Json,
    /// An opaque blob read fully into memory.
    Binary,
    /// A body consumed incrementally.
    Stream,
}

/// A request body.
#[derive(Debug, Clone)]
pub enum Body {
    Json(serde_json::Value),
    Binary {
        bytes: Vec<u8>,
        content_type: String,
    },
}

/// Everything needed to issue one call. Built fresh per call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    pub shape: ResponseShape,
    /// Overrides the client-wide deadline.
    pub timeout: Option<Duration>,
    /// Aborts the call (and any stream it returns) when fired.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_query(mut self, params: &QueryParams) -> Self {
        self.query = params.to_pairs();
        self
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `body` cannot be represented as JSON.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| SonarError::validation("body", format!("Invalid JSON body: {e}")))?;
        self.body = Some(Body::Json(value));
        Ok(self)
    }

    #[must_use]
    pub fn with_binary(mut self, bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        self.body = Some(Body::Binary {
            bytes,
            content_type: content_type.into(),
        });
        self
    }

    #[must_use]
    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_binary(&self) -> bool {
        matches!(self.body, Some(Body::Binary { .. })) || self.shape != ResponseShape::Json
    }
}

/// Low-level Sonar API client.
///
/// Owns the base URL and a credential provider; every call is a single
/// round trip with no retry. This struct is cheaply cloneable; clones share
/// the underlying connection pool and credentials.
///
/// # Example
///
/// ```no_run
/// use sonarapi::{BearerAuth, SonarClient};
///
/// # fn example() -> sonarapi::Result<()> {
/// // Create from environment variables
/// let client = SonarClient::from_env()?;
///
/// // Or configure manually
/// let client = SonarClient::new("https://sonar.example.com", BearerAuth::new("squ_...")?)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SonarClient {
    http: Client,
    base_url: Arc<Url>,
    auth: Arc<dyn AuthProvider>,
    timeout: Duration,
}

impl std::fmt::Debug for SonarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonarClient")
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth.auth_type())
            .finish_non_exhaustive()
    }
}

impl SonarClient {
    /// Create a client from environment variables.
    ///
    /// `SONAR_HOST_URL` selects the server (defaults to SonarCloud). The
    /// credential provider is picked from the first of `SONAR_TOKEN`,
    /// `SONAR_PASSCODE` or `SONAR_LOGIN` (+ `SONAR_PASSWORD`) that is set;
    /// with none of them the client is anonymous.
    ///
    /// # Errors
    ///
    /// Returns an error if the host URL is invalid or a credential is empty.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("SONAR_HOST_URL").unwrap_or_else(|_| DEFAULT_HOST_URL.to_string());

        if let Ok(token) = env::var("SONAR_TOKEN") {
            return Self::new(&base_url, BearerAuth::new(token)?);
        }
        if let Ok(passcode) = env::var("SONAR_PASSCODE") {
            return Self::new(&base_url, PasscodeAuth::new(passcode)?);
        }
        if let Ok(login) = env::var("SONAR_LOGIN") {
            let password = env::var("SONAR_PASSWORD").ok();
            return Self::new(&base_url, BasicAuth::new(login, password.as_deref())?);
        }

        Self::new(&base_url, NoAuth)
    }

    /// Create a new client for `base_url` authenticating with `auth`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the base URL is invalid.
    pub fn new(base_url: &str, auth: impl AuthProvider + 'static) -> Result<Self> {
        Self::with_shared_auth(base_url, Arc::new(auth))
    }

    /// Like [`SonarClient::new`] with an already shared provider.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the base URL is invalid.
    pub fn with_shared_auth(base_url: &str, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| SonarError::validation("baseUrl", format!("Invalid URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| SonarError::network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: Arc::new(base_url),
            auth,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Replace the default per-request deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth.auth_type()
    }

    /// Resolve `path` (which must start with `/`) to `<base>/api<path>`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the path is malformed.
    pub fn api_url(&self, path: &str) -> Result<Url> {
        if !path.starts_with('/') {
            return Err(SonarError::validation(
                "path",
                format!("API path '{path}' must start with '/'"),
            ));
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/api{path}"))
            .map_err(|e| SonarError::validation("path", format!("Invalid API path '{path}': {e}")))
    }

    /// Perform a call and decode the JSON response.
    ///
    /// An empty success body decodes as JSON `null`, so `()` and `Option<_>`
    /// targets work for endpoints that return 204.
    #[tracing::instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        let cancel = options.cancel.clone();
        let response = self.send(path, &options).await?;
        let status = response.status().as_u16();

        let bytes = cancellable(cancel.as_ref(), async {
            response
                .bytes()
                .await
                .map_err(|e| SonarError::from_transport(&e))
        })
        .await?;

        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &bytes
        };

        serde_json::from_slice(body).map_err(|e| SonarError::Api {
            message: format!("Failed to parse response: {e}"),
            status,
            body: None,
        })
    }

    /// Perform a call and return the whole body as raw bytes.
    #[tracing::instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request_binary(&self, path: &str, options: RequestOptions) -> Result<Vec<u8>> {
        let options = options.with_shape(ResponseShape::Binary);
        let cancel = options.cancel.clone();
        let response = self.send(path, &options).await?;

        cancellable(cancel.as_ref(), async {
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| SonarError::from_transport(&e))
        })
        .await
    }

    /// Perform a call and hand back the body as a live stream.
    ///
    /// The per-request deadline still covers the whole transfer; pass a
    /// longer `timeout` in `options` for large downloads.
    #[tracing::instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request_stream(&self, path: &str, options: RequestOptions) -> Result<DownloadStream> {
        let options = options.with_shape(ResponseShape::Stream);
        let response = self.send(path, &options).await?;
        Ok(DownloadStream::new(response, options.cancel))
    }

    /// GET `path` with query parameters and decode the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: &QueryParams) -> Result<T> {
        self.request(path, RequestOptions::get().with_query(params)).await
    }

    /// POST a JSON body to `path` and decode the JSON response.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(path, RequestOptions::post().with_json(body)?).await
    }

    /// Issue the call and turn any failure into a typed error.
    async fn send(&self, path: &str, options: &RequestOptions) -> Result<Response> {
        let url = self.api_url(path)?;

        let mut headers = HeaderMap::new();
        if options.shape == ResponseShape::Json {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        // Content-Type describes the request body, whatever shape comes back.
        match &options.body {
            Some(Body::Json(_)) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Some(Body::Binary { content_type, .. }) => {
                let value = HeaderValue::from_str(content_type).map_err(|_| {
                    SonarError::validation("content_type", format!("Invalid content type '{content_type}'"))
                })?;
                headers.insert(CONTENT_TYPE, value);
            }
            None if !options.is_binary() => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            None => {}
        }
        self.auth.apply_auth(&mut headers);

        let mut request = self
            .http
            .request(options.method.clone(), url)
            .headers(headers)
            .timeout(options.timeout.unwrap_or(self.timeout));

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }

        match &options.body {
            Some(Body::Json(value)) => {
                let payload = serde_json::to_vec(value)
                    .map_err(|e| SonarError::validation("body", e.to_string()))?;
                request = request.body(payload);
            }
            Some(Body::Binary { bytes, .. }) => {
                request = request.body(bytes.clone());
            }
            None => {}
        }

        tracing::debug!(path, "sending request");

        let response = cancellable(options.cancel.as_ref(), async {
            request
                .send()
                .await
                .map_err(|e| SonarError::from_transport(&e))
        })
        .await?;

        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "received response");

        if status.is_success() {
            return Ok(response);
        }

        Err(Self::error_from_response(response, options.cancel.as_ref()).await)
    }

    /// Read a failed response defensively and classify it.
    async fn error_from_response(response: Response, cancel: Option<&CancellationToken>) -> SonarError {
        let status = response.status();
        let headers = response.headers().clone();

        let body = cancellable(cancel, async { Ok(response.text().await.unwrap_or_default()) }).await;
        match body {
            Ok(text) => SonarError::from_status(status, &headers, &text),
            Err(e) => e,
        }
    }
}

/// Run `fut`, giving up with a timeout error as soon as `cancel` fires.
async fn cancellable<T, F>(cancel: Option<&CancellationToken>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(SonarError::timeout("request cancelled")),
            result = fut => result,
        },
        None => fut.await,
    }
}
