//! HTTP transport implementation.
//!
//! [`HttpTransport`] turns a record into a JSON `POST`. The actual HTTP
//! client is abstracted via [`HttpClient`] so the engine can run against
//! reqwest in production and an in-process endpoint in tests.

use crate::error::{SyncError, SyncResult, TransportFailure};
use crate::transport::{DeliveryResponse, DeliveryTransport};
use async_trait::async_trait;
use outbox_core::ChangeRecord;
use parking_lot::RwLock;
use tracing::debug;
use url::Url;

/// A fully built `POST` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Target URL.
    pub url: Url,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Returns the first header with the given name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to plug in an HTTP library. `Err` must only be
/// returned when no response was obtained.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns status and body.
    async fn post(&self, request: HttpRequest) -> Result<DeliveryResponse, TransportFailure>;
}

/// HTTP-based delivery transport.
///
/// Sends each record as a JSON body with camelCase keys.
pub struct HttpTransport<C: HttpClient> {
    endpoint: Url,
    client: C,
    auth_token: Option<String>,
    user_agent: Option<String>,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidEndpoint`] unless `endpoint` is an
    /// `http://` or `https://` URL with a host.
    pub fn new(endpoint: impl AsRef<str>, client: C) -> SyncResult<Self> {
        let endpoint = parse_endpoint(endpoint.as_ref())?;
        Ok(Self {
            endpoint,
            client,
            auth_token: None,
            user_agent: None,
            last_error: RwLock::new(None),
        })
    }

    /// Creates a transport from the endpoint, token and user agent of a
    /// sync configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidEndpoint`] for an unusable endpoint.
    pub fn from_config(config: &crate::SyncConfig, client: C) -> SyncResult<Self> {
        let mut transport =
            Self::new(&config.endpoint, client)?.with_user_agent(config.user_agent.clone());
        if let Some(token) = &config.auth_token {
            transport = transport.with_auth_token(token.clone());
        }
        Ok(transport)
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sends the given `User-Agent` with every request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the message of the last transport failure, cleared by the
    /// next answered request.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn build_request(&self, record: &ChangeRecord) -> Result<HttpRequest, TransportFailure> {
        let body =
            serde_json::to_vec(record).map_err(|e| TransportFailure::Encode(e.to_string()))?;

        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(agent) = &self.user_agent {
            headers.push(("User-Agent".to_string(), agent.clone()));
        }
        if let Some(token) = &self.auth_token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        Ok(HttpRequest {
            url: self.endpoint.clone(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl<C: HttpClient> DeliveryTransport for HttpTransport<C> {
    async fn deliver(&self, record: &ChangeRecord) -> Result<DeliveryResponse, TransportFailure> {
        let request = self.build_request(record)?;
        debug!(record_id = %record.id, url = %request.url, "posting change");

        match self.client.post(request).await {
            Ok(response) => {
                *self.last_error.write() = None;
                Ok(response)
            }
            Err(failure) => {
                *self.last_error.write() = Some(failure.to_string());
                Err(failure)
            }
        }
    }
}

/// Parses a delivery endpoint.
///
/// # Errors
///
/// Returns [`SyncError::InvalidEndpoint`] unless `endpoint` is a valid
/// `http` or `https` URL with a non-empty host.
pub fn parse_endpoint(endpoint: &str) -> SyncResult<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| SyncError::InvalidEndpoint(format!("{endpoint:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SyncError::InvalidEndpoint(format!(
            "{endpoint:?} is not an http(s) URL"
        )));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(SyncError::InvalidEndpoint(format!("{endpoint:?} has no host"))),
    }
}

/// Handles requests routed through a [`LoopbackClient`].
pub trait LoopbackEndpoint: Send + Sync {
    /// Handles a POST request and returns the response.
    fn handle_post(&self, request: &HttpRequest) -> Result<DeliveryResponse, TransportFailure>;
}

/// A loopback HTTP client that routes requests directly to an in-process
/// endpoint.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<E: LoopbackEndpoint> {
    endpoint: E,
}

impl<E: LoopbackEndpoint> LoopbackClient<E> {
    /// Creates a new loopback client connected to the given endpoint.
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    /// Returns the endpoint.
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }
}

#[async_trait]
impl<E: LoopbackEndpoint> HttpClient for LoopbackClient<E> {
    async fn post(&self, request: HttpRequest) -> Result<DeliveryResponse, TransportFailure> {
        self.endpoint.handle_post(&request)
    }
}
