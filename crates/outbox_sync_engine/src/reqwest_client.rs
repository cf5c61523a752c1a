//! Production [`HttpClient`] backed by reqwest.

use crate::error::TransportFailure;
use crate::http::{HttpClient, HttpRequest};
use crate::transport::DeliveryResponse;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// reqwest-based HTTP client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    http: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client with the given connect timeout.
    ///
    /// The per-request bound is enforced by the engine.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportFailure> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportFailure::Unreachable(format!("could not build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Wraps an existing reqwest client.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post(&self, request: HttpRequest) -> Result<DeliveryResponse, TransportFailure> {
        let mut builder = self.http.post(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportFailure::Unreachable(format!("request timed out: {e}"))
            } else if e.is_builder() {
                TransportFailure::Encode(e.to_string())
            } else {
                TransportFailure::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(
                    status = status.as_u16(),
                    url = %request.url,
                    error = %e,
                    "could not read response body"
                );
                String::new()
            }
        };
        debug!(status = status.as_u16(), url = %request.url, "endpoint answered");

        Ok(DeliveryResponse::new(status.as_u16(), body))
    }
}
