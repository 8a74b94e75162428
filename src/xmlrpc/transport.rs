//! XML-RPC transport
//!
//! [`Transport`] is the seam between the Odoo client and the network. The
//! production implementation POSTs to `{url}/xmlrpc/2/{service}`.

use super::codec::{decode_response, encode_call};
use super::error::XmlRpcError;
use super::value::Value;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::time::Duration;

/// The two Odoo XML-RPC services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Login and version information
    Common,
    /// Model method execution (`execute_kw`)
    Object,
}

impl Service {
    pub fn path(&self) -> &'static str {
        match self {
            Service::Common => "common",
            Service::Object => "object",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Performs one XML-RPC exchange. Retries are the caller's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        service: Service,
        method: &str,
        params: &[Value],
    ) -> Result<Value, XmlRpcError>;
}

/// HTTP transport backed by reqwest
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    http_client: Client,
}

impl HttpTransport {
    /// Create a transport for a normalized base URL (no trailing slash)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, XmlRpcError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| XmlRpcError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn endpoint(&self, service: Service) -> String {
        format!("{}/xmlrpc/2/{}", self.base_url, service.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        service: Service,
        method: &str,
        params: &[Value],
    ) -> Result<Value, XmlRpcError> {
        let url = self.endpoint(service);
        // Params carry the credential, so only the method is logged
        tracing::debug!("XML-RPC {}.{} -> {}", service, method, url);

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("Accept", "text/xml")
            .body(encode_call(method, params))
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(XmlRpcError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(classify)?;
        decode_response(&body)
    }
}

/// Split reqwest failures into retryable network errors and the rest
fn classify(e: reqwest::Error) -> XmlRpcError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        XmlRpcError::Transient(e.to_string())
    } else {
        XmlRpcError::Request(e.to_string())
    }
}
