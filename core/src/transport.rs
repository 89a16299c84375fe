//! Executing signed requests.
//!
//! # Design
//! `Transport` is the only I/O seam: it turns an `HttpRequest` into an
//! `HttpResponse` and reports network failures. Status interpretation and the
//! verbose request record live in `Invoker`, so every transport, the ureq one
//! or a test double, gets the same failure policy.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP round-trip.
pub trait Transport: Send + Sync {
    /// Returns the response whatever its status; only network and protocol
    /// failures are errors. The body is returned whole; invalid UTF-8 is
    /// replaced rather than rejected.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking transport backed by a ureq agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::from_agent(
            ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .new_agent(),
        )
    }

    /// Transport whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::from_agent(
            ureq::Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(Some(timeout))
                .build()
                .new_agent(),
        )
    }

    /// Wrap an existing agent. It should be configured with
    /// `http_status_as_error(false)` so error bodies are preserved.
    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let body = request.body.as_deref().map(str::as_bytes);

        let result = match (request.method, body) {
            (HttpMethod::Get, None) => with_headers(self.agent.get(url), headers).call(),
            (HttpMethod::Get, Some(b)) => {
                with_headers(self.agent.get(url).force_send_body(), headers).send(b)
            }
            (HttpMethod::Delete, None) => with_headers(self.agent.delete(url), headers).call(),
            (HttpMethod::Delete, Some(b)) => {
                with_headers(self.agent.delete(url).force_send_body(), headers).send(b)
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (HttpMethod::Post, Some(b)) => with_headers(self.agent.post(url), headers).send(b),
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), headers).send_empty(),
            (HttpMethod::Put, Some(b)) => with_headers(self.agent.put(url), headers).send(b),
            (HttpMethod::Patch, None) => with_headers(self.agent.patch(url), headers).send_empty(),
            (HttpMethod::Patch, Some(b)) => with_headers(self.agent.patch(url), headers).send(b),
        };

        let network_error = |e: ureq::Error| TransportError::Network {
            url: request.url.clone(),
            message: e.to_string(),
        };

        let mut response = result.map_err(network_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
            .collect();
        let bytes = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(network_error)?;
        let body = match String::from_utf8(bytes) {
            Ok(body) => body,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        Ok(HttpResponse { status, headers, body })
    }
}

/// Sends requests through a `Transport` and applies the failure policy.
#[derive(Debug, Clone)]
pub struct Invoker<T> {
    transport: T,
    verbose: bool,
}

impl<T: Transport> Invoker<T> {
    pub fn new(transport: T, verbose: bool) -> Self {
        Self { transport, verbose }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` and return the raw body of a 2xx response.
    ///
    /// Non-2xx statuses are `TransportError::Status`.
    pub fn invoke(&self, request: &HttpRequest) -> Result<String, TransportError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let payload = request.body.as_deref().unwrap_or_default();

        let outcome = self.transport.send(request).and_then(check_status);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(body) => {
                if self.verbose {
                    tracing::info!(
                        url = %request.url,
                        method = %request.method,
                        bytes_sent = payload.len(),
                        bytes_received = body.len(),
                        payload,
                        response = %body,
                        elapsed_ms,
                        started_at = %started_at.to_rfc3339(),
                        "request completed"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    url = %request.url,
                    method = %request.method,
                    payload,
                    started_at = %started_at.to_rfc3339(),
                    error = %e,
                    "request failed"
                );
            }
        }
        outcome
    }

    /// Like `invoke`, but any failure becomes `None`.
    pub fn invoke_or_none(&self, request: &HttpRequest) -> Option<String> {
        self.invoke(request).ok()
    }
}

fn check_status(response: HttpResponse) -> Result<String, TransportError> {
    if response.is_success() {
        return Ok(response.body);
    }
    Err(TransportError::Status {
        status: response.status,
        body: response.body,
    })
}
