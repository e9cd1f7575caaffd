//! Network execution of `HttpRequest` values.
//!
//! # Design
//! `Transport` is the only place that performs I/O. Non-2xx statuses are
//! returned as data, never as errors, so status interpretation stays in
//! `ApiClient::parse_response`. A `TransportError` means no response was
//! received at all. A failed read of a non-2xx body yields an empty body,
//! not an error.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// Failure to obtain any HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("network request failed: {0}")]
    Other(String),
}

/// Executes requests against the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(RequestBody::Json(text)) => builder.body(text),
            Some(RequestBody::Multipart(file)) => {
                let mut part = Part::bytes(file.bytes).file_name(file.file_name);
                if let Some(mime) = file.mime_type {
                    part = part.mime_str(&mime)?;
                }
                builder.multipart(Form::new().part(file.field_name, part))
            }
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        // A 204 carries no body by definition. Failure bodies are best
        // effort: the status alone still classifies the response.
        let body = if status == 204 {
            String::new()
        } else if (200..300).contains(&status) {
            response.text().await?
        } else {
            response.text().await.unwrap_or_default()
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
