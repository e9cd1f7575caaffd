//! Stateless HTTP request builder and response parser for the CLAIM'N API.
//!
//! # Design
//! `ApiClient` holds only the resolved API root and carries no mutable state
//! between calls. Each verb has a `build_*` method that produces an
//! `HttpRequest` and every response goes through `parse_response`, which
//! classifies the status. The caller executes the round-trip in between,
//! keeping this layer deterministic and free of I/O.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ApiConfig;
use crate::error::{ApiError, ErrorDetail, ErrorEnvelope};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartFile, RequestBody};
use crate::normalize::{safe_string, unwrap_data};
use crate::query::QueryParams;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Result of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub url: String,
}

/// Synchronous, stateless request builder and response classifier.
#[derive(Debug, Clone)]
pub struct ApiClient {
    api_root: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            api_root: config.api_root(),
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Absolute URL for `path` with any trailing slash removed.
    pub fn url_for(&self, path: &str, params: Option<&QueryParams>) -> String {
        let path = path.trim_end_matches('/');
        let mut url = if path.is_empty() || path.starts_with('/') {
            format!("{}{path}", self.api_root)
        } else {
            format!("{}/{path}", self.api_root)
        };
        if let Some(params) = params.filter(|p| !p.is_empty()) {
            url.push('?');
            url.push_str(&params.to_query_string());
        }
        url
    }

    pub fn build_get(&self, path: &str, params: Option<&QueryParams>, token: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.url_for(path, params),
            headers: vec![auth_header(token)],
            body: None,
        }
    }

    pub fn build_post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        token: &str,
    ) -> Result<HttpRequest, ApiError> {
        self.build_json(HttpMethod::Post, path, body, token)
    }

    pub fn build_put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        token: &str,
    ) -> Result<HttpRequest, ApiError> {
        self.build_json(HttpMethod::Put, path, body, token)
    }

    pub fn build_patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        token: &str,
    ) -> Result<HttpRequest, ApiError> {
        self.build_json(HttpMethod::Patch, path, body, token)
    }

    pub fn build_delete(&self, path: &str, token: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            url: self.url_for(path, None),
            headers: vec![auth_header(token)],
            body: None,
        }
    }

    /// Multipart POST. Only the authorization header is set; the transport
    /// supplies the multipart content type and boundary.
    pub fn build_upload(&self, path: &str, file: MultipartFile, token: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: self.url_for(path, None),
            headers: vec![auth_header(token)],
            body: Some(RequestBody::Multipart(file)),
        }
    }

    fn build_json<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        token: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = body
            .map(|b| serde_json::to_string(b).map_err(|e| ApiError::Serialization(e.to_string())))
            .transpose()?;
        Ok(HttpRequest {
            method,
            url: self.url_for(path, None),
            headers: vec![
                ("content-type".to_string(), JSON_CONTENT_TYPE.to_string()),
                auth_header(token),
            ],
            body: body.map(RequestBody::Json),
        })
    }

    /// Classify a response.
    ///
    /// 204 yields `{}` without looking at the body, other 2xx the parsed
    /// JSON body. 401 is always `SessionExpired`. Other failures carry the
    /// server's `ErrorDetail`, or `ErrorDetail::unknown()` when the body is
    /// not the documented error shape.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        if response.status == 204 {
            return Ok(Value::Object(Map::new()));
        }
        if response.is_success() {
            return serde_json::from_str(&response.body)
                .map_err(|e| ApiError::Deserialization(e.to_string()));
        }
        Err(classify_failure(&response))
    }

    /// Parse an upload response into its file URL. Accepts `{url}` and
    /// `{data:{url}}`.
    pub fn parse_upload(&self, response: HttpResponse) -> Result<UploadedFile, ApiError> {
        let value = self.parse_response(response)?;
        let url = unwrap_data(&value)
            .map(|v| safe_string(v, "url", ""))
            .unwrap_or("");
        if url.is_empty() {
            return Err(ApiError::Deserialization(
                "upload response has no url".to_string(),
            ));
        }
        Ok(UploadedFile {
            url: url.to_string(),
        })
    }
}

fn auth_header(token: &str) -> (String, String) {
    ("authorization".to_string(), format!("Bearer {token}"))
}

/// Map a non-2xx response to the appropriate `ApiError` variant.
fn classify_failure(response: &HttpResponse) -> ApiError {
    if response.status == 401 {
        return ApiError::SessionExpired;
    }
    let error = serde_json::from_str::<ErrorEnvelope>(&response.body)
        .map(|envelope| envelope.error)
        .unwrap_or_else(|_| ErrorDetail::unknown());
    if response.status == 404 {
        return ApiError::NotFound { error };
    }
    ApiError::Http {
        status: response.status,
        error,
    }
}
