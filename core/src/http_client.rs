//! Authenticated async client.
//!
//! `HttpClient` drives one call through a fixed sequence: obtain a token,
//! build the request with `ApiClient`, execute it on the `Transport`,
//! classify the response. A 401 clears the session before the error is
//! returned. There are no retries and no timeouts at this layer.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::client::{ApiClient, UploadedFile};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartFile};
use crate::query::QueryParams;
use crate::session::SessionProvider;
use crate::transport::{ReqwestTransport, Transport};

pub struct HttpClient<T, S> {
    api: ApiClient,
    transport: T,
    session: S,
    requests: AtomicU64,
}

impl<S: SessionProvider> HttpClient<ReqwestTransport, S> {
    /// Client over the default `reqwest` transport.
    pub fn with_reqwest(config: &ApiConfig, session: S) -> Self {
        Self::new(config, ReqwestTransport::new(), session)
    }
}

impl<T: Transport, S: SessionProvider> HttpClient<T, S> {
    pub fn new(config: &ApiConfig, transport: T, session: S) -> Self {
        Self {
            api: ApiClient::new(config),
            transport,
            session,
            requests: AtomicU64::new(0),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Number of calls started so far, successful or not.
    pub fn requests_issued(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    #[instrument(skip(self, params), fields(request_id = tracing::field::Empty))]
    pub async fn get(&self, path: &str, params: Option<&QueryParams>) -> Result<Value, ApiError> {
        let token = self.begin(HttpMethod::Get, path).await?;
        let request = self.api.build_get(path, params, &token);
        self.send(request).await
    }

    #[instrument(skip(self, body), fields(request_id = tracing::field::Empty))]
    pub async fn post<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let token = self.begin(HttpMethod::Post, path).await?;
        let request = self.api.build_post(path, body, &token)?;
        self.send(request).await
    }

    #[instrument(skip(self, body), fields(request_id = tracing::field::Empty))]
    pub async fn put<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let token = self.begin(HttpMethod::Put, path).await?;
        let request = self.api.build_put(path, body, &token)?;
        self.send(request).await
    }

    #[instrument(skip(self, body), fields(request_id = tracing::field::Empty))]
    pub async fn patch<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let token = self.begin(HttpMethod::Patch, path).await?;
        let request = self.api.build_patch(path, body, &token)?;
        self.send(request).await
    }

    #[instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        let token = self.begin(HttpMethod::Delete, path).await?;
        let request = self.api.build_delete(path, &token);
        self.send(request).await
    }

    #[instrument(skip(self, file), fields(request_id = tracing::field::Empty, file_name = %file.file_name))]
    pub async fn upload_file(&self, path: &str, file: MultipartFile) -> Result<UploadedFile, ApiError> {
        let token = self.begin(HttpMethod::Post, path).await?;
        let request = self.api.build_upload(path, file, &token);
        let response = self.execute(request).await?;
        self.classify(response, |api, r| api.parse_upload(r)).await
    }

    pub async fn get_as<R: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<&QueryParams>,
    ) -> Result<R, ApiError> {
        decode(self.get(path, params).await?)
    }

    pub async fn post_as<B: Serialize + Sync + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ApiError> {
        decode(self.post(path, body).await?)
    }

    pub async fn put_as<B: Serialize + Sync + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ApiError> {
        decode(self.put(path, body).await?)
    }

    pub async fn patch_as<B: Serialize + Sync + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ApiError> {
        decode(self.patch(path, body).await?)
    }

    /// Count the call and obtain a token. Fails before any I/O when signed out.
    async fn begin(&self, method: HttpMethod, path: &str) -> Result<String, ApiError> {
        let request_id = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::Span::current().record("request_id", request_id);

        match self.session.access_token().await {
            Some(token) if !token.is_empty() => {
                debug!(%method, path, "issuing request");
                Ok(token)
            }
            _ => {
                warn!(%method, path, "no access token, request not sent");
                Err(ApiError::Unauthenticated)
            }
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<Value, ApiError> {
        let response = self.execute(request).await?;
        self.classify(response, |api, r| api.parse_response(r)).await
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = request.method;
        match self.transport.execute(request).await {
            Ok(response) => {
                debug!(%method, status = response.status, "response received");
                Ok(response)
            }
            Err(e) => {
                warn!(%method, error = %e, "network failure");
                Err(ApiError::Network(e))
            }
        }
    }

    async fn classify<R>(
        &self,
        response: HttpResponse,
        parse: impl FnOnce(&ApiClient, HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let result = parse(&self.api, response);
        if let Err(ApiError::SessionExpired) = &result {
            warn!("session expired, clearing tokens");
            self.session.clear_tokens().await;
        }
        result
    }
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::session::MemorySession;

    /// Session that counts `clear_tokens` calls.
    #[derive(Default)]
    struct CountingSession {
        token: Option<String>,
        clears: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionProvider for CountingSession {
        async fn access_token(&self) -> Option<String> {
            self.token.clone()
        }

        async fn clear_tokens(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client_for(server: &MockServer) -> HttpClient<ReqwestTransport, MemorySession> {
        let config = ApiConfig::new(&server.uri()).unwrap();
        HttpClient::with_reqwest(&config, MemorySession::new("test-token"))
    }

    #[tokio::test]
    async fn get_attaches_bearer_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/feed/posts"))
            .and(query_param("page", "1"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let params = QueryParams::new().with("page", 1).with_opt("filter", None::<&str>);
        let value = client_for(&server).get("/feed/posts/", Some(&params)).await.unwrap();
        assert_eq!(value, json!({"data": []}));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].url.query(), Some("page=1"));
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/feed/posts"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "p1"})))
            .mount(&server)
            .await;

        let body = json!({"content": "hello"});
        let value = client_for(&server).post("/feed/posts", Some(&body)).await.unwrap();
        assert_eq!(value["id"], "p1");

        let received = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(sent, body);
    }

    #[tokio::test]
    async fn no_content_resolves_to_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/feed/posts/p1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v2/goals/g1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.delete("/feed/posts/p1").await.unwrap(), json!({}));
        let body = json!({"title": "x"});
        assert_eq!(client.put("/goals/g1", Some(&body)).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn unauthorized_clears_tokens_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                json!({"error": {"code": "TOKEN_EXPIRED", "message": "expired"}}),
            ))
            .mount(&server)
            .await;

        let clears = Arc::new(AtomicUsize::new(0));
        let session = CountingSession {
            token: Some("stale".to_string()),
            clears: clears.clone(),
        };
        let config = ApiConfig::new(&server.uri()).unwrap();
        let client = HttpClient::with_reqwest(&config, session);

        let err = client.get("/members/profile", None).await.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert!(err.to_string().contains("session expired"));
        assert_eq!(clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_carries_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/experts/my-expert"))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                json!({"error": {"code": "NOT_FOUND", "message": "Not found"}}),
            ))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get("/experts/my-expert", None)
            .await
            .unwrap_err();
        match &err {
            ApiError::NotFound { error } => {
                assert_eq!(error.code, "NOT_FOUND");
                assert_eq!(error.message, "Not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn server_error_with_text_body_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let body = json!({"bio": "x"});
        let err = client_for(&server)
            .patch("/members/profile", Some(&body))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.code(), "UNKNOWN");
        assert_eq!(err.message(), "An unknown error occurred");
    }

    #[tokio::test]
    async fn signed_out_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = ApiConfig::new(&server.uri()).unwrap();
        let client = HttpClient::with_reqwest(&config, MemorySession::signed_out());
        let err = client.get("/members/profile", None).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(client.requests_issued(), 1);
    }

    #[tokio::test]
    async fn empty_token_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = ApiConfig::new(&server.uri()).unwrap();
        let client = HttpClient::with_reqwest(&config, MemorySession::new(""));
        let err = client.get("/members/profile", None).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    /// Serves one response whose body is cut off before `Content-Length` is
    /// reached, then drops the connection.
    async fn truncated_body_server(status_line: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: 200\r\n\r\n{{\"error\":"
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn truncated_unauthorized_body_still_expires_session() {
        let uri = truncated_body_server("401 Unauthorized").await;
        let clears = Arc::new(AtomicUsize::new(0));
        let session = CountingSession {
            token: Some("stale".to_string()),
            clears: clears.clone(),
        };
        let config = ApiConfig::new(&uri).unwrap();
        let client = HttpClient::with_reqwest(&config, session);

        let err = client.get("/members/profile", None).await.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn truncated_server_error_body_is_unknown() {
        let uri = truncated_body_server("500 Internal Server Error").await;
        let config = ApiConfig::new(&uri).unwrap();
        let client = HttpClient::with_reqwest(&config, MemorySession::new("t"));

        let err = client.get("/members/profile", None).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.code(), "UNKNOWN");
    }

    #[tokio::test]
    async fn network_failure_is_reported() {
        // Nothing listens on the discard port of localhost.
        let config = ApiConfig::new("http://127.0.0.1:9").unwrap();
        let client = HttpClient::with_reqwest(&config, MemorySession::new("t"));
        let err = client.get("/members/profile", None).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn counter_increments_per_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        for _ in 0..3 {
            client.get("/goals", None).await.unwrap();
        }
        assert_eq!(client.requests_issued(), 3);
    }

    #[tokio::test]
    async fn get_as_decodes_or_reports_mismatch() {
        #[derive(Debug, serde::Deserialize)]
        struct Profile {
            first_name: String,
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/members/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"first_name": "Ada"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/goals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let profile: Profile = client.get_as("/members/profile", None).await.unwrap();
        assert_eq!(profile.first_name, "Ada");

        let err = client.get_as::<Profile>("/goals", None).await.unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[tokio::test]
    async fn upload_posts_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/members/profile/avatar"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"url": "https://cdn.claimn.co/a.png"})),
            )
            .mount(&server)
            .await;

        let file = MultipartFile {
            field_name: "avatar".to_string(),
            file_name: "a.png".to_string(),
            mime_type: Some("image/png".to_string()),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        };
        let uploaded = client_for(&server)
            .upload_file("/members/profile/avatar", file)
            .await
            .unwrap();
        assert_eq!(uploaded.url, "https://cdn.claimn.co/a.png");

        let received = server.received_requests().await.unwrap();
        let content_type = received[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }
}
