//! Request and response layer for the CLAIM'N `/api/v2` backend.
//!
//! # Overview
//! `ApiClient` builds `HttpRequest` values and classifies `HttpResponse`
//! values without touching the network (host-does-IO pattern).
//! `HttpClient` adds a session provider and a `Transport` on top, running
//! each call as token → request → round-trip → classification.
//!
//! # Design
//! - Errors form a closed enum (`ApiError`); 401 clears the session, 404 is
//!   its own variant, unparsable error bodies become `UNKNOWN`.
//! - The normalizers in `normalize` accept any JSON value and never fail,
//!   absorbing the backend's inconsistent envelopes.
//! - The base URL is resolved once into an `ApiConfig`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod http_client;
pub mod normalize;
pub mod query;
pub mod resources;
pub mod session;
pub mod transport;

pub use client::{ApiClient, UploadedFile};
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ErrorDetail};
pub use http::{HttpMethod, HttpRequest, HttpResponse, MultipartFile, RequestBody};
pub use http_client::HttpClient;
pub use normalize::{
    is_404_error, safe_array, safe_items, safe_page, safe_pagination, safe_string, unwrap_data, Page,
    Pagination,
};
pub use query::{QueryParams, QueryValue};
pub use session::{MemorySession, SessionProvider};
pub use transport::{ReqwestTransport, Transport, TransportError};
