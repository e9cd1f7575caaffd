//! API base URL resolution.
//!
//! The base URL is chosen once, when an `ApiConfig` is built:
//! an explicit override wins, a known production host selects the
//! production API, anything else falls back to the local development API.

use thiserror::Error;

/// Environment variable holding an explicit API base URL.
pub const API_URL_ENV: &str = "CLAIMN_API_URL";
/// Environment variable holding the host the application is served from.
pub const APP_HOST_ENV: &str = "CLAIMN_APP_HOST";

pub const PRODUCTION_API_URL: &str = "https://api.claimn.co";
pub const DEVELOPMENT_API_URL: &str = "http://localhost:3001";
pub const PRODUCTION_HOSTS: &[&str] = &["claimn.co", "www.claimn.co", "app.claimn.co"];

/// Path prefix of every API route.
pub const API_PREFIX: &str = "/api/v2";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API base URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
}

impl ApiConfig {
    /// Use `base_url` as is (trailing slashes removed).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url: trimmed.to_string(),
        })
    }

    /// Resolve from an optional override and the optional runtime host.
    /// Blank overrides count as unset.
    pub fn resolve(override_url: Option<&str>, runtime_host: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(url) = override_url.filter(|u| !u.trim().is_empty()) {
            return Self::new(url);
        }
        let is_production = runtime_host
            .map(|host| host.trim().to_ascii_lowercase())
            .is_some_and(|host| PRODUCTION_HOSTS.contains(&host.as_str()));
        if is_production {
            Self::new(PRODUCTION_API_URL)
        } else {
            Self::new(DEVELOPMENT_API_URL)
        }
    }

    /// Resolve from `CLAIMN_API_URL` and `CLAIMN_APP_HOST`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let override_url = std::env::var(API_URL_ENV).ok();
        let host = std::env::var(APP_HOST_ENV).ok();
        Self::resolve(override_url.as_deref(), host.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL with the `/api/v2` prefix.
    pub fn api_root(&self) -> String {
        format!("{}{}", self.base_url, API_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_host() {
        let config = ApiConfig::resolve(Some("https://staging.example.com/"), Some("claimn.co")).unwrap();
        assert_eq!(config.base_url(), "https://staging.example.com");
    }

    #[test]
    fn production_host_selects_production_api() {
        let config = ApiConfig::resolve(None, Some("App.Claimn.co")).unwrap();
        assert_eq!(config.base_url(), PRODUCTION_API_URL);
    }

    #[test]
    fn unknown_or_missing_host_selects_development_api() {
        assert_eq!(
            ApiConfig::resolve(None, Some("preview.netlify.app")).unwrap().base_url(),
            DEVELOPMENT_API_URL
        );
        assert_eq!(ApiConfig::resolve(Some("  "), None).unwrap().base_url(), DEVELOPMENT_API_URL);
    }

    #[test]
    fn api_root_appends_prefix() {
        let config = ApiConfig::new("http://localhost:3001").unwrap();
        assert_eq!(config.api_root(), "http://localhost:3001/api/v2");
    }

    #[test]
    fn rejects_non_http_base() {
        let err = ApiConfig::new("localhost:3001").unwrap_err();
        assert_eq!(err, ConfigError::InvalidBaseUrl("localhost:3001".to_string()));
    }
}
