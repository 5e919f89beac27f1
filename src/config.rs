//! Shell configuration
//!
//! The backend host is never hard-coded. Values are resolved by priority:
//! 1. Runtime environment variables (`DEMANDA_BACKEND_URL`, ...)
//! 2. The same variables captured at compile time (`option_env!`)
//! 3. Built-in defaults pointing at a local development backend

use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001/executavel";
pub const DEFAULT_IDENTITY_HEADER: &str = "Usuario-Nome";
pub const DEFAULT_WINDOW_TITLE: &str = "Demandas";

const ENV_BACKEND_URL: &str = "DEMANDA_BACKEND_URL";
const ENV_IDENTITY_HEADER: &str = "DEMANDA_IDENTITY_HEADER";
const ENV_WINDOW_TITLE: &str = "DEMANDA_WINDOW_TITLE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

/// Where the demand application lives and how requests are tagged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL every backend path hangs off (no trailing slash)
    pub base_url: String,

    /// Header carrying the OS account name
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowConfig {
    #[serde(default = "default_window_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_window_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_identity_header() -> String { DEFAULT_IDENTITY_HEADER.to_string() }
fn default_window_title() -> String { DEFAULT_WINDOW_TITLE.to_string() }
fn default_width() -> f64 { 1200.0 }
fn default_height() -> f64 { 900.0 }

impl ShellConfig {
    /// Build and validate the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ShellConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |key: &str, compiled: Option<&'static str>, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| compiled.map(str::to_string))
                .unwrap_or_else(|| default.to_string())
        };

        let config = Self {
            backend: BackendConfig {
                base_url: resolve(
                    ENV_BACKEND_URL,
                    option_env!("DEMANDA_BACKEND_URL"),
                    DEFAULT_BACKEND_URL,
                ),
                identity_header: resolve(
                    ENV_IDENTITY_HEADER,
                    option_env!("DEMANDA_IDENTITY_HEADER"),
                    DEFAULT_IDENTITY_HEADER,
                ),
            },
            window: WindowConfig {
                title: resolve(
                    ENV_WINDOW_TITLE,
                    option_env!("DEMANDA_WINDOW_TITLE"),
                    DEFAULT_WINDOW_TITLE,
                ),
                ..WindowConfig::default()
            },
        };

        config.validated()
    }

    /// Check the backend URL and header name, normalizing the URL
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        let base = self.backend.base_url.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base).map_err(|e| ConfigError::InvalidBackendUrl {
            url: self.backend.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBackendUrl {
                url: self.backend.base_url.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidBackendUrl {
                url: self.backend.base_url.clone(),
                reason: "missing host".to_string(),
            });
        }
        self.backend.base_url = parsed.as_str().trim_end_matches('/').to_string();

        HeaderName::from_bytes(self.backend.identity_header.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(self.backend.identity_header.clone()))?;

        Ok(self)
    }
}

impl BackendConfig {
    /// Parsed header name. Validated by [`ShellConfig::validated`].
    pub fn header_name(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::from_bytes(self.identity_header.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(self.identity_header.clone()))
    }

    /// Absolute URL for a path relative to the base
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = ShellConfig::from_lookup(lookup(&[])).unwrap();
        if option_env!("DEMANDA_BACKEND_URL").is_none() {
            assert_eq!(config.backend.base_url, DEFAULT_BACKEND_URL);
        }
        if option_env!("DEMANDA_IDENTITY_HEADER").is_none() {
            assert_eq!(config.backend.identity_header, "Usuario-Nome");
        }
        assert_eq!(config.window.width, 1200.0);
        assert_eq!(config.window.height, 900.0);
    }

    #[test]
    fn test_env_overrides_and_trailing_slash() {
        let config = ShellConfig::from_lookup(lookup(&[
            ("DEMANDA_BACKEND_URL", "http://172.16.3.66:3001/executavel/"),
            ("DEMANDA_IDENTITY_HEADER", "X-Actor"),
        ]))
        .unwrap();
        assert_eq!(config.backend.base_url, "http://172.16.3.66:3001/executavel");
        assert_eq!(config.backend.identity_header, "X-Actor");
        assert_eq!(
            config.backend.endpoint("/criar_demanda_api/"),
            "http://172.16.3.66:3001/executavel/criar_demanda_api/"
        );
    }

    #[test]
    fn test_backend_url_is_canonical() {
        let config = ShellConfig::from_lookup(lookup(&[(
            "DEMANDA_BACKEND_URL",
            "HTTP://LOCALHOST:80/executavel/",
        )]))
        .unwrap();
        assert_eq!(config.backend.base_url, "http://localhost/executavel");

        let config = ShellConfig::from_lookup(lookup(&[("DEMANDA_BACKEND_URL", "http://Demandas.local")]))
            .unwrap();
        assert_eq!(config.backend.base_url, "http://demandas.local");
    }

    #[test]
    fn test_blank_env_falls_through() {
        let config =
            ShellConfig::from_lookup(lookup(&[("DEMANDA_WINDOW_TITLE", "   ")])).unwrap();
        if option_env!("DEMANDA_WINDOW_TITLE").is_none() {
            assert_eq!(config.window.title, DEFAULT_WINDOW_TITLE);
        }
    }

    #[test]
    fn test_rejects_non_http_backend() {
        let err = ShellConfig::from_lookup(lookup(&[("DEMANDA_BACKEND_URL", "file:///tmp/x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBackendUrl { .. }));

        let err = ShellConfig::from_lookup(lookup(&[("DEMANDA_BACKEND_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBackendUrl { .. }));
    }

    #[test]
    fn test_rejects_bad_header_name() {
        let err = ShellConfig::from_lookup(lookup(&[("DEMANDA_IDENTITY_HEADER", "Usuario Nome")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHeaderName(_)));
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{
            "backend": { "baseUrl": "https://demandas.example.org/executavel" }
        }"#;
        let config: ShellConfig = serde_json::from_str(json).unwrap();
        let config = config.validated().unwrap();
        assert_eq!(config.backend.identity_header, DEFAULT_IDENTITY_HEADER);
        assert_eq!(config.window.title, DEFAULT_WINDOW_TITLE);
    }
}
