//! URL mapping between the webview's custom scheme and the backend
//!
//! The webview never talks to the backend directly. It loads
//! `demanda://localhost/<path>` (`http://demanda.localhost/<path>` on
//! Windows) and the scheme handler forwards each request to
//! `<backend origin>/<path>` through the
//! [`BackendClient`](crate::backend::BackendClient). Paths are kept as they
//! are, so root-relative links, redirects and assets emitted by the backend
//! resolve the same way they would against the backend itself. The identity
//! header stays scoped to the base prefix by the injector.

use reqwest::header::{
    HeaderMap, HeaderValue, CONNECTION, CONTENT_LENGTH, HOST, LOCATION, ORIGIN, REFERER,
    TRANSFER_ENCODING,
};
use reqwest::Method;
use url::Url;

use crate::backend::{ForwardRequest, ForwardResponse};
use crate::config::BackendConfig;
use crate::error::ConfigError;

/// Custom URI scheme registered with the webview
pub const SCHEME: &str = "demanda";

/// Origin the webview sees for proxied pages
pub fn shell_origin() -> &'static str {
    if cfg!(windows) {
        "http://demanda.localhost"
    } else {
        "demanda://localhost"
    }
}

#[derive(Debug, Clone)]
pub struct ProxyRoute {
    backend: Url,
    backend_origin: String,
    shell_origin: String,
}

impl ProxyRoute {
    pub fn new(backend: &BackendConfig) -> Result<Self, ConfigError> {
        Self::with_shell_origin(backend, shell_origin())
    }

    pub fn with_shell_origin(backend: &BackendConfig, shell_origin: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(&backend.base_url).map_err(|e| ConfigError::InvalidBackendUrl {
            url: backend.base_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            backend_origin: parsed.origin().ascii_serialization(),
            backend: parsed,
            shell_origin: shell_origin.trim_end_matches('/').to_string(),
        })
    }

    /// Shell URL the webview should load for a URL on the backend origin
    pub fn shell_url(&self, backend_url: &str) -> Option<Url> {
        let parsed = Url::parse(backend_url).ok()?;
        if parsed.origin() != self.backend.origin() {
            return None;
        }
        Url::parse(&format!("{}{}", self.shell_origin, path_and_query(&parsed))).ok()
    }

    /// Backend URL for a request the webview made against the shell scheme
    pub fn backend_url(&self, shell_uri: &str) -> Option<String> {
        let parsed = Url::parse(shell_uri).ok()?;
        Some(format!("{}{}", self.backend_origin, path_and_query(&parsed)))
    }

    /// Translate a webview request into a backend request.
    ///
    /// Host, Origin and Referer are rewritten to the backend so CSRF origin
    /// checks on the backend see its own origin.
    pub fn forward_request(
        &self,
        method: Method,
        shell_uri: &str,
        mut headers: HeaderMap,
        body: Vec<u8>,
    ) -> Option<ForwardRequest> {
        let url = self.backend_url(shell_uri)?;

        headers.remove(HOST);
        headers.remove(CONNECTION);
        headers.remove(CONTENT_LENGTH);

        if headers.contains_key(ORIGIN) {
            if let Ok(origin) = HeaderValue::from_str(&self.backend_origin) {
                headers.insert(ORIGIN, origin);
            }
        }

        let referer = headers
            .get(REFERER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| self.backend_url(v));
        headers.remove(REFERER);
        if let Some(referer) = referer.and_then(|r| HeaderValue::from_str(&r).ok()) {
            headers.insert(REFERER, referer);
        }

        Some(ForwardRequest { method, url, headers, body })
    }

    /// Strip hop-by-hop headers and point absolute redirects back at the
    /// shell scheme. Root-relative redirects already resolve against it.
    pub fn rewrite_response(&self, mut response: ForwardResponse) -> ForwardResponse {
        response.headers.remove(CONNECTION);
        response.headers.remove(TRANSFER_ENCODING);

        let location = response
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| self.shell_url(v));
        if let Some(location) = location.and_then(|l| HeaderValue::from_str(l.as_str()).ok()) {
            response.headers.insert(LOCATION, location);
        }

        response
    }
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn route() -> ProxyRoute {
        let backend = BackendConfig {
            base_url: "http://172.16.3.66:3001/executavel".to_string(),
            identity_header: "Usuario-Nome".to_string(),
        };
        ProxyRoute::with_shell_origin(&backend, "demanda://localhost").unwrap()
    }

    #[test]
    fn test_shell_url_roundtrip() {
        let route = route();
        let shell = route
            .shell_url("http://172.16.3.66:3001/executavel/criar_demanda_api/")
            .unwrap();
        assert_eq!(shell.as_str(), "demanda://localhost/executavel/criar_demanda_api/");
        assert_eq!(
            route.backend_url(shell.as_str()).unwrap(),
            "http://172.16.3.66:3001/executavel/criar_demanda_api/"
        );
    }

    #[test]
    fn test_backend_url_keeps_query() {
        assert_eq!(
            route().backend_url("demanda://localhost/executavel/listar_demanda_api/?page=2").unwrap(),
            "http://172.16.3.66:3001/executavel/listar_demanda_api/?page=2"
        );
    }

    #[test]
    fn test_foreign_urls_are_not_mapped() {
        let route = route();
        assert!(route.shell_url("https://cdn.example.org/lib.js").is_none());
        assert!(route.shell_url("http://172.16.3.66:8080/executavel/").is_none());
        assert!(route.shell_url("https://172.16.3.66:3001/executavel/").is_none());
    }

    #[test]
    fn test_forward_request_rewrites_origin_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("localhost"));
        headers.insert(ORIGIN, HeaderValue::from_static("demanda://localhost"));
        headers.insert(
            REFERER,
            HeaderValue::from_static("demanda://localhost/executavel/criar_demanda_api/"),
        );

        let forwarded = route()
            .forward_request(
                Method::POST,
                "demanda://localhost/executavel/criar_demanda_api/",
                headers,
                b"{}".to_vec(),
            )
            .unwrap();

        assert_eq!(forwarded.url, "http://172.16.3.66:3001/executavel/criar_demanda_api/");
        assert!(forwarded.headers.get(HOST).is_none());
        assert_eq!(forwarded.headers.get(ORIGIN).unwrap(), "http://172.16.3.66:3001");
        assert_eq!(
            forwarded.headers.get(REFERER).unwrap(),
            "http://172.16.3.66:3001/executavel/criar_demanda_api/"
        );
    }

    #[test]
    fn test_redirects_stay_in_shell() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LOCATION,
            HeaderValue::from_static("http://172.16.3.66:3001/executavel/perfil_demanda_api/"),
        );
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let response = route().rewrite_response(ForwardResponse {
            status: StatusCode::FOUND,
            headers,
            body: Vec::new(),
        });

        assert_eq!(
            response.headers.get(LOCATION).unwrap(),
            "demanda://localhost/executavel/perfil_demanda_api/"
        );
        assert!(response.headers.get(TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn test_root_relative_redirect_reaches_backend_path() {
        let route = route();
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/executavel/perfil_demanda_api/"));

        let response = route.rewrite_response(ForwardResponse {
            status: StatusCode::FOUND,
            headers,
            body: Vec::new(),
        });
        let location = response.headers.get(LOCATION).unwrap().to_str().unwrap();
        assert_eq!(location, "/executavel/perfil_demanda_api/");

        // the webview resolves it against the page it is on
        let page = Url::parse("demanda://localhost/executavel/criar_demanda_api/").unwrap();
        let next = page.join(location).unwrap();
        assert_eq!(
            route.backend_url(next.as_str()).unwrap(),
            "http://172.16.3.66:3001/executavel/perfil_demanda_api/"
        );
    }

    #[test]
    fn test_root_relative_assets_map_to_backend_origin() {
        let route = route();
        let page = Url::parse("demanda://localhost/executavel/listar_demanda_api/").unwrap();
        let asset = page.join("/static/css/app.css?v=3").unwrap();
        assert_eq!(
            route.backend_url(asset.as_str()).unwrap(),
            "http://172.16.3.66:3001/static/css/app.css?v=3"
        );

        let shell = route.shell_url("http://172.16.3.66:3001/static/css/app.css").unwrap();
        assert_eq!(shell.as_str(), "demanda://localhost/static/css/app.css");
    }
}
