//! HTTP client for the demand backend
//!
//! All traffic leaves through [`BackendClient::execute`], which runs the
//! [`HeaderInjector`] on the built request. Callers never set the identity
//! header themselves.

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::config::BackendConfig;
use crate::error::{RelayError, RelayResult};
use crate::interceptor::HeaderInjector;
use crate::navigation::NavigationTarget;

/// A request proxied on behalf of the webview
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Raw backend answer handed back to the webview
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

pub struct BackendClient {
    backend: BackendConfig,
    injector: HeaderInjector,
    http: reqwest::Client,
}

impl BackendClient {
    /// Create a client with a session-scoped cookie jar (csrftoken and the
    /// backend session cookie live only as long as the process)
    pub fn new(backend: BackendConfig, injector: HeaderInjector) -> RelayResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| RelayError::Backend(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { backend, injector, http })
    }

    pub fn injector(&self) -> &HeaderInjector {
        &self.injector
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    /// POST a demand to the creation endpoint. Single attempt, no retry.
    pub async fn submit_demand(&self, payload: &Value) -> RelayResult<Value> {
        let url = NavigationTarget::Create.url(&self.backend);
        let body = serde_json::to_vec(payload)
            .map_err(|e| RelayError::Backend(format!("Failed to serialize demand: {}", e)))?;

        let request = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .build()
            .map_err(|e| RelayError::Backend(format!("Create demand request failed: {}", e)))?;

        self.json_call("Create demand", request).await
    }

    /// GET the demands of the current user
    pub async fn list_demands(&self) -> RelayResult<Value> {
        let url = NavigationTarget::List.url(&self.backend);
        let request = self
            .http
            .get(&url)
            .build()
            .map_err(|e| RelayError::Backend(format!("List demands request failed: {}", e)))?;

        self.json_call("List demands", request).await
    }

    /// GET the profile of the current user
    pub async fn fetch_profile(&self) -> RelayResult<Value> {
        let url = NavigationTarget::Profile.url(&self.backend);
        let request = self
            .http
            .get(&url)
            .build()
            .map_err(|e| RelayError::Backend(format!("Profile request failed: {}", e)))?;

        self.json_call("Profile", request).await
    }

    /// Pass a webview request through to the backend. Non-2xx statuses are
    /// returned as-is; only transport failures are errors.
    pub async fn forward(&self, request: ForwardRequest) -> RelayResult<ForwardResponse> {
        let mut built = self
            .http
            .request(request.method, &request.url)
            .body(request.body)
            .build()
            .map_err(|e| RelayError::Backend(format!("Proxy request failed: {}", e)))?;
        built.headers_mut().extend(request.headers);

        let response = self.execute(built).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::Backend(format!("Failed to read proxied body: {}", e)))?;

        Ok(ForwardResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }

    /// Single exit point: inject the identity header, then send
    async fn execute(&self, mut request: reqwest::Request) -> RelayResult<reqwest::Response> {
        let url = request.url().clone();
        if !self.injector.inject(&url, request.headers_mut()) {
            log::debug!("{} is outside the backend prefix, sent without identity", url);
        }

        log::debug!("{} {}", request.method(), url);

        self.http
            .execute(request)
            .await
            .map_err(|e| RelayError::Backend(format!("Request to {} failed: {}", url, e)))
    }

    async fn json_call(&self, what: &str, request: reqwest::Request) -> RelayResult<Value> {
        let response = self.execute(request).await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RelayError::Backend(format!(
                "{} failed with status {}",
                what, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::Backend(format!("Failed to read {} response: {}", what, e)))?;

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&body)
            .map_err(|e| RelayError::Backend(format!("Failed to parse {} response: {}", what, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BackendClient {
        let backend = BackendConfig {
            base_url: format!("{}/executavel", server.uri()),
            identity_header: "Usuario-Nome".to_string(),
        };
        let injector = HeaderInjector::new(&backend, Identity::new("maria").unwrap()).unwrap();
        BackendClient::new(backend, injector).unwrap()
    }

    #[tokio::test]
    async fn test_submit_demand_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/executavel/criar_demanda_api/"))
            .and(header("Usuario-Nome", "maria"))
            .and(body_json(json!({"a": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).submit_demand(&json!({"a": 1})).await.unwrap();
        assert_eq!(result, json!({"id": 42}));
    }

    #[tokio::test]
    async fn test_submit_demand_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/executavel/criar_demanda_api/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).submit_demand(&json!({"a": 1})).await.unwrap_err();
        match err {
            RelayError::Backend(message) => assert!(message.contains("500")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/executavel/listar_demanda_api/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        assert!(client(&server).list_demands().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/executavel/perfil_demanda_api/"))
            .and(header("Usuario-Nome", "maria"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        assert_eq!(client(&server).fetch_profile().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_identity_sent_for_non_canonical_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/executavel/listar_demanda_api/"))
            .and(header("Usuario-Nome", "maria"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/executavel/", server.uri()).replacen("http://", "HTTP://", 1);
        let config = crate::config::ShellConfig::from_lookup(|key| {
            (key == "DEMANDA_BACKEND_URL").then(|| base.clone())
        })
        .unwrap();
        let injector =
            HeaderInjector::new(&config.backend, Identity::new("maria").unwrap()).unwrap();
        let client = BackendClient::new(config.backend, injector).unwrap();

        assert_eq!(client.list_demands().await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_network_failure() {
        let server = MockServer::start().await;
        let client = client(&server);
        drop(server);

        assert!(matches!(
            client.list_demands().await,
            Err(RelayError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_forward_overrides_page_identity_and_passes_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/executavel/listar_demanda_api/"))
            .and(header("Usuario-Nome", "maria"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let mut headers = HeaderMap::new();
        headers.insert("usuario-nome", "mallory".parse().unwrap());

        let response = client
            .forward(ForwardRequest {
                method: Method::GET,
                url: format!("{}/executavel/listar_demanda_api/", server.uri()),
                headers,
                body: Vec::new(),
            })
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, b"missing");
    }
}
