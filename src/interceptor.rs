//! Identity header injection
//!
//! Every request bound for the backend prefix passes through one
//! [`HeaderInjector`] before it is sent, whether it is a page navigation
//! proxied from the webview or a background API call from the host.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::BackendConfig;
use crate::error::{ConfigError, IdentityError};
use crate::identity::Identity;

/// Attaches the identity header to requests under the backend prefix
#[derive(Debug, Clone)]
pub struct HeaderInjector {
    base: Url,
    name: HeaderName,
    value: HeaderValue,
    identity: Identity,
}

/// Why an injector could not be built
#[derive(Debug, thiserror::Error)]
pub enum InjectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl HeaderInjector {
    pub fn new(backend: &BackendConfig, identity: Identity) -> Result<Self, InjectorError> {
        let name = backend.header_name()?;
        // from_bytes keeps non-ASCII account names (sent as opaque bytes)
        let value = HeaderValue::from_bytes(identity.as_str().as_bytes()).map_err(|_| {
            IdentityError::Lookup(format!(
                "account name '{}' cannot be sent as a header value",
                identity
            ))
        })?;

        let base = Url::parse(&backend.base_url).map_err(|e| ConfigError::InvalidBackendUrl {
            url: backend.base_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            base,
            name,
            value,
            identity,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.name
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.value
    }

    /// True when `url` lies under the backend prefix.
    ///
    /// Both sides are compared in parsed form, so `HTTP://LOCALHOST:80/x`
    /// matches a base of `http://localhost/x`. The prefix must end on a path
    /// segment, so `.../executavel2` does not match `.../executavel`.
    pub fn matches(&self, url: &str) -> bool {
        Url::parse(url).map_or(false, |url| self.matches_url(&url))
    }

    /// Same as [`HeaderInjector::matches`] for a parsed URL
    pub fn matches_url(&self, url: &Url) -> bool {
        if url.origin() != self.base.origin() {
            return false;
        }
        let prefix = self.base.path().trim_end_matches('/');
        match url.path().strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Insert the identity header if `url` matches. Any value the caller
    /// already set under the same name is replaced.
    pub fn inject(&self, url: &Url, headers: &mut HeaderMap) -> bool {
        if !self.matches_url(url) {
            return false;
        }
        headers.insert(self.name.clone(), self.value.clone());
        true
    }

    /// A header map holding only the identity header
    pub fn explicit_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(self.name.clone(), self.value.clone());
        headers
    }
}
