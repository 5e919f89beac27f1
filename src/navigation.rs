//! Navigation targets and the fire-and-forget navigation relay

use std::fmt;
use std::str::FromStr;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::interceptor::HeaderInjector;

/// Named pages of the demand application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationTarget {
    Profile,
    Create,
    List,
}

impl NavigationTarget {
    pub const ALL: [NavigationTarget; 3] = [Self::Profile, Self::Create, Self::List];

    /// Path relative to the backend base URL
    pub fn path(self) -> &'static str {
        match self {
            Self::Profile => "perfil_demanda_api/",
            Self::Create => "criar_demanda_api/",
            Self::List => "listar_demanda_api/",
        }
    }

    pub fn url(self, backend: &BackendConfig) -> String {
        backend.endpoint(self.path())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Create => "create",
            Self::List => "list",
        }
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown navigation target '{0}'")]
pub struct UnknownTarget(pub String);

impl FromStr for NavigationTarget {
    type Err = UnknownTarget;

    /// Accepts the trigger names and the channel names pages used with the
    /// previous shell.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" | "go-to-perfil" => Ok(Self::Profile),
            "create" | "go-to-criar" => Ok(Self::Create),
            "list" | "go-to-acompanhar" => Ok(Self::List),
            other => Err(UnknownTarget(other.to_string())),
        }
    }
}

/// A full-page load issued by the host to the window
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    pub target: NavigationTarget,
    pub url: String,
    /// Identity header attached explicitly, in addition to the interceptor
    pub headers: HeaderMap,
}

impl NavigationRequest {
    pub fn new(target: NavigationTarget, backend: &BackendConfig, injector: &HeaderInjector) -> Self {
        Self {
            target,
            url: target.url(backend),
            headers: injector.explicit_headers(),
        }
    }
}

/// Window-side sink for navigation requests
pub trait Navigator: Send + Sync {
    fn navigate(&self, request: &NavigationRequest) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    Idle,
    NavigationRequested(NavigationTarget),
    Navigating(NavigationTarget),
}

/// Tracks the relay state. Load outcomes are never reported back to the
/// bridge; `page_loaded` only returns the relay to `Idle`.
#[derive(Debug)]
pub struct NavigationRelay {
    state: NavigationState,
}

impl Default for NavigationRelay {
    fn default() -> Self {
        Self { state: NavigationState::Idle }
    }
}

impl NavigationRelay {
    pub fn state(&self) -> NavigationState {
        self.state
    }

    /// A page asked for `target`. Allowed from any state; a newer request
    /// supersedes one still loading.
    pub fn request(&mut self, target: NavigationTarget) {
        if let NavigationState::Navigating(previous) = self.state {
            log::debug!("Navigation to {} superseded by {}", previous, target);
        }
        self.state = NavigationState::NavigationRequested(target);
    }

    /// The window accepted the navigation
    pub fn started(&mut self) {
        if let NavigationState::NavigationRequested(target) = self.state {
            self.state = NavigationState::Navigating(target);
        }
    }

    /// The request could not be handed to a window
    pub fn abandon(&mut self) {
        self.state = NavigationState::Idle;
    }

    pub fn page_loaded(&mut self) {
        self.state = NavigationState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn backend() -> BackendConfig {
        BackendConfig {
            base_url: "http://localhost:3001/executavel".to_string(),
            identity_header: "Usuario-Nome".to_string(),
        }
    }

    #[test]
    fn test_target_urls_do_not_cross_map() {
        let backend = backend();
        assert_eq!(
            NavigationTarget::Profile.url(&backend),
            "http://localhost:3001/executavel/perfil_demanda_api/"
        );
        assert_eq!(
            NavigationTarget::Create.url(&backend),
            "http://localhost:3001/executavel/criar_demanda_api/"
        );
        assert_eq!(
            NavigationTarget::List.url(&backend),
            "http://localhost:3001/executavel/listar_demanda_api/"
        );

        let urls: std::collections::HashSet<_> =
            NavigationTarget::ALL.iter().map(|t| t.url(&backend)).collect();
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn test_parse_trigger_names() {
        for target in NavigationTarget::ALL {
            assert_eq!(target.as_str().parse::<NavigationTarget>().unwrap(), target);
        }
        assert_eq!("go-to-perfil".parse::<NavigationTarget>().unwrap(), NavigationTarget::Profile);
        assert_eq!("go-to-criar".parse::<NavigationTarget>().unwrap(), NavigationTarget::Create);
        assert_eq!("go-to-acompanhar".parse::<NavigationTarget>().unwrap(), NavigationTarget::List);
        assert!("admin".parse::<NavigationTarget>().is_err());
    }

    #[test]
    fn test_request_carries_identity_header() {
        let backend = backend();
        let injector = HeaderInjector::new(&backend, Identity::new("maria").unwrap()).unwrap();
        let request = NavigationRequest::new(NavigationTarget::List, &backend, &injector);
        assert_eq!(request.headers.get("Usuario-Nome").unwrap(), "maria");
        assert!(injector.matches(&request.url));
    }

    #[test]
    fn test_state_transitions() {
        let mut relay = NavigationRelay::default();
        assert_eq!(relay.state(), NavigationState::Idle);

        relay.started();
        assert_eq!(relay.state(), NavigationState::Idle);

        relay.request(NavigationTarget::Profile);
        assert_eq!(relay.state(), NavigationState::NavigationRequested(NavigationTarget::Profile));

        relay.started();
        assert_eq!(relay.state(), NavigationState::Navigating(NavigationTarget::Profile));

        relay.request(NavigationTarget::List);
        assert_eq!(relay.state(), NavigationState::NavigationRequested(NavigationTarget::List));

        relay.started();
        relay.page_loaded();
        assert_eq!(relay.state(), NavigationState::Idle);

        relay.request(NavigationTarget::Create);
        relay.abandon();
        assert_eq!(relay.state(), NavigationState::Idle);
    }
}
