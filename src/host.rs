//! Host controller: the privileged side of the shell
//!
//! Owns the [`AppContext`], the backend client and the save relay. Requests
//! are handled strictly one at a time in arrival order; a handler runs to
//! completion (including its awaits) before the next envelope is read.

use std::sync::Arc;

use crate::backend::BackendClient;
use crate::config::BackendConfig;
use crate::context::AppContext;
use crate::error::{IdentityError, RelayError};
use crate::identity::{AccountSource, Identity, ProcessIdentity};
use crate::interceptor::{HeaderInjector, InjectorError};
use crate::navigation::{NavigationRequest, NavigationTarget, Navigator};
use crate::protocol::{
    Envelope, HostReply, HostRequest, ReplyMessage, ReplySender, RequestId, RequestReceiver,
    RequestSender,
};
use crate::save::{FileSaveRelay, SaveDialog};

/// Anything that prevents the host from starting. All of these are fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Injector(#[from] InjectorError),
    #[error(transparent)]
    Client(#[from] RelayError),
}

pub struct HostController<A, D> {
    context: AppContext<A>,
    backend: Arc<BackendClient>,
    saver: FileSaveRelay<D>,
    replies: ReplySender,
}

impl<A: AccountSource, D: SaveDialog> HostController<A, D> {
    /// Resolve the OS identity, install the interceptor and build the client.
    ///
    /// Identity resolution failure is fatal: no page works without it.
    pub fn new(
        source: A,
        backend: BackendConfig,
        saver: FileSaveRelay<D>,
        replies: ReplySender,
    ) -> Result<Self, StartupError> {
        let mut identity = ProcessIdentity::new(source);
        let resolved = identity.resolve()?;
        let injector = HeaderInjector::new(&backend, resolved)?;
        let backend = Arc::new(BackendClient::new(backend, injector)?);

        Ok(Self {
            context: AppContext::new(identity),
            backend,
            saver,
            replies,
        })
    }

    pub fn identity(&self) -> &Identity {
        self.backend.injector().identity()
    }

    /// Shared client, for the webview proxy which must use the same injector
    pub fn backend(&self) -> Arc<BackendClient> {
        self.backend.clone()
    }

    /// Process envelopes until every sender is dropped
    pub async fn run(mut self, mut requests: RequestReceiver) {
        log::info!("Host controller running for {}", self.identity());
        while let Some(envelope) = requests.recv().await {
            self.handle(envelope).await;
        }
        log::info!("Host controller stopped (bridge closed)");
    }

    pub async fn handle(&mut self, envelope: Envelope) {
        let Envelope { id, request } = envelope;
        log::debug!("Host received {:?} ({:?})", request, id);

        match request {
            HostRequest::ResolveIdentity => {
                let message = match self.context.identity().resolve() {
                    Ok(identity) => ReplyMessage::OsUser(Ok(identity.as_str().to_string())),
                    Err(e) => ReplyMessage::OsUser(Err(e.to_string())),
                };
                self.reply(id, message);
            }
            HostRequest::Navigate(target) => self.navigate(target),
            HostRequest::CreateDemand(payload) => {
                log::info!("Creating demand for {}", self.identity());
                let message = match self.backend.submit_demand(&payload).await {
                    Ok(body) => {
                        log::info!("Demand created");
                        ReplyMessage::DemandCreated(body)
                    }
                    Err(e) => {
                        log::error!("Failed to create demand: {}", e);
                        ReplyMessage::DemandCreateError(e.to_string())
                    }
                };
                self.reply(id, message);
            }
            HostRequest::ListDemands => {
                let message = match self.backend.list_demands().await {
                    Ok(body) => ReplyMessage::DemandsListed(body),
                    Err(e) => {
                        log::error!("Failed to list demands: {}", e);
                        ReplyMessage::DemandsListError(e.to_string())
                    }
                };
                self.reply(id, message);
            }
            HostRequest::FetchProfile => {
                let message = match self.backend.fetch_profile().await {
                    Ok(body) => ReplyMessage::ProfileFetched(body),
                    Err(e) => {
                        log::error!("Failed to fetch profile: {}", e);
                        ReplyMessage::ProfileFetchError(e.to_string())
                    }
                };
                self.reply(id, message);
            }
            HostRequest::SaveFile(request) => {
                let outcome = self.saver.save(&request).await;
                self.reply(id, ReplyMessage::from_save(outcome));
            }
            HostRequest::WindowOpened(window) => {
                log::info!("Window attached");
                self.context.attach_window(window);
            }
            HostRequest::WindowClosed => {
                if self.context.close_window() {
                    log::info!("Window closed");
                }
            }
            HostRequest::PageLoaded => self.context.navigation().page_loaded(),
        }
    }

    fn navigate(&mut self, target: NavigationTarget) {
        log::info!("Navigating to {}", target);
        self.context.navigation().request(target);

        // Cached after startup; kept on the path so a navigation can never
        // be issued without an identity.
        if let Err(e) = self.context.identity().resolve() {
            log::error!("Navigation to {} dropped: {}", target, e);
            self.context.navigation().abandon();
            return;
        }

        let request = NavigationRequest::new(target, self.backend.backend(), self.backend.injector());
        let (window, navigation) = self.context.window_and_navigation();
        match window {
            None => {
                log::warn!("Navigation to {} dropped: no window", target);
                navigation.abandon();
            }
            Some(window) => match window.navigate(&request) {
                Ok(()) => navigation.started(),
                Err(e) => {
                    log::warn!("Navigation to {} failed to start: {}", target, e);
                    navigation.abandon();
                }
            },
        }
    }

    fn reply(&self, id: Option<RequestId>, message: ReplyMessage) {
        let Some(id) = id else {
            log::warn!("Dropping '{}' reply for a one-way request", message.channel());
            return;
        };
        if self.replies.send(HostReply { id, message }).is_err() {
            log::debug!("Bridge gone, reply {} dropped", id);
        }
    }
}

/// Privileged handle used by the shell for window lifecycle events. Not
/// exposed to the page.
#[derive(Clone)]
pub struct HostHandle {
    requests: RequestSender,
}

impl HostHandle {
    pub fn new(requests: RequestSender) -> Self {
        Self { requests }
    }

    pub fn window_opened(&self, window: Box<dyn Navigator>) {
        self.send(HostRequest::WindowOpened(window));
    }

    pub fn window_closed(&self) {
        self.send(HostRequest::WindowClosed);
    }

    pub fn page_loaded(&self) {
        self.send(HostRequest::PageLoaded);
    }

    /// Host-initiated navigation (e.g. the first page after startup)
    pub fn navigate(&self, target: NavigationTarget) {
        self.send(HostRequest::Navigate(target));
    }

    fn send(&self, request: HostRequest) {
        let channel = request.channel();
        if self.requests.send(Envelope { id: None, request }).is_err() {
            log::warn!("Host controller gone, '{}' dropped", channel);
        }
    }
}
