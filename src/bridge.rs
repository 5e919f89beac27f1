//! Bridge: the page-facing capability surface
//!
//! The bridge has no network client, no filesystem access and no window.
//! Each capability either answers from the session identity cache or relays
//! a [`HostRequest`] to the host controller. API calls are correlated with
//! their replies by [`RequestId`]; navigation is a one-way send.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::{IdentityError, RelayError, RelayResult};
use crate::identity::{Identity, SessionId, SessionIdentity};
use crate::navigation::NavigationTarget;
use crate::protocol::{
    Envelope, HostReply, HostRequest, ReplyMessage, ReplyReceiver, ReplySender, RequestId,
    RequestReceiver, RequestSender,
};
use crate::save::{SaveOutcome, SaveRequest};

const EVENT_CAPACITY: usize = 16;

const PAGE_SCRIPT: &str = include_str!("bridge.js");

/// The fixed set of capabilities exposed to page scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    GetUser,
    SetUser,
    GoToProfile,
    GoToCreate,
    GoToList,
    CreateDemand,
    ListDemands,
    FetchProfile,
    SaveFile,
    OnFileSaved,
    OnSaveCancelled,
    OnSaveError,
}

impl Capability {
    pub const ALL: [Capability; 12] = [
        Self::GetUser,
        Self::SetUser,
        Self::GoToProfile,
        Self::GoToCreate,
        Self::GoToList,
        Self::CreateDemand,
        Self::ListDemands,
        Self::FetchProfile,
        Self::SaveFile,
        Self::OnFileSaved,
        Self::OnSaveCancelled,
        Self::OnSaveError,
    ];

    /// Name under which page scripts see the capability
    pub fn js_name(self) -> &'static str {
        match self {
            Self::GetUser => "getUser",
            Self::SetUser => "setUser",
            Self::GoToProfile => "goToPerfil",
            Self::GoToCreate => "goToCriar",
            Self::GoToList => "goToAcompanhar",
            Self::CreateDemand => "criarDemandaApi",
            Self::ListDemands => "listarDemandaApi",
            Self::FetchProfile => "obterPerfilApi",
            Self::SaveFile => "saveFile",
            Self::OnFileSaved => "onFileSaved",
            Self::OnSaveCancelled => "onSaveCancelled",
            Self::OnSaveError => "onSaveError",
        }
    }
}

/// Script installed in every page. The page API exposes exactly the names in
/// [`Capability::ALL`].
pub fn page_script() -> String {
    let names: Vec<&str> = Capability::ALL.iter().map(|c| c.js_name()).collect();
    PAGE_SCRIPT.replace("__CAPABILITIES__", &Value::from(names).to_string())
}

struct Inner {
    requests: RequestSender,
    next_id: AtomicU64,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<ReplyMessage>>>,
    session: Mutex<SessionIdentity>,
    file_saved: broadcast::Sender<PathBuf>,
    save_cancelled: broadcast::Sender<()>,
    save_error: broadcast::Sender<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cheap to clone; all clones share one session and one reply table
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

/// Routes host replies to waiting callers. Spawn [`ReplyDispatcher::run`].
pub struct ReplyDispatcher {
    inner: Arc<Inner>,
    replies: ReplyReceiver,
}

/// Both ends of a freshly wired boundary
pub struct Link {
    pub bridge: Bridge,
    pub dispatcher: ReplyDispatcher,
    /// Host side: incoming requests
    pub requests: RequestReceiver,
    /// Host side: outgoing replies
    pub replies: ReplySender,
    /// Extra request sender for privileged lifecycle messages
    pub host_requests: RequestSender,
}

/// Create the two channels of the boundary and the bridge on top of them
pub fn link() -> Link {
    let (request_tx, request_rx) = mpsc::unbounded_channel::<Envelope>();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<HostReply>();
    let (bridge, dispatcher) = Bridge::new(request_tx.clone(), reply_rx);

    Link {
        bridge,
        dispatcher,
        requests: request_rx,
        replies: reply_tx,
        host_requests: request_tx,
    }
}

impl Bridge {
    pub fn new(requests: RequestSender, replies: ReplyReceiver) -> (Self, ReplyDispatcher) {
        let (file_saved, _) = broadcast::channel(EVENT_CAPACITY);
        let (save_cancelled, _) = broadcast::channel(EVENT_CAPACITY);
        let (save_error, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new(Inner {
            requests,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            session: Mutex::new(SessionIdentity::new(SessionId::default())),
            file_saved,
            save_cancelled,
            save_error,
        });

        (
            Self { inner: inner.clone() },
            ReplyDispatcher { inner, replies },
        )
    }

    /// Start a new page session; the next capability call re-resolves identity
    pub fn begin_session(&self) -> SessionId {
        let mut session = lock(&self.inner.session);
        let next = session.session().next();
        session.begin_session(next);
        next
    }

    /// `getUser`: the session-cached identity, without a relay
    pub fn get_user(&self) -> Option<String> {
        lock(&self.inner.session).get().map(|i| i.as_str().to_string())
    }

    /// `setUser`: resolve (or reuse) the session identity
    pub async fn set_user(&self) -> RelayResult<String> {
        Ok(self.resolve_identity().await?.as_str().to_string())
    }

    /// Cached identity for this session, asking the host only on a miss
    pub async fn resolve_identity(&self) -> RelayResult<Identity> {
        let session = {
            let cache = lock(&self.inner.session);
            if let Some(identity) = cache.get() {
                return Ok(identity.clone());
            }
            cache.session()
        };

        match self.call(HostRequest::ResolveIdentity).await? {
            ReplyMessage::OsUser(Ok(name)) => {
                let identity = Identity::new(name)?;
                Ok(lock(&self.inner.session).store(session, identity))
            }
            ReplyMessage::OsUser(Err(message)) => {
                Err(RelayError::Identity(IdentityError::Lookup(message)))
            }
            other => Err(RelayError::UnexpectedReply(other.channel())),
        }
    }

    /// `goToPerfil`
    pub async fn go_to_profile(&self) -> RelayResult<()> {
        self.go_to(NavigationTarget::Profile).await
    }

    /// `goToCriar`
    pub async fn go_to_create(&self) -> RelayResult<()> {
        self.go_to(NavigationTarget::Create).await
    }

    /// `goToAcompanhar`
    pub async fn go_to_list(&self) -> RelayResult<()> {
        self.go_to(NavigationTarget::List).await
    }

    /// Resolve identity, then fire the navigation. The load outcome is not
    /// reported back.
    pub async fn go_to(&self, target: NavigationTarget) -> RelayResult<()> {
        let identity = self.resolve_identity().await?;
        log::debug!("Requesting navigation to {} for {}", target, identity);
        self.send(None, HostRequest::Navigate(target))
    }

    /// `criarDemandaApi`
    pub async fn create_demand(&self, payload: Value) -> RelayResult<Value> {
        self.resolve_identity().await?;
        match self.call(HostRequest::CreateDemand(payload)).await? {
            ReplyMessage::DemandCreated(body) => Ok(body),
            ReplyMessage::DemandCreateError(message) => Err(RelayError::Backend(message)),
            other => Err(RelayError::UnexpectedReply(other.channel())),
        }
    }

    /// `listarDemandaApi`
    pub async fn list_demands(&self) -> RelayResult<Value> {
        self.resolve_identity().await?;
        match self.call(HostRequest::ListDemands).await? {
            ReplyMessage::DemandsListed(body) => Ok(body),
            ReplyMessage::DemandsListError(message) => Err(RelayError::Backend(message)),
            other => Err(RelayError::UnexpectedReply(other.channel())),
        }
    }

    /// `obterPerfilApi`
    pub async fn fetch_profile(&self) -> RelayResult<Value> {
        self.resolve_identity().await?;
        match self.call(HostRequest::FetchProfile).await? {
            ReplyMessage::ProfileFetched(body) => Ok(body),
            ReplyMessage::ProfileFetchError(message) => Err(RelayError::Backend(message)),
            other => Err(RelayError::UnexpectedReply(other.channel())),
        }
    }

    /// `saveFile`. The outcome is returned and also published on the
    /// matching subscription.
    pub async fn save_file(&self, request: SaveRequest) -> RelayResult<SaveOutcome> {
        let reply = self.call(HostRequest::SaveFile(request)).await?;
        let channel = reply.channel();
        reply.into_save().ok_or(RelayError::UnexpectedReply(channel))
    }

    /// `onFileSaved`
    pub fn on_file_saved(&self) -> broadcast::Receiver<PathBuf> {
        self.inner.file_saved.subscribe()
    }

    /// `onSaveCancelled`
    pub fn on_save_cancelled(&self) -> broadcast::Receiver<()> {
        self.inner.save_cancelled.subscribe()
    }

    /// `onSaveError`
    pub fn on_save_error(&self) -> broadcast::Receiver<String> {
        self.inner.save_error.subscribe()
    }

    async fn call(&self, request: HostRequest) -> RelayResult<ReplyMessage> {
        let id = RequestId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        lock(&self.inner.pending).insert(id, tx);

        if let Err(e) = self.send(Some(id), request) {
            lock(&self.inner.pending).remove(&id);
            return Err(e);
        }

        rx.await.map_err(|_| RelayError::HostUnavailable)
    }

    fn send(&self, id: Option<RequestId>, request: HostRequest) -> RelayResult<()> {
        self.inner
            .requests
            .send(Envelope { id, request })
            .map_err(|_| RelayError::HostUnavailable)
    }
}

impl ReplyDispatcher {
    /// Deliver replies until the host drops its reply sender, then fail all
    /// callers still waiting
    pub async fn run(mut self) {
        while let Some(reply) = self.replies.recv().await {
            self.dispatch(reply);
        }

        let abandoned: Vec<_> = lock(&self.inner.pending).drain().collect();
        if !abandoned.is_empty() {
            log::warn!("Host closed with {} request(s) unanswered", abandoned.len());
        }
    }

    fn dispatch(&self, reply: HostReply) {
        let HostReply { id, message } = reply;

        // Subscribers hear about save outcomes even if the caller is gone
        match &message {
            ReplyMessage::FileSaved(path) => {
                let _ = self.inner.file_saved.send(path.clone());
            }
            ReplyMessage::SaveCancelled => {
                let _ = self.inner.save_cancelled.send(());
            }
            ReplyMessage::SaveError(error) => {
                let _ = self.inner.save_error.send(error.clone());
            }
            _ => {}
        }

        let waiter = lock(&self.inner.pending).remove(&id);
        match waiter {
            Some(tx) => {
                if tx.send(message).is_err() {
                    log::debug!("Caller for {} went away", id);
                }
            }
            None => log::warn!("Reply '{}' for unknown request {}", message.channel(), id),
        }
    }
}
