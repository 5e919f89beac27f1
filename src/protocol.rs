//! Typed messages crossing the bridge/host boundary
//!
//! The bridge sends [`Envelope`]s over one channel; the host answers with
//! [`HostReply`]s over another. Replies carry the [`RequestId`] of the
//! request they answer, so overlapping calls of the same kind never pick up
//! each other's results. Navigation is one-way and carries no id.

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::navigation::{NavigationTarget, Navigator};
use crate::save::{SaveOutcome, SaveRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Privileged operations the bridge may ask for
pub enum HostRequest {
    /// `request-os-user`
    ResolveIdentity,
    /// `go-to-*`, fire-and-forget
    Navigate(NavigationTarget),
    /// `create-demand`
    CreateDemand(Value),
    /// `list-demands`
    ListDemands,
    /// `fetch-profile`
    FetchProfile,
    /// `save-file`
    SaveFile(SaveRequest),
    /// A window was created and can receive navigations
    WindowOpened(Box<dyn Navigator>),
    /// The window was closed; its handle is dropped
    WindowClosed,
    /// The current page finished loading
    PageLoaded,
}

impl HostRequest {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::ResolveIdentity => "request-os-user",
            Self::Navigate(NavigationTarget::Profile) => "go-to-perfil",
            Self::Navigate(NavigationTarget::Create) => "go-to-criar",
            Self::Navigate(NavigationTarget::List) => "go-to-acompanhar",
            Self::CreateDemand(_) => "create-demand",
            Self::ListDemands => "list-demands",
            Self::FetchProfile => "fetch-profile",
            Self::SaveFile(_) => "save-file",
            Self::WindowOpened(_) => "window-opened",
            Self::WindowClosed => "window-closed",
            Self::PageLoaded => "page-loaded",
        }
    }
}

impl fmt::Debug for HostRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel())
    }
}

/// A request plus the id its reply must carry (`None` for one-way messages)
#[derive(Debug)]
pub struct Envelope {
    pub id: Option<RequestId>,
    pub request: HostRequest,
}

/// Named response messages
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyMessage {
    OsUser(Result<String, String>),
    DemandCreated(Value),
    DemandCreateError(String),
    DemandsListed(Value),
    DemandsListError(String),
    ProfileFetched(Value),
    ProfileFetchError(String),
    FileSaved(PathBuf),
    SaveCancelled,
    SaveError(String),
}

impl ReplyMessage {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::OsUser(_) => "response-os-user",
            Self::DemandCreated(_) => "demand-created",
            Self::DemandCreateError(_) => "demand-create-error",
            Self::DemandsListed(_) => "demands-listed",
            Self::DemandsListError(_) => "demands-list-error",
            Self::ProfileFetched(_) => "profile-fetched",
            Self::ProfileFetchError(_) => "profile-fetch-error",
            Self::FileSaved(_) => "file-saved",
            Self::SaveCancelled => "save-cancelled",
            Self::SaveError(_) => "save-error",
        }
    }

    pub fn from_save(outcome: SaveOutcome) -> Self {
        match outcome {
            SaveOutcome::Saved { path } => Self::FileSaved(path),
            SaveOutcome::Cancelled => Self::SaveCancelled,
            SaveOutcome::Failed { message } => Self::SaveError(message),
        }
    }

    /// Back to a save outcome, if this is a save reply
    pub fn into_save(self) -> Option<SaveOutcome> {
        match self {
            Self::FileSaved(path) => Some(SaveOutcome::Saved { path }),
            Self::SaveCancelled => Some(SaveOutcome::Cancelled),
            Self::SaveError(message) => Some(SaveOutcome::Failed { message }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostReply {
    pub id: RequestId,
    pub message: ReplyMessage,
}

pub type RequestSender = mpsc::UnboundedSender<Envelope>;
pub type RequestReceiver = mpsc::UnboundedReceiver<Envelope>;
pub type ReplySender = mpsc::UnboundedSender<HostReply>;
pub type ReplyReceiver = mpsc::UnboundedReceiver<HostReply>;
