//! Identity resolution and caching
//!
//! The identity is the OS account name of whoever runs the shell. The host
//! resolves it once per process through an [`AccountSource`]; the bridge keeps
//! a per-page-session copy in [`SessionIdentity`] so repeated capability
//! calls never go back to the host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// OS account name used as the request-level actor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an account name, rejecting empty values
    pub fn new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IdentityError::Lookup("empty account name".to_string()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the current account name
pub trait AccountSource: Send + Sync {
    fn account_name(&self) -> Result<String, IdentityError>;
}

/// Reads the logged-in account from the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct OsAccount;

impl AccountSource for OsAccount {
    fn account_name(&self) -> Result<String, IdentityError> {
        whoami::fallible::username().map_err(|e| IdentityError::Lookup(e.to_string()))
    }
}

/// Host-side identity, resolved on first use and kept for the process lifetime
pub struct ProcessIdentity<A> {
    source: A,
    cached: Option<Identity>,
}

impl<A: AccountSource> ProcessIdentity<A> {
    pub fn new(source: A) -> Self {
        Self { source, cached: None }
    }

    /// Seed the cache with an identity resolved elsewhere (e.g. at startup)
    pub fn with_identity(source: A, identity: Identity) -> Self {
        Self { source, cached: Some(identity) }
    }

    /// Return the cached identity, querying the OS only on the first call
    pub fn resolve(&mut self) -> Result<Identity, IdentityError> {
        if let Some(identity) = &self.cached {
            return Ok(identity.clone());
        }

        let identity = Identity::new(self.source.account_name()?)?;
        log::info!("Resolved OS account: {}", identity);
        self.cached = Some(identity.clone());
        Ok(identity)
    }

    pub fn cached(&self) -> Option<&Identity> {
        self.cached.as_ref()
    }
}

/// Opaque page session token. A new session means a new partition/profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Bridge-side cache scoped to one page session
#[derive(Debug, Default)]
pub struct SessionIdentity {
    session: SessionId,
    identity: Option<Identity>,
}

impl SessionIdentity {
    pub fn new(session: SessionId) -> Self {
        Self { session, identity: None }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn get(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Store a resolved identity if it still belongs to the current session.
    ///
    /// Returns the value that is cached afterwards. The first value stored in
    /// a session wins, so concurrent resolutions converge on one identity.
    pub fn store(&mut self, session: SessionId, identity: Identity) -> Identity {
        if session != self.session {
            return identity;
        }
        self.identity.get_or_insert(identity).clone()
    }

    /// Start a fresh session, dropping the cached identity
    pub fn begin_session(&mut self, session: SessionId) {
        if session != self.session {
            log::debug!("Page session {:?} -> {:?}, identity cache cleared", self.session, session);
        }
        self.session = session;
        self.identity = None;
    }
}
