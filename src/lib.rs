//! Desktop shell for the demand management system.
//!
//! The remote application is rendered in a native webview. The shell's own
//! job is identity propagation: the OS account name is resolved once, sent as
//! a header on every backend request, and relayed to page scripts through a
//! narrow bridge.
//!
//! - [`host`]: privileged side (window, OS identity, HTTP, filesystem)
//! - [`bridge`]: page-facing capability surface, relays to the host
//! - [`protocol`]: the typed messages between them

pub mod backend;
pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod identity;
pub mod interceptor;
pub mod navigation;
pub mod protocol;
pub mod proxy;
pub mod save;

#[cfg(feature = "desktop")]
mod shell;

pub use bridge::{link, Bridge, Capability, Link};
pub use config::ShellConfig;
pub use error::{IdentityError, RelayError};
pub use host::{HostController, HostHandle, StartupError};
pub use identity::{AccountSource, Identity, OsAccount};
pub use navigation::NavigationTarget;
pub use save::{SaveOutcome, SaveRequest};

#[cfg(feature = "desktop")]
pub use shell::run;
