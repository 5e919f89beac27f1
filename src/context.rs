//! Application context owned by the host controller
//!
//! Created once at startup. The window slot is filled when a window opens
//! and emptied (not mutated) when it closes.

use crate::identity::{AccountSource, ProcessIdentity};
use crate::navigation::{NavigationRelay, Navigator};

pub struct AppContext<A> {
    window: Option<Box<dyn Navigator>>,
    identity: ProcessIdentity<A>,
    navigation: NavigationRelay,
}

impl<A: AccountSource> AppContext<A> {
    pub fn new(identity: ProcessIdentity<A>) -> Self {
        Self {
            window: None,
            identity,
            navigation: NavigationRelay::default(),
        }
    }

    /// Install the handle of a newly created window, replacing any previous one
    pub fn attach_window(&mut self, window: Box<dyn Navigator>) {
        if self.window.replace(window).is_some() {
            log::warn!("Replacing an open window handle");
        }
    }

    /// Drop the window handle. Returns false if no window was attached.
    pub fn close_window(&mut self) -> bool {
        self.navigation.page_loaded();
        self.window.take().is_some()
    }

    pub fn window(&self) -> Option<&dyn Navigator> {
        self.window.as_deref()
    }

    pub fn has_window(&self) -> bool {
        self.window.is_some()
    }

    pub fn identity(&mut self) -> &mut ProcessIdentity<A> {
        &mut self.identity
    }

    pub fn navigation(&mut self) -> &mut NavigationRelay {
        &mut self.navigation
    }

    /// Split borrow for handlers that need the window and the relay at once
    pub fn window_and_navigation(&mut self) -> (Option<&dyn Navigator>, &mut NavigationRelay) {
        (self.window.as_deref(), &mut self.navigation)
    }
}
