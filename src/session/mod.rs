//! Session Management
//!
//! Authentication state for the FitManager client.
//!
//! ## Architecture
//!
//! - **SessionStore**: sole owner of the bearer token, persisted in a durable slot
//! - **ReauthGate**: fresh credential check before sensitive account mutations
//! - **Navigator**: the external "send the user to the login screen" side effect
//!
//! The store is shared by `Arc` with every component that needs the token;
//! there is no global session state.

mod gate;
mod store;

pub use gate::{AccountApi, GateError, GateOutcome, GateState, PendingAction, ReauthGate};
pub use store::{FileTokenSlot, MemoryTokenSlot, Session, SessionStore, TokenSlot, TOKEN_KEY};

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Username/password pair sent to the auth endpoints
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Navigation side effects owned by the presentation layer
pub trait Navigator: Send + Sync {
    /// Leave the current view and show the login screen
    fn to_login(&self);
}

/// Navigator that does nothing (headless use)
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn to_login(&self) {}
}

/// Navigator that counts redirects, useful for assertions
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: AtomicUsize,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}
