//! Session Store
//!
//! Single owner of the authentication token. The token lives in memory
//! inside a `watch` channel (so interested components can subscribe to
//! login/logout transitions) and is mirrored to a durable [`TokenSlot`]
//! so it survives restarts.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;

/// Fixed key of the durable slot holding the raw token string
pub const TOKEN_KEY: &str = "token";

/// Current authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Durable storage for the session token
///
/// Implementations never fail loudly: I/O problems are logged and the
/// slot behaves as if it were empty.
pub trait TokenSlot: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str);
    fn clear(&self);
}

/// Token slot backed by a small JSON object file
///
/// The file holds `{"token": "<raw token>"}`; other keys are preserved.
pub struct FileTokenSlot {
    path: PathBuf,
}

impl FileTokenSlot {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Map<String, Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                tracing::warn!("Failed to read session file {:?}: {}", self.path, e);
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!("Ignoring malformed session file {:?}", self.path);
                Map::new()
            }
        }
    }

    fn write_map(&self, map: Map<String, Value>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create session directory {:?}: {}", parent, e);
                return;
            }
        }

        let content = match serde_json::to_string_pretty(&Value::Object(map)) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to encode session file: {}", e);
                return;
            }
        };

        if let Err(e) = std::fs::write(&self.path, content) {
            tracing::warn!("Failed to write session file {:?}: {}", self.path, e);
        }
    }
}

impl TokenSlot for FileTokenSlot {
    fn load(&self) -> Option<String> {
        self.read_map()
            .get(TOKEN_KEY)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    fn store(&self, token: &str) {
        let mut map = self.read_map();
        map.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_map(map);
    }

    fn clear(&self) {
        let mut map = self.read_map();
        if map.remove(TOKEN_KEY).is_some() {
            self.write_map(map);
        }
    }
}

/// In-memory token slot (nothing survives the process)
#[derive(Default)]
pub struct MemoryTokenSlot {
    token: Mutex<Option<String>>,
}

impl MemoryTokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenSlot for MemoryTokenSlot {
    fn load(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn store(&self, token: &str) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
    }
}

/// Owner of the current [`Session`]
pub struct SessionStore {
    slot: Box<dyn TokenSlot>,
    state: watch::Sender<Session>,
}

impl SessionStore {
    /// Create a store, rehydrating the token from the slot if present
    pub fn new(slot: impl TokenSlot + 'static) -> Self {
        let token = slot.load();
        if token.is_some() {
            tracing::debug!("Restored session token from durable storage");
        }
        let (state, _) = watch::channel(Session { token });

        Self {
            slot: Box::new(slot),
            state,
        }
    }

    /// Store that keeps the token in memory only
    pub fn in_memory() -> Self {
        Self::new(MemoryTokenSlot::new())
    }

    /// Record a freshly issued token
    pub fn login(&self, token: impl Into<String>) {
        let token = token.into();
        self.slot.store(&token);
        self.state.send_replace(Session { token: Some(token) });
        tracing::info!("Session started");
    }

    /// Forget the token; calling this while logged out does nothing
    pub fn logout(&self) {
        self.slot.clear();
        let changed = self.state.send_if_modified(|session| {
            if session.token.is_some() {
                session.token = None;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Session ended");
        }
    }

    pub fn current_token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receive a notification on every login/logout transition
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }
}
