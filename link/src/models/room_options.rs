use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Which document movements relative to the filters trigger a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Documents entering or leaving the filter scope
    #[default]
    All,
    /// Documents entering (or changing within) the scope
    In,
    /// Documents leaving the scope
    Out,
    None,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::In => "in",
            Scope::Out => "out",
            Scope::None => "none",
        }
    }
}

/// Document change state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// Changes not yet persisted
    Pending,
    /// Persisted changes only
    #[default]
    Done,
    All,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Pending => "pending",
            DocumentState::Done => "done",
            DocumentState::All => "all",
        }
    }
}

/// Which user presence events the server should emit on the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsersScope {
    All,
    In,
    Out,
    #[default]
    None,
}

impl UsersScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsersScope::All => "all",
            UsersScope::In => "in",
            UsersScope::Out => "out",
            UsersScope::None => "none",
        }
    }
}

/// Options of a single room subscription, fixed at creation.
///
/// # Example
///
/// ```rust
/// use live_link::{RoomOptions, Scope, UsersScope};
///
/// let options = RoomOptions::new()
///     .with_scope(Scope::In)
///     .with_users(UsersScope::All)
///     .with_subscribe_to_self(true);
/// assert!(options.subscribe_to_self);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomOptions {
    #[serde(default)]
    pub scope: Scope,

    #[serde(default)]
    pub state: DocumentState,

    #[serde(default)]
    pub users: UsersScope,

    /// Deliver notifications caused by this client's own requests.
    /// Default: false
    #[serde(default)]
    pub subscribe_to_self: bool,

    /// Deliver "user entered the room" presence events. Default: false
    #[serde(default)]
    pub listen_to_connections: bool,

    /// Deliver "user left the room" presence events. Default: false
    #[serde(default)]
    pub listen_to_disconnections: bool,

    /// Opaque data attached to the subscribe request. Default: `{}`
    #[serde(default = "default_metadata")]
    pub metadata: JsonValue,
}

fn default_metadata() -> JsonValue {
    json!({})
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            scope: Scope::default(),
            state: DocumentState::default(),
            users: UsersScope::default(),
            subscribe_to_self: false,
            listen_to_connections: false,
            listen_to_disconnections: false,
            metadata: default_metadata(),
        }
    }
}

impl RoomOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_state(mut self, state: DocumentState) -> Self {
        self.state = state;
        self
    }

    pub fn with_users(mut self, users: UsersScope) -> Self {
        self.users = users;
        self
    }

    pub fn with_subscribe_to_self(mut self, enabled: bool) -> Self {
        self.subscribe_to_self = enabled;
        self
    }

    pub fn with_listen_to_connections(mut self, enabled: bool) -> Self {
        self.listen_to_connections = enabled;
        self
    }

    pub fn with_listen_to_disconnections(mut self, enabled: bool) -> Self {
        self.listen_to_disconnections = enabled;
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}
