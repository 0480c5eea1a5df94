use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Per-request execution options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Whether the request may be buffered in the offline queue while the
    /// connection is down. Default: `true`.
    #[serde(default = "default_queuable")]
    pub queuable: bool,

    /// Metadata copied into the request when it has none of its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

fn default_queuable() -> bool {
    true
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            queuable: true,
            metadata: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queuable(mut self, queuable: bool) -> Self {
        self.queuable = queuable;
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
