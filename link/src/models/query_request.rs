use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Request descriptor sent to the server.
///
/// `controller` and `action` name the API route; everything the server
/// expects beyond the well-known fields goes into `args`, which is
/// flattened into the top-level JSON object (this is also where headers
/// land).
///
/// # Examples
///
/// ```rust
/// use live_link::QueryRequest;
/// use serde_json::json;
///
/// let request = QueryRequest::new("subscribe", "on")
///     .with_index("shop")
///     .with_collection("orders")
///     .with_arg("scope", json!("all"))
///     .with_body(json!({"equals": {"status": "paid"}}));
///
/// assert_eq!(request.arg("scope"), Some(&json!("all")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// API controller (e.g. `subscribe`, `auth`)
    pub controller: String,

    /// Action within the controller (e.g. `on`, `off`, `count`)
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Correlation id. Assigned by the connection when left empty.
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,

    /// Opaque user metadata forwarded with the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,

    /// Any other top-level field (route arguments, headers, `jwt`)
    #[serde(flatten)]
    pub args: Map<String, JsonValue>,
}

impl QueryRequest {
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.args.insert(key.into(), value);
        self
    }

    pub fn arg(&self, key: &str) -> Option<&JsonValue> {
        self.args.get(key)
    }
}
