use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error_detail::ErrorDetail;

/// Response to a [`QueryRequest`](super::QueryRequest).
///
/// Subscribe responses carry `roomId` and `channel` inside `result`;
/// count responses carry `count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default)]
    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,

    #[serde(default)]
    pub result: JsonValue,
}

impl QueryResponse {
    /// Successful response wrapping `result`.
    pub fn ok(result: JsonValue) -> Self {
        Self {
            request_id: None,
            status: 200,
            error: None,
            result,
        }
    }

    /// Server-assigned room identifier of a subscribe response.
    pub fn room_id(&self) -> Option<&str> {
        self.result.get("roomId").and_then(JsonValue::as_str)
    }

    /// Notification channel of a subscribe response.
    pub fn channel(&self) -> Option<&str> {
        self.result.get("channel").and_then(JsonValue::as_str)
    }

    /// Subscriber count of a count response.
    pub fn count(&self) -> Option<u64> {
        self.result.get("count").and_then(JsonValue::as_u64)
    }
}
