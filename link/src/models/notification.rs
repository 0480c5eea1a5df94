use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::error_detail::ErrorDetail;

/// A real-time notification delivered to a room callback.
///
/// Only the fields the client itself looks at are typed; the rest of the
/// server payload is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Id of the request that caused this notification
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,

    /// Notification type: `document` or `user`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Document scope relative to the filters (`in` / `out`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Document state (`pending` / `done`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,

    /// Document or user content the notification is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Notification {
    /// `true` for user presence notifications (someone joined or left the room).
    pub fn is_user_event(&self) -> bool {
        self.kind.as_deref() == Some("user")
    }
}

/// Raw envelope received on a room channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationMessage {
    #[serde(default)]
    pub error: Option<ErrorDetail>,

    #[serde(default)]
    pub result: Option<Notification>,
}
