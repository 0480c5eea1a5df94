use std::fmt;

use serde::{Deserialize, Serialize};

/// Error payload attached to a failed response or notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// HTTP-like status code chosen by the server
    #[serde(default)]
    pub status: u16,

    /// Human-readable error message
    pub message: String,

    /// Optional server-side stack or detail string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorDetail {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            stack: None,
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (status: {})", self.message, self.status)
        }
    }
}
