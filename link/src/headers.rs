//! Header merging.
//!
//! Headers are arbitrary key/value pairs copied into every outgoing request
//! without interpretation.

use serde_json::{Map, Value as JsonValue};

use crate::{
    error::{LiveLinkError, Result},
    models::QueryRequest,
};

/// Copy `headers` into `request`, never overriding a value the request
/// already carries.
pub fn add_headers(request: &mut QueryRequest, headers: &Map<String, JsonValue>) {
    for (key, value) in headers {
        match key.as_str() {
            "controller" | "action" | "requestId" => {},
            "index" => {
                if request.index.is_none() {
                    request.index = value.as_str().map(str::to_string);
                }
            },
            "collection" => {
                if request.collection.is_none() {
                    request.collection = value.as_str().map(str::to_string);
                }
            },
            "body" => {
                if request.body.is_none() {
                    request.body = Some(value.clone());
                }
            },
            "metadata" => {
                if request.metadata.is_none() {
                    request.metadata = Some(value.clone());
                }
            },
            _ => {
                request
                    .args
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            },
        }
    }
}

/// Merge `content` into `target`, or replace `target` entirely when
/// `replace` is set. `content` must be a JSON object.
pub fn set_headers(
    target: &mut Map<String, JsonValue>,
    content: JsonValue,
    replace: bool,
) -> Result<()> {
    let JsonValue::Object(content) = content else {
        return Err(LiveLinkError::UsageError(
            "headers content must be a JSON object".to_string(),
        ));
    };

    if replace {
        *target = content;
    } else {
        target.extend(content);
    }
    Ok(())
}
