//! Call-boundary result shape
//!
//! Callers never see a raw `Error` from a dispatched operation; they get a
//! `ToolResult` with `isError` set and the message that best describes the
//! failure. Configuration errors are the exception: they abort startup and
//! are never wrapped here.

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub is_error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(content: serde_json::Value) -> Self {
        Self {
            is_error: false,
            message: None,
            content: Some(content),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            message: Some(message.into()),
            content: None,
        }
    }
}

impl From<&Error> for ToolResult {
    fn from(err: &Error) -> Self {
        ToolResult::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_serializes_is_error() {
        let result = ToolResult::failure("boom");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"isError": true, "message": "boom"})
        );
    }

    #[test]
    fn test_success_serializes_content() {
        let result = ToolResult::success(json!([{"id": 1}]));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"isError": false, "content": [{"id": 1}]})
        );
    }

    #[test]
    fn test_from_http_error_uses_remote_message() {
        let err = Error::PermanentHttp {
            status: 403,
            message: "Sorry, you are not allowed to do that.".to_string(),
            body: Some(json!({"code": "rest_forbidden"})),
            retry_after_secs: None,
        };
        let result = ToolResult::from(&err);
        assert!(result.is_error);
        assert_eq!(
            result.message.as_deref(),
            Some("Sorry, you are not allowed to do that.")
        );
    }
}
